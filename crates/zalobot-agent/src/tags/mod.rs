//! Tag protocol: reaction dictionary, stuck-tag repair and parsers.

pub mod batch;
pub mod dictionary;
pub mod parser;
pub mod repair;

pub use batch::{parse_response, ParsedMessage, ParsedResponse, FALLBACK_TEXT};
pub use dictionary::{normalize_reaction, parse_keyword};
pub use parser::{extract, has_table_or_code, plain_text, Candidate};
pub use repair::fix_stuck_tags;
