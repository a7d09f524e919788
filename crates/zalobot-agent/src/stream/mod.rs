//! Streaming response handling.

pub mod orchestrator;
pub mod state;

pub use orchestrator::{StreamOptions, StreamOrchestrator, StreamOutcome, StreamStatus};
pub use state::{should_send_message, ParserState, MESSAGE_OVERLAP_THRESHOLD};
