//! Streaming response protocol for zalobot.
//!
//! The model answers in a small tag language:
//!
//! ```text
//! [reaction:heart][msg]Chào bạn![/msg][quote:0]Ý bạn là vậy?[/quote][sticker:hello]
//! ```
//!
//! This crate turns that text into platform actions while it is still
//! streaming:
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`tags::dictionary`] | Reaction keywords and emoji aliases |
//! | [`tags::repair`] | Fixes malformed tags before parsing |
//! | [`tags::parser`] | Extracts candidate actions from a growing buffer |
//! | [`tags::batch`] | Parses a complete reply in one go |
//! | [`stream::state`] | Per-attempt dedup and fuzzy message suppression |
//! | [`stream::orchestrator`] | Retry, key rotation and overload backoff |
//! | [`tokenizer`] | Input token estimate for the request guard |
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use zalobot_agent::{StreamOptions, StreamOrchestrator};
//! use zalobot_core::{ChatRequest, KeyManagerConfig, StreamConfig};
//! use zalobot_llm::{KeyManager, ScriptedAttempt, ScriptedProvider};
//! use zalobot_messages::ConsoleDispatcher;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = ScriptedProvider::new([ScriptedAttempt::from_text(
//!         "[reaction:like][msg]Xin chào![/msg]",
//!         8,
//!     )]);
//!     let keys = KeyManager::new(KeyManagerConfig::new(
//!         vec!["key-1".into()],
//!         vec!["gemini-2.5-flash".into()],
//!     ))?;
//!     let orchestrator =
//!         StreamOrchestrator::new(Arc::new(provider), Arc::new(keys), StreamConfig::default());
//!
//!     let outcome = orchestrator
//!         .generate_content_stream(
//!             &ChatRequest::new("Chào"),
//!             &ConsoleDispatcher::new("demo"),
//!             StreamOptions::new(),
//!         )
//!         .await;
//!     println!("{:?}", outcome.status);
//!     Ok(())
//! }
//! ```

pub mod stream;
pub mod tags;
pub mod tokenizer;

pub use stream::{
    should_send_message, ParserState, StreamOptions, StreamOrchestrator, StreamOutcome,
    StreamStatus, MESSAGE_OVERLAP_THRESHOLD,
};
pub use tags::{fix_stuck_tags, normalize_reaction, parse_response, ParsedMessage, ParsedResponse};
pub use tokenizer::{check_input_tokens, estimate_tokens, TokenCheck};
