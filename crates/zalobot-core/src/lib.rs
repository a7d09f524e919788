//! Core traits and types for zalobot.
//!
//! This crate defines the foundational abstractions shared by the stream
//! protocol crates: the unified error type, configuration, chat sessions,
//! and the provider / key-rotation interfaces the orchestrator consumes.

pub mod config;
pub mod error;
pub mod llm;
pub mod session;

pub use config::{KeyManagerConfig, RetryConfig, StreamConfig};
pub use error::{Error, Result};
pub use llm::provider::{
    ChatProvider, ChatRequest, ChatRole, ChatTurn, ErrorClass, ProviderError, StreamTarget,
    TextStream,
};
pub use llm::rotation::KeyRotation;
pub use session::SessionId;
