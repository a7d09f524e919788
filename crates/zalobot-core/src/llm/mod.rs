//! LLM provider abstractions.

pub mod provider;
pub mod rotation;

pub use provider::{
    ChatProvider, ChatRequest, ChatRole, ChatTurn, ErrorClass, ProviderError, StreamTarget,
    TextStream,
};
pub use rotation::KeyRotation;
