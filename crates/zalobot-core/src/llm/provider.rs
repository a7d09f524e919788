//! Abstract streaming chat provider.
//!
//! The transport to Gemini/Groq lives outside this workspace; the stream
//! orchestrator only needs to open a text stream for a session and to tell
//! failures apart, so that is all this trait exposes.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};

use crate::session::SessionId;

/// Stream of raw text chunks. An `Err` item ends the attempt.
pub type TextStream = Pin<Box<dyn Stream<Item = Result<String, ProviderError>> + Send>>;

/// Role of a history turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Model,
}

/// One prior turn replayed into a new session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            text: text.into(),
        }
    }

    pub fn model(text: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Model,
            text: text.into(),
        }
    }
}

/// Input for one generation call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatRequest {
    /// The new user prompt.
    pub prompt: String,

    /// History used to seed a freshly created session.
    pub history: Vec<ChatTurn>,
}

impl ChatRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            history: Vec::new(),
        }
    }

    pub fn with_history(mut self, history: Vec<ChatTurn>) -> Self {
        self.history = history;
        self
    }
}

/// Credential/model pair an attempt runs against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StreamTarget {
    pub key_index: usize,
    pub model: String,
}

impl std::fmt::Display for StreamTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "key #{} ({})", self.key_index, self.model)
    }
}

/// Coarse failure class used by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Credential rejected: rotate key, retry immediately.
    AuthDenied,
    /// Quota hit: rotate key/model, retry immediately.
    RateLimited,
    /// Transient capacity problem: back off on the same key/model.
    Overloaded,
    /// Caller cancelled the call.
    Cancelled,
    /// Not recoverable.
    Other,
}

/// Provider error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    #[error("Permission denied: {0}")]
    AuthDenied(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Model overloaded: {0}")]
    Overloaded(String),

    #[error("Stream cancelled")]
    Cancelled,

    #[error("Provider error: {0}")]
    Other(String),
}

impl ProviderError {
    pub fn class(&self) -> ErrorClass {
        match self {
            ProviderError::AuthDenied(_) => ErrorClass::AuthDenied,
            ProviderError::RateLimited(_) => ErrorClass::RateLimited,
            ProviderError::Overloaded(_) => ErrorClass::Overloaded,
            ProviderError::Cancelled => ErrorClass::Cancelled,
            ProviderError::Other(_) => ErrorClass::Other,
        }
    }

    /// Whether a rotation can recover from this error.
    pub fn needs_rotation(&self) -> bool {
        matches!(
            self.class(),
            ErrorClass::AuthDenied | ErrorClass::RateLimited
        )
    }

    pub fn other(msg: impl Into<String>) -> Self {
        ProviderError::Other(msg.into())
    }
}

impl From<ProviderError> for crate::error::Error {
    fn from(e: ProviderError) -> Self {
        crate::error::Error::llm(e.to_string())
    }
}

/// A streaming chat provider (Gemini, Groq, ...).
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name used in logs.
    fn name(&self) -> &str;

    /// Create (or reuse) `session`, seed it with the request history, send
    /// the prompt and return the response stream.
    async fn open_stream(
        &self,
        session: &SessionId,
        target: &StreamTarget,
        request: &ChatRequest,
    ) -> Result<TextStream, ProviderError>;

    /// Drop any provider-side state held for `session`.
    fn delete_session(&self, session: &SessionId);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classes() {
        assert_eq!(
            ProviderError::AuthDenied("403".into()).class(),
            ErrorClass::AuthDenied
        );
        assert_eq!(
            ProviderError::RateLimited("429".into()).class(),
            ErrorClass::RateLimited
        );
        assert_eq!(
            ProviderError::Overloaded("503".into()).class(),
            ErrorClass::Overloaded
        );
        assert_eq!(ProviderError::Cancelled.class(), ErrorClass::Cancelled);
        assert_eq!(ProviderError::other("boom").class(), ErrorClass::Other);
    }

    #[test]
    fn test_needs_rotation() {
        assert!(ProviderError::AuthDenied(String::new()).needs_rotation());
        assert!(ProviderError::RateLimited(String::new()).needs_rotation());
        assert!(!ProviderError::Overloaded(String::new()).needs_rotation());
        assert!(!ProviderError::other("x").needs_rotation());
    }

    #[test]
    fn test_target_display() {
        let target = StreamTarget {
            key_index: 2,
            model: "gemini-2.5-flash".into(),
        };
        assert_eq!(target.to_string(), "key #2 (gemini-2.5-flash)");
    }

    #[test]
    fn test_into_core_error() {
        let err: crate::error::Error = ProviderError::Overloaded("503".into()).into();
        assert_eq!(err.to_string(), "LLM error: Model overloaded: 503");
    }
}
