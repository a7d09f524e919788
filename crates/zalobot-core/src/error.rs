//! Unified error handling for zalobot.
//!
//! This module provides the common error type used across the workspace.
//! Provider-level failures that drive the retry policy have their own type,
//! [`crate::llm::provider::ProviderError`], because they must stay
//! classifiable; everything else funnels through [`Error`].

/// Unified error type for zalobot.
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    /// Configuration-related errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// LLM-related errors.
    #[error("LLM error: {0}")]
    Llm(String),

    /// Action dispatch errors (platform adapter failures).
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// IO errors (config files, transcripts).
    #[error("IO error: {0}")]
    Io(String),
}

/// Result type alias for convenience.
pub type Result<T> = std::result::Result<T, Error>;

#[macro_export]
macro_rules! config_err {
    ($msg:expr) => {
        $crate::error::Error::Config($msg.into())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::Error::Config(format!($fmt, $($arg)*))
    };
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(e: toml::de::Error) -> Self {
        Error::Config(e.to_string())
    }
}

// Convenience constructors for common errors
impl Error {
    pub fn llm(msg: impl Into<String>) -> Self {
        Self::Llm(msg.into())
    }

    pub fn dispatch(msg: impl Into<String>) -> Self {
        Self::Dispatch(msg.into())
    }
}
