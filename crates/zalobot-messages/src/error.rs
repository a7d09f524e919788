//! Error types for action dispatch.

use thiserror::Error;

/// Result type for dispatch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors a dispatcher can report back to the stream orchestrator.
#[derive(Debug, Error)]
pub enum Error {
    /// Dispatcher is disabled.
    #[error("Dispatcher disabled: {0}")]
    Disabled(String),

    /// Send operation failed.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Other error.
    #[error("Other: {0}")]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn send_failed(msg: impl Into<String>) -> Self {
        Self::SendFailed(msg.into())
    }
}

impl From<Error> for zalobot_core::Error {
    fn from(err: Error) -> Self {
        zalobot_core::Error::dispatch(err.to_string())
    }
}
