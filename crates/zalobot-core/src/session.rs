//! Chat session identifiers.
//!
//! A stream call runs inside a provider chat session. Conversation threads
//! reuse their thread id; one-off calls get a throwaway `temp_` session that
//! is removed once the call finishes.

use serde::{Deserialize, Serialize};

const TEMP_PREFIX: &str = "temp_";

/// Unique identifier for a provider chat session.
///
/// Whether a session is temporary is fixed when it is created, so a caller
/// thread id that happens to start with `temp_` is still a thread session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId {
    id: String,
    #[serde(default)]
    temporary: bool,
}

impl SessionId {
    /// Create a thread session ID from a string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self {
            id: s.into(),
            temporary: false,
        }
    }

    /// Create a temporary session ID (`temp_<unix millis>`).
    pub fn temporary() -> Self {
        Self {
            id: format!("{}{}", TEMP_PREFIX, chrono::Utc::now().timestamp_millis()),
            temporary: true,
        }
    }

    /// Session for a conversation thread, or a temporary one.
    pub fn for_thread(thread_id: Option<&str>) -> Self {
        match thread_id {
            Some(id) if !id.is_empty() => Self::from_string(id),
            _ => Self::temporary(),
        }
    }

    /// Whether this session was created for a single call.
    pub fn is_temporary(&self) -> bool {
        self.temporary
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &str {
        &self.id
    }
}

impl From<String> for SessionId {
    fn from(s: String) -> Self {
        Self::from_string(s)
    }
}

impl From<&str> for SessionId {
    fn from(s: &str) -> Self {
        Self::from_string(s)
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id)
    }
}
