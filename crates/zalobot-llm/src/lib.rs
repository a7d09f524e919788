//! Provider-side plumbing for zalobot.
//!
//! - [`KeyManager`]: rotation over API keys and fallback models.
//! - [`classify`]: maps provider status codes and messages onto
//!   [`ProviderError`](zalobot_core::ProviderError) classes.
//! - [`backends::ScriptedProvider`]: deterministic provider used by tests
//!   and by the CLI replay command.

pub mod backends;
pub mod classify;
pub mod key_manager;

pub use backends::{OpenRecord, ScriptStep, ScriptedAttempt, ScriptedProvider};
pub use classify::{classify_message, classify_status};
pub use key_manager::{KeyManager, KeyManagerStatus};
