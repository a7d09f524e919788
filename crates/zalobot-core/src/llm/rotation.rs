//! Key/model rotation interface.
//!
//! The rotation manager is shared across concurrent stream calls, so every
//! implementation must make "pick the next usable key/model" atomic.

use super::provider::StreamTarget;

/// Injected collaborator that owns the active credential and model.
pub trait KeyRotation: Send + Sync {
    /// Handle a permission-denied failure on the current key.
    /// Returns `false` when no usable key is left.
    fn rotate_on_auth_error(&self) -> bool;

    /// Handle a rate-limit failure on the current key/model pair.
    /// Returns `false` when every key/model pair is exhausted.
    fn rotate_on_rate_limit(&self) -> bool;

    fn current_key_index(&self) -> usize;

    fn current_model_name(&self) -> String;

    fn total_keys(&self) -> usize;

    /// Snapshot of the pair the next attempt should use.
    fn current_target(&self) -> StreamTarget {
        StreamTarget {
            key_index: self.current_key_index(),
            model: self.current_model_name(),
        }
    }
}
