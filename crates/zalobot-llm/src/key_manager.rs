//! API key and model rotation.
//!
//! Keys are tried in order on the preferred model first; once every key is
//! unusable on a model the manager walks to the next fallback model. A
//! permission-denied key is dropped for the rest of the process, while a
//! rate-limited key/model pair only sits out a cooldown.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{debug, warn};
use zalobot_core::{config_err, KeyManagerConfig, KeyRotation, Result, StreamTarget};

#[derive(Debug)]
struct RotationState {
    key_index: usize,
    model_index: usize,
    /// Keys rejected with permission denied.
    denied: Vec<bool>,
    /// (key, model) pairs on rate-limit cooldown, with their expiry.
    cooldowns: HashMap<(usize, usize), Instant>,
}

impl RotationState {
    fn is_usable(&mut self, key: usize, model: usize, now: Instant) -> bool {
        if self.denied[key] {
            return false;
        }
        match self.cooldowns.get(&(key, model)) {
            Some(until) if *until > now => false,
            Some(_) => {
                self.cooldowns.remove(&(key, model));
                true
            }
            None => true,
        }
    }

    /// Move to the first usable pair: remaining keys on the current model
    /// first, then each later model from its first key. Returns `false`
    /// and leaves the position unchanged when nothing is usable.
    fn advance(&mut self, total_keys: usize, total_models: usize) -> bool {
        let now = Instant::now();
        for model_offset in 0..total_models {
            let model = (self.model_index + model_offset) % total_models;
            for key_offset in 0..total_keys {
                let key = if model_offset == 0 {
                    (self.key_index + 1 + key_offset) % total_keys
                } else {
                    key_offset
                };
                if self.is_usable(key, model, now) {
                    self.key_index = key;
                    self.model_index = model;
                    return true;
                }
            }
        }
        false
    }
}

/// Point-in-time view of the rotation state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyManagerStatus {
    pub key_index: usize,
    pub model: String,
    pub total_keys: usize,
    pub denied_keys: usize,
    pub cooling_pairs: usize,
}

/// Thread-safe key/model rotation manager.
#[derive(Debug)]
pub struct KeyManager {
    keys: Vec<String>,
    models: Vec<String>,
    cooldown: Duration,
    state: Mutex<RotationState>,
}

impl KeyManager {
    pub fn new(config: KeyManagerConfig) -> Result<Self> {
        if config.api_keys.is_empty() {
            return Err(config_err!("at least one API key is required"));
        }
        if config.models.is_empty() {
            return Err(config_err!("at least one model is required"));
        }
        let cooldown = config.rate_limit_cooldown();
        let state = RotationState {
            key_index: 0,
            model_index: 0,
            denied: vec![false; config.api_keys.len()],
            cooldowns: HashMap::new(),
        };
        Ok(Self {
            keys: config.api_keys,
            models: config.models,
            cooldown,
            state: Mutex::new(state),
        })
    }

    /// Override the rate-limit cooldown.
    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    /// Secret of the active key.
    pub fn current_key(&self) -> &str {
        let index = self.state.lock().key_index;
        &self.keys[index]
    }

    pub fn status(&self) -> KeyManagerStatus {
        let state = self.state.lock();
        let now = Instant::now();
        KeyManagerStatus {
            key_index: state.key_index,
            model: self.models[state.model_index].clone(),
            total_keys: self.keys.len(),
            denied_keys: state.denied.iter().filter(|d| **d).count(),
            cooling_pairs: state.cooldowns.values().filter(|until| **until > now).count(),
        }
    }

    /// Forget every block and go back to the first key and model.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.key_index = 0;
        state.model_index = 0;
        state.denied.iter_mut().for_each(|d| *d = false);
        state.cooldowns.clear();
    }
}

impl KeyRotation for KeyManager {
    fn rotate_on_auth_error(&self) -> bool {
        let mut state = self.state.lock();
        let failed = state.key_index;
        state.denied[failed] = true;

        let rotated = state.advance(self.keys.len(), self.models.len());
        if rotated {
            debug!(from = failed, to = state.key_index, "Key rotated after permission denied");
        } else {
            warn!(key_index = failed, "No usable key left after permission denied");
        }
        rotated
    }

    fn rotate_on_rate_limit(&self) -> bool {
        let mut state = self.state.lock();
        let pair = (state.key_index, state.model_index);
        state.cooldowns.insert(pair, Instant::now() + self.cooldown);

        let rotated = state.advance(self.keys.len(), self.models.len());
        if rotated {
            debug!(
                from_key = pair.0,
                to_key = state.key_index,
                model = %self.models[state.model_index],
                "Key/model rotated after rate limit"
            );
        } else {
            warn!("Every key/model pair is rate limited or blocked");
        }
        rotated
    }

    fn current_key_index(&self) -> usize {
        self.state.lock().key_index
    }

    fn current_model_name(&self) -> String {
        let index = self.state.lock().model_index;
        self.models[index].clone()
    }

    fn total_keys(&self) -> usize {
        self.keys.len()
    }

    fn current_target(&self) -> StreamTarget {
        let state = self.state.lock();
        StreamTarget {
            key_index: state.key_index,
            model: self.models[state.model_index].clone(),
        }
    }
}
