//! Configuration for the streaming protocol and the key-rotation manager.
//!
//! Values come from three layers, lowest priority first: compiled defaults,
//! a TOML file, then environment variables.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Default values.
pub mod defaults {
    /// Overload retries allowed per stream call.
    pub const MAX_RETRIES: u32 = 3;
    /// First backoff delay; doubles on every further overload retry.
    pub const BASE_DELAY_MS: u64 = 1_000;
    /// Input budget checked before a provider is contacted.
    pub const MAX_INPUT_TOKENS: usize = 128_000;
    /// How long a rate-limited key/model pair stays out of rotation.
    pub const RATE_LIMIT_COOLDOWN_SECS: u64 = 60;
    pub const TOKEN_LIMIT_MESSAGE: &str =
        "Tin nhắn quá dài, mình không xử lý được. Bạn rút gọn lại giúp mình nhé!";
    pub const MODEL: &str = "gemini-2.5-flash";
}

/// Environment variable names.
pub mod env_vars {
    pub const MAX_RETRIES: &str = "ZALOBOT_MAX_RETRIES";
    pub const RETRY_BASE_DELAY_MS: &str = "ZALOBOT_RETRY_BASE_DELAY_MS";
    pub const MAX_INPUT_TOKENS: &str = "ZALOBOT_MAX_INPUT_TOKENS";
    pub const RATE_LIMIT_COOLDOWN_SECS: &str = "ZALOBOT_RATE_LIMIT_COOLDOWN_SECS";
    /// Comma separated list of provider API keys.
    pub const API_KEYS: &str = "GEMINI_API_KEYS";
    /// Comma separated list of models, in fallback order.
    pub const MODELS: &str = "GEMINI_MODELS";
    /// Emit logs as JSON lines.
    pub const LOG_JSON: &str = "ZALOBOT_LOG_JSON";

    /// Read and parse an environment variable, ignoring unparsable values.
    pub fn parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
        std::env::var(name).ok().and_then(|s| s.trim().parse().ok())
    }

    /// Read a comma separated list, dropping empty entries.
    pub fn list(name: &str) -> Option<Vec<String>> {
        let raw = std::env::var(name).ok()?;
        let items: Vec<String> = raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if items.is_empty() {
            None
        } else {
            Some(items)
        }
    }
}

/// Overload retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of backoff retries for overload errors.
    #[serde(default = "RetryConfig::default_max_retries")]
    pub max_retries: u32,

    /// Base delay in milliseconds for exponential backoff.
    #[serde(default = "RetryConfig::default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl RetryConfig {
    fn default_max_retries() -> u32 {
        defaults::MAX_RETRIES
    }

    fn default_base_delay_ms() -> u64 {
        defaults::BASE_DELAY_MS
    }

    /// Delay before overload retry number `retry_count` (1-based):
    /// `base * 2^(retry_count - 1)`.
    pub fn backoff_delay(&self, retry_count: u32) -> Duration {
        let exponent = retry_count.saturating_sub(1).min(20);
        Duration::from_millis(self.base_delay_ms.saturating_mul(1_u64 << exponent))
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: Self::default_max_retries(),
            base_delay_ms: Self::default_base_delay_ms(),
        }
    }
}

/// Configuration for one streaming generation call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    #[serde(default)]
    pub retry: RetryConfig,

    /// Estimated input tokens above which the provider is never called.
    #[serde(default = "StreamConfig::default_max_input_tokens")]
    pub max_input_tokens: usize,

    /// Notice sent to the user when the input is over budget.
    #[serde(default = "StreamConfig::default_token_limit_message")]
    pub token_limit_message: String,
}

impl StreamConfig {
    fn default_max_input_tokens() -> usize {
        defaults::MAX_INPUT_TOKENS
    }

    fn default_token_limit_message() -> String {
        defaults::TOKEN_LIMIT_MESSAGE.to_string()
    }

    /// Parse a TOML document. Missing fields fall back to defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Load a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&raw)
    }

    /// Apply `ZALOBOT_*` environment overrides on top of the current values.
    pub fn apply_env_overrides(mut self) -> Self {
        if let Some(v) = env_vars::parsed(env_vars::MAX_RETRIES) {
            self.retry.max_retries = v;
        }
        if let Some(v) = env_vars::parsed(env_vars::RETRY_BASE_DELAY_MS) {
            self.retry.base_delay_ms = v;
        }
        if let Some(v) = env_vars::parsed(env_vars::MAX_INPUT_TOKENS) {
            self.max_input_tokens = v;
        }
        self
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Self {
        Self::default().apply_env_overrides()
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            retry: RetryConfig::default(),
            max_input_tokens: Self::default_max_input_tokens(),
            token_limit_message: Self::default_token_limit_message(),
        }
    }
}

/// Keys and models available to the rotation manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyManagerConfig {
    pub api_keys: Vec<String>,

    /// Models in fallback order; the first is preferred.
    #[serde(default = "KeyManagerConfig::default_models")]
    pub models: Vec<String>,

    #[serde(default = "KeyManagerConfig::default_rate_limit_cooldown_secs")]
    pub rate_limit_cooldown_secs: u64,
}

impl KeyManagerConfig {
    fn default_models() -> Vec<String> {
        vec![defaults::MODEL.to_string()]
    }

    fn default_rate_limit_cooldown_secs() -> u64 {
        defaults::RATE_LIMIT_COOLDOWN_SECS
    }

    pub fn new(api_keys: Vec<String>, models: Vec<String>) -> Self {
        Self {
            api_keys,
            models,
            rate_limit_cooldown_secs: Self::default_rate_limit_cooldown_secs(),
        }
    }

    /// Build from `GEMINI_API_KEYS` / `GEMINI_MODELS`.
    pub fn from_env() -> Result<Self> {
        let api_keys = env_vars::list(env_vars::API_KEYS).ok_or_else(|| {
            crate::config_err!("{} is not set or empty", env_vars::API_KEYS)
        })?;
        let models = env_vars::list(env_vars::MODELS).unwrap_or_else(Self::default_models);
        let rate_limit_cooldown_secs = env_vars::parsed(env_vars::RATE_LIMIT_COOLDOWN_SECS)
            .unwrap_or_else(Self::default_rate_limit_cooldown_secs);
        Ok(Self {
            api_keys,
            models,
            rate_limit_cooldown_secs,
        })
    }

    pub fn rate_limit_cooldown(&self) -> Duration {
        Duration::from_secs(self.rate_limit_cooldown_secs)
    }
}
