//! Provider failure classification.
//!
//! Gemini and Groq report failures through HTTP status codes and through
//! status words embedded in the error text (`RESOURCE_EXHAUSTED`,
//! `UNAVAILABLE`, ...). Both are folded into a [`ProviderError`] so the
//! orchestrator can pick the right recovery.

use once_cell::sync::Lazy;
use regex::Regex;
use zalobot_core::ProviderError;

static STATUS_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(401|403|429|500|502|503|504)\b").expect("valid regex"));

const AUTH_MARKERS: &[&str] = &[
    "permission_denied",
    "permission denied",
    "api key not valid",
    "api_key_invalid",
    "unauthenticated",
    "unauthorized",
];

const RATE_LIMIT_MARKERS: &[&str] = &[
    "resource_exhausted",
    "rate limit",
    "rate_limit",
    "too many requests",
    "quota",
];

const OVERLOAD_MARKERS: &[&str] = &[
    "unavailable",
    "overloaded",
    "internal error",
    "deadline_exceeded",
    "try again later",
];

/// Classify an HTTP status code.
pub fn classify_status(status: u16, message: impl Into<String>) -> ProviderError {
    let message = message.into();
    match status {
        401 | 403 => ProviderError::AuthDenied(message),
        429 => ProviderError::RateLimited(message),
        500 | 502 | 503 | 504 => ProviderError::Overloaded(message),
        _ => ProviderError::Other(message),
    }
}

/// Classify a provider error message that carries no structured status.
pub fn classify_message(message: &str) -> ProviderError {
    if let Some(code) = STATUS_CODE
        .captures(message)
        .and_then(|caps| caps[1].parse::<u16>().ok())
    {
        return classify_status(code, message);
    }

    let lower = message.to_lowercase();
    let has = |markers: &[&str]| markers.iter().any(|m| lower.contains(m));
    if has(AUTH_MARKERS) {
        ProviderError::AuthDenied(message.to_string())
    } else if has(RATE_LIMIT_MARKERS) {
        ProviderError::RateLimited(message.to_string())
    } else if has(OVERLOAD_MARKERS) {
        ProviderError::Overloaded(message.to_string())
    } else {
        ProviderError::Other(message.to_string())
    }
}
