//! Token estimation for the input guard.
//!
//! Gives a conservative token count for Vietnamese, English, CJK and code
//! content without loading a real tokenizer.

use zalobot_core::ChatRequest;

/// Fixed overhead per history turn (role markers, separators).
const TURN_OVERHEAD_TOKENS: usize = 4;

/// Estimate token count for a text string.
///
/// Heuristic weights:
/// - CJK characters: ~1.8 tokens each
/// - ASCII letters: ~0.25 tokens each (about 4 letters per token)
/// - Accented Latin letters (Vietnamese): ~0.4 tokens each
/// - Special characters/punctuation: ~0.5 tokens each
pub fn estimate_tokens(text: &str) -> usize {
    let mut tokens = 0f64;

    for line in text.lines() {
        let cjk_count = line.chars().filter(|c| is_cjk(*c)).count() as f64;
        let ascii_count = line.chars().filter(|c| c.is_ascii_alphabetic()).count() as f64;
        let accented_count = line
            .chars()
            .filter(|c| c.is_alphabetic() && !c.is_ascii() && !is_cjk(*c))
            .count() as f64;
        let number_count = line.chars().filter(|c| c.is_ascii_digit()).count() as f64;
        let special_count = line.chars().filter(|c| !c.is_alphanumeric()).count() as f64;

        tokens += cjk_count * 1.8;
        tokens += ascii_count * 0.25;
        tokens += accented_count * 0.4;
        tokens += number_count * 0.3;
        tokens += special_count * 0.5;
    }

    (tokens * 1.1).ceil() as usize
}

fn is_cjk(c: char) -> bool {
    let cp = c as u32;
    (0x4E00..=0x9FFF).contains(&cp)
        || (0x3400..=0x4DBF).contains(&cp)
        || (0xF900..=0xFAFF).contains(&cp)
        || (0x3040..=0x30FF).contains(&cp)
        || (0xAC00..=0xD7AF).contains(&cp)
}

/// Estimate the tokens a request sends: prompt plus replayed history.
pub fn estimate_request_tokens(request: &ChatRequest) -> usize {
    let history: usize = request
        .history
        .iter()
        .map(|turn| estimate_tokens(&turn.text) + TURN_OVERHEAD_TOKENS)
        .sum();
    estimate_tokens(&request.prompt) + TURN_OVERHEAD_TOKENS + history
}

/// Result of the input token guard.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenCheck {
    pub allowed: bool,
    pub total_tokens: usize,
    pub max_tokens: usize,
}

/// Compare a request against the input budget.
pub fn check_input_tokens(request: &ChatRequest, max_tokens: usize) -> TokenCheck {
    let total_tokens = estimate_request_tokens(request);
    TokenCheck {
        allowed: total_tokens <= max_tokens,
        total_tokens,
        max_tokens,
    }
}
