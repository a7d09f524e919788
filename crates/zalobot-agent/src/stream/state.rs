//! Per-attempt emission tracking.
//!
//! The parser re-reads the whole buffer after every chunk, so the same tag
//! shows up again and again. [`ParserState`] remembers which dedup keys were
//! already dispatched in this attempt and which message texts went out, and
//! lets through only what is new.

use std::collections::HashSet;

use tracing::debug;
use zalobot_messages::{Action, ActionKind};

use crate::tags::parser::{extract, has_table_or_code, plain_text, Candidate};

/// Share of a candidate that may repeat an earlier message before the
/// candidate counts as the same message still growing.
pub const MESSAGE_OVERLAP_THRESHOLD: f64 = 0.8;

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Fuzzy duplicate check for outgoing message text.
///
/// Both sides are trimmed and lowercased. The candidate is rejected when it
/// equals a sent message, when a sent message starts with it, or when it
/// starts with a sent message that covers more than
/// [`MESSAGE_OVERLAP_THRESHOLD`] of its characters.
pub fn should_send_message(candidate: &str, sent: &[String]) -> bool {
    let candidate = normalize(candidate);
    let candidate_len = candidate.chars().count();

    sent.iter().all(|previous| {
        let previous = normalize(previous);
        if candidate == previous || previous.starts_with(&candidate) {
            return false;
        }
        if candidate.starts_with(&previous) {
            let ratio = previous.chars().count() as f64 / candidate_len as f64;
            if ratio > MESSAGE_OVERLAP_THRESHOLD {
                return false;
            }
        }
        true
    })
}

/// Everything one stream attempt has emitted so far.
#[derive(Debug, Default)]
pub struct ParserState {
    buffer: String,
    sent_reactions: HashSet<String>,
    sent_stickers: HashSet<String>,
    sent_messages: HashSet<String>,
    sent_cards: HashSet<String>,
    sent_undos: HashSet<String>,
    sent_images: HashSet<String>,
    sent_message_texts: Vec<String>,
    dispatched: usize,
}

impl ParserState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_chunk(&mut self, chunk: &str) {
        self.buffer.push_str(chunk);
    }

    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    pub fn into_buffer(self) -> String {
        self.buffer
    }

    /// Texts of the messages let through, in order.
    pub fn sent_message_texts(&self) -> &[String] {
        &self.sent_message_texts
    }

    /// Number of actions let through in this attempt.
    pub fn dispatched(&self) -> usize {
        self.dispatched
    }

    /// Whether this attempt already produced user-visible output.
    pub fn has_partial_response(&self) -> bool {
        self.dispatched > 0
    }

    fn seen_mut(&mut self, kind: ActionKind) -> &mut HashSet<String> {
        match kind {
            ActionKind::Reaction => &mut self.sent_reactions,
            ActionKind::Sticker => &mut self.sent_stickers,
            ActionKind::Message => &mut self.sent_messages,
            ActionKind::Card => &mut self.sent_cards,
            ActionKind::Undo => &mut self.sent_undos,
            ActionKind::Image => &mut self.sent_images,
        }
    }

    /// Record `candidate` and report whether it should be dispatched.
    ///
    /// A key is recorded even when fuzzy suppression rejects the message:
    /// the same block would be rejected again on every later scan.
    pub fn admit(&mut self, candidate: &Candidate) -> bool {
        if !self.seen_mut(candidate.action.kind()).insert(candidate.key.clone()) {
            return false;
        }
        if let Action::Message { text, .. } = &candidate.action {
            if !should_send_message(text, &self.sent_message_texts) {
                debug!(key = %candidate.key, "Suppressed near-duplicate message");
                return false;
            }
            self.sent_message_texts.push(text.clone());
        }
        self.dispatched += 1;
        true
    }

    /// Scan the buffer and return the actions not dispatched yet, in order.
    pub fn take_new_actions(&mut self) -> Vec<Action> {
        extract(&self.buffer)
            .into_iter()
            .filter(|candidate| self.admit(candidate))
            .map(|candidate| candidate.action)
            .collect()
    }

    /// End-of-stream flush of text written outside any tag.
    ///
    /// Returns the text to send when no message went out yet, or when the
    /// leftover holds a table or code block, and it is not a near-duplicate.
    pub fn flush_plain_text(&mut self) -> Option<String> {
        let plain = plain_text(&self.buffer);
        if plain.is_empty() {
            return None;
        }
        let eligible = self.sent_message_texts.is_empty() || has_table_or_code(&plain);
        if !eligible || !should_send_message(&plain, &self.sent_message_texts) {
            return None;
        }
        self.sent_message_texts.push(plain.clone());
        self.dispatched += 1;
        Some(plain)
    }
}
