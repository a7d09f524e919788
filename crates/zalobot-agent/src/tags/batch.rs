//! Whole-response parsing.
//!
//! Used when a reply arrives in one piece (non-streaming providers, replays
//! of stored answers). Unlike the streaming parser this groups the reply by
//! what the bot has to do with it and tolerates text written right after a
//! `[/quote]`, which models often use as the actual answer.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::debug;
use zalobot_messages::{Action, ReactionKind, ReactionSpec, UndoSelector};

use super::dictionary::normalize_reaction;
use super::parser::{CARD, MSG, QUOTE, REACTION, STICKER};
use super::repair::fix_stuck_tags;

static UNDO_INDEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\[undo:(-?\d+)\]").expect("valid undo pattern"));

/// Text sent when a reply yields nothing usable.
pub const FALLBACK_TEXT: &str = "Xin lỗi, mình gặp lỗi rồi!";

/// One outgoing item of a parsed reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ParsedMessage {
    Text {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        quote_index: Option<i64>,
    },
    Sticker {
        keyword: String,
    },
    /// `None` sends the bot's own card.
    Card {
        #[serde(skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
    },
}

impl ParsedMessage {
    fn text(text: impl Into<String>, quote_index: Option<i64>) -> Self {
        ParsedMessage::Text {
            text: text.into(),
            quote_index,
        }
    }

    fn into_action(self) -> Action {
        match self {
            ParsedMessage::Text { text, quote_index } => Action::message(text, quote_index),
            ParsedMessage::Sticker { keyword } => Action::sticker(keyword),
            ParsedMessage::Card { user_id } => Action::card(user_id),
        }
    }
}

/// A complete reply broken into reactions, outgoing messages and undos.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedResponse {
    pub reactions: Vec<ReactionSpec>,
    pub messages: Vec<ParsedMessage>,
    pub undo_indexes: Vec<i64>,
}

impl ParsedResponse {
    /// The apology reply used when nothing could be parsed.
    pub fn fallback() -> Self {
        Self {
            reactions: vec![ReactionSpec::new(ReactionKind::Like, None)],
            messages: vec![ParsedMessage::text(FALLBACK_TEXT, None)],
            undo_indexes: Vec::new(),
        }
    }

    /// Flatten into dispatch order: undos, reactions, then messages.
    pub fn into_actions(self) -> Vec<Action> {
        let undos = self
            .undo_indexes
            .into_iter()
            .map(|index| Action::undo(UndoSelector::Single(index)));
        let reactions = self.reactions.into_iter().map(Action::Reaction);
        let messages = self.messages.into_iter().map(ParsedMessage::into_action);
        undos.chain(reactions).chain(messages).collect()
    }
}

/// Parse a complete reply.
pub fn parse_response(text: &str) -> ParsedResponse {
    let fixed = fix_stuck_tags(text);
    let fixed = fixed.as_ref();

    let reactions: Vec<ReactionSpec> = REACTION
        .captures_iter(fixed)
        .filter_map(|caps| {
            let kind = normalize_reaction(caps[2].trim())?;
            let target_index = match caps.get(1) {
                Some(index) => Some(index.as_str().parse().ok()?),
                None => None,
            };
            Some(ReactionSpec::new(kind, target_index))
        })
        .collect();

    let mut messages: Vec<ParsedMessage> = STICKER
        .captures_iter(fixed)
        .map(|caps| ParsedMessage::Sticker {
            keyword: caps[1].to_string(),
        })
        .collect();

    // quote bodies absorb the text that follows `[/quote]` up to the next tag
    let mut outside_quotes = String::with_capacity(fixed.len());
    let mut last_end = 0;
    for caps in QUOTE.captures_iter(fixed) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let rest = &fixed[whole.end()..];
        let trailing_len = rest.find('[').unwrap_or(rest.len());
        let trailing = rest[..trailing_len].trim();

        outside_quotes.push_str(&fixed[last_end..whole.start()]);
        last_end = whole.end() + trailing_len;

        let Ok(quote_index) = caps[1].parse::<i64>() else {
            continue;
        };
        let inside = caps[2].trim();
        let full = if trailing.is_empty() {
            inside.to_string()
        } else {
            format!("{} {}", inside, trailing).trim().to_string()
        };
        if !full.is_empty() {
            messages.push(ParsedMessage::text(full, Some(quote_index)));
        }
    }
    outside_quotes.push_str(&fixed[last_end..]);

    messages.extend(
        MSG.captures_iter(fixed)
            .map(|caps| ParsedMessage::text(caps[1].trim(), None)),
    );

    let undo_indexes: Vec<i64> = UNDO_INDEX
        .captures_iter(fixed)
        .filter_map(|caps| caps[1].parse().ok())
        .collect();

    messages.extend(CARD.captures_iter(fixed).map(|caps| ParsedMessage::Card {
        user_id: caps.get(1).map(|m| m.as_str().to_string()),
    }));

    let plain = [&*REACTION, &*STICKER, &*MSG, &*UNDO_INDEX, &*CARD]
        .iter()
        .fold(outside_quotes, |text, pattern| {
            pattern.replace_all(&text, "").into_owned()
        });
    let plain = plain.trim();
    if !plain.is_empty() {
        messages.insert(0, ParsedMessage::text(plain, None));
    }

    if messages.is_empty() && reactions.is_empty() {
        debug!("Empty parse result, using fallback reply");
        return ParsedResponse::fallback();
    }

    debug!(
        reactions = reactions.len(),
        messages = messages.len(),
        undos = undo_indexes.len(),
        "Parsed response"
    );
    ParsedResponse {
        reactions,
        messages,
        undo_indexes,
    }
}
