//! Tag extraction over the accumulated response buffer.
//!
//! The parser is stateless: [`extract`] scans the whole buffer every time
//! and returns every action that is complete so far, each paired with its
//! dedup key. Filtering out what was already dispatched is the job of
//! [`ParserState`](crate::stream::ParserState).
//!
//! Families are scanned in a fixed order: undo, reaction, sticker, quote,
//! msg, card, image. Quote blocks are only honoured at the top level; a
//! quote written inside a msg block is dropped from the message text.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use zalobot_messages::{Action, ReactionSpec, UndoSelector};

use super::dictionary::normalize_reaction;
use super::repair::fix_stuck_tags;

macro_rules! tag_regex {
    ($vis:vis $name:ident, $pattern:expr) => {
        $vis static $name: Lazy<Regex> =
            Lazy::new(|| Regex::new($pattern).expect("valid tag pattern"));
    };
}

tag_regex!(pub(crate) REACTION, r"(?i)\[reaction:(?:(\d+):)?([^\]]+)\]");
tag_regex!(pub(crate) STICKER, r"(?i)\[sticker:(\w+)\]");
tag_regex!(UNDO, r"(?i)\[undo:(all|(-?\d+)(?::(-?\d+))?)\]");
tag_regex!(pub(crate) QUOTE, r"(?is)\[quote:(-?\d+)\](.*?)\[/quote\]");
tag_regex!(pub(crate) MSG, r"(?is)\[msg\](.*?)\[/msg\]");
// a msg block that may still be waiting for its closing marker
tag_regex!(OPEN_MSG, r"(?is)\[msg\].*?(?:\[/msg\]|\z)");
tag_regex!(pub(crate) CARD, r"(?i)\[card(?::(\d+))?\]");
tag_regex!(IMAGE, r"(?is)\[image:(https?://[^\]]+)\](.*?)\[/image\]");
tag_regex!(
    TOOL,
    r"(?is)\[tool:\w+(?:\s+[^\]]*?)?\](?:\s*\{.*?\}\s*\[/tool\])?"
);
tag_regex!(
    TABLE_OR_CODE,
    r"(\|[^\n]+\|\n\|[-:\s|]+\|)|(```\w*\n[\s\S]*?```)"
);

/// An extractable action and the key it is deduplicated by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub key: String,
    pub action: Action,
}

impl Candidate {
    fn new(key: String, action: Action) -> Self {
        Self { key, action }
    }
}

/// Every action currently extractable from `buffer`, in dispatch order.
///
/// Calling this on an unchanged buffer yields the same list; calling it on
/// a longer buffer yields a list whose keys include all earlier keys, as
/// long as the extra text only completes or appends tags.
pub fn extract(buffer: &str) -> Vec<Candidate> {
    let text = fix_stuck_tags(buffer);
    let text = text.as_ref();
    let mut out = Vec::new();

    scan_undos(text, &mut out);
    scan_reactions(text, &mut out);
    scan_stickers(text, &mut out);
    scan_quotes(text, &mut out);
    scan_msgs(text, &mut out);
    scan_cards(text, &mut out);
    scan_images(text, &mut out);

    out
}

/// Text left after removing every recognized tag, trimmed.
pub fn plain_text(buffer: &str) -> String {
    let repaired = fix_stuck_tags(buffer);
    let stripped = [
        &*REACTION, &*STICKER, &*QUOTE, &*MSG, &*UNDO, &*CARD, &*TOOL, &*IMAGE,
    ]
    .iter()
    .fold(repaired.into_owned(), |text, pattern| {
        pattern.replace_all(&text, "").into_owned()
    });
    stripped.trim().to_string()
}

/// Whether `text` contains a markdown table or a fenced code block.
pub fn has_table_or_code(text: &str) -> bool {
    TABLE_OR_CODE.is_match(text)
}

fn scan_undos(text: &str, out: &mut Vec<Candidate>) {
    for caps in UNDO.captures_iter(text) {
        let Some(selector) = parse_undo(&caps) else {
            continue;
        };
        let key = format!("undo:{}", caps[1].to_ascii_lowercase());
        out.push(Candidate::new(key, Action::undo(selector)));
    }
}

fn parse_undo(caps: &Captures<'_>) -> Option<UndoSelector> {
    if caps[1].eq_ignore_ascii_case("all") {
        return Some(UndoSelector::All);
    }
    let start = caps.get(2)?.as_str().parse().ok()?;
    match caps.get(3) {
        Some(end) => Some(UndoSelector::Range {
            start,
            end: end.as_str().parse().ok()?,
        }),
        None => Some(UndoSelector::Single(start)),
    }
}

fn scan_reactions(text: &str, out: &mut Vec<Candidate>) {
    for caps in REACTION.captures_iter(text) {
        let Some(kind) = normalize_reaction(caps[2].trim()) else {
            continue;
        };
        let index = caps.get(1).map(|m| m.as_str()).unwrap_or("");
        let target_index = if index.is_empty() {
            None
        } else {
            match index.parse() {
                Ok(i) => Some(i),
                Err(_) => continue,
            }
        };
        let key = format!("reaction:{}:{}", index, kind);
        out.push(Candidate::new(
            key,
            Action::Reaction(ReactionSpec::new(kind, target_index)),
        ));
    }
}

fn scan_stickers(text: &str, out: &mut Vec<Candidate>) {
    for caps in STICKER.captures_iter(text) {
        let keyword = &caps[1];
        out.push(Candidate::new(
            format!("sticker:{}", keyword),
            Action::sticker(keyword),
        ));
    }
}

fn scan_cards(text: &str, out: &mut Vec<Candidate>) {
    for caps in CARD.captures_iter(text) {
        let user_id = caps.get(1).map(|m| m.as_str().to_string());
        let key = format!("card:{}", user_id.as_deref().unwrap_or(""));
        out.push(Candidate::new(key, Action::card(user_id)));
    }
}

fn scan_images(text: &str, out: &mut Vec<Candidate>) {
    for caps in IMAGE.captures_iter(text) {
        let url = &caps[1];
        let caption = caps[2].trim();
        let caption = (!caption.is_empty()).then(|| caption.to_string());
        out.push(Candidate::new(
            format!("image:{}", url),
            Action::image(url, caption),
        ));
    }
}

/// Top-level quote replies. Msg blocks, including one still open at the
/// end of the buffer, are cut out first so nested quotes are not seen.
fn scan_quotes(text: &str, out: &mut Vec<Candidate>) {
    let outside_msg = OPEN_MSG.replace_all(text, "");
    for caps in QUOTE.captures_iter(&outside_msg) {
        let Ok(index) = caps[1].parse::<i64>() else {
            continue;
        };
        let body = caps[2].trim();
        if body.is_empty() {
            continue;
        }
        scan_inline(body, out);
        let clean = clean_inline(body);
        if !clean.is_empty() {
            out.push(Candidate::new(
                format!("quote:{}:{}", index, body),
                Action::message(clean, Some(index)),
            ));
        }
    }
}

fn scan_msgs(text: &str, out: &mut Vec<Candidate>) {
    for caps in MSG.captures_iter(text) {
        let without_quotes = QUOTE.replace_all(caps[1].trim(), "");
        let body = without_quotes.trim();
        if body.is_empty() {
            continue;
        }
        scan_inline(body, out);
        let clean = clean_inline(body);
        if !clean.is_empty() {
            out.push(Candidate::new(
                format!("msg:{}", body),
                Action::message(clean, None),
            ));
        }
    }
}

/// Tags nested inside a quote or msg body run before the body's text.
fn scan_inline(body: &str, out: &mut Vec<Candidate>) {
    let body = fix_stuck_tags(body);
    scan_undos(&body, out);
    scan_reactions(&body, out);
    scan_stickers(&body, out);
    scan_cards(&body, out);
}

fn clean_inline(body: &str) -> String {
    let cleaned = [&*REACTION, &*STICKER, &*UNDO, &*CARD, &*IMAGE]
        .iter()
        .fold(body.to_string(), |text, pattern| {
            pattern.replace_all(&text, "").into_owned()
        });
    cleaned.trim().to_string()
}
