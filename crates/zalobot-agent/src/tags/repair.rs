//! Stuck-tag repair.
//!
//! Models occasionally glue tags together or drop a closing bracket
//! (`[reaction:heart [msg]...`, `[[sticker:hi]]`, `[/msg` followed by
//! text). This pass rewrites the recoverable cases into well-formed tags
//! before extraction runs. Text it cannot recover is left as is, and a tag
//! still open at the very end of the buffer is never touched because the
//! rest of it may arrive with the next chunk.

use std::borrow::Cow;

use once_cell::sync::Lazy;
use regex::Regex;

const TAG_NAMES: &str = "reaction|sticker|undo|card|quote|msg|image";

static REPAIRS: Lazy<Vec<(Regex, &'static str)>> = Lazy::new(|| {
    let rule = |pattern: String, replacement: &'static str| {
        (Regex::new(&pattern).expect("valid repair pattern"), replacement)
    };
    vec![
        // [[tag...  ->  [tag...
        rule(format!(r"(?i)\[\[(/?(?:{}))", TAG_NAMES), "[${1}"),
        // [tag...]]  ->  [tag...]
        rule(
            format!(r"(?i)(\[/?(?:{})[^\[\]]*\])\]", TAG_NAMES),
            "${1}",
        ),
        // opener whose payload already ended without `]`
        rule(
            format!(r"(?i)\[({})(:[^\[\]\s]+)?([\s\[])", TAG_NAMES),
            "[${1}${2}]${3}",
        ),
        // closing marker missing its `]`
        rule(r"(?i)\[/(msg|quote|image)([^\]\w])".to_string(), "[/${1}]${2}"),
        // opener or closer repeated back to back
        rule(r"(?i)\[msg\](?:\s*\[msg\])+".to_string(), "[msg]"),
        rule(r"(?i)\[/msg\](?:\s*\[/msg\])+".to_string(), "[/msg]"),
    ]
});

/// Heal malformed tags. Returns the input borrowed when nothing changed.
pub fn fix_stuck_tags(input: &str) -> Cow<'_, str> {
    let mut text = Cow::Borrowed(input);
    for (pattern, replacement) in REPAIRS.iter() {
        let fixed = match pattern.replace_all(text.as_ref(), *replacement) {
            Cow::Owned(fixed) => Some(fixed),
            Cow::Borrowed(_) => None,
        };
        if let Some(fixed) = fixed {
            text = Cow::Owned(fixed);
        }
    }
    text
}
