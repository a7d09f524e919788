//! Reaction vocabulary.
//!
//! Zalo only knows six reactions, but models like to answer with emoji.
//! Every supported glyph folds onto one of the six; anything else is not a
//! reaction and the tag carrying it is dropped.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use zalobot_messages::ReactionKind::{self, Angry, Haha, Heart, Like, Sad, Wow};

static EMOJI_REACTIONS: Lazy<HashMap<&'static str, ReactionKind>> = Lazy::new(|| {
    let mut map = HashMap::new();
    insert(
        &mut map,
        Heart,
        &[
            "❤️", "❤", "💖", "💕", "💗", "💓", "💘", "💝", "💞", "🥰", "😍", "🤗", "💔",
        ],
    );
    insert(
        &mut map,
        Like,
        &[
            "👍", "👍🏻", "👍🏼", "👍🏽", "👍🏾", "👍🏿", "👏", "🙌", "🫡", "✨", "🎉", "🥳", "🤩", "😎",
            "🔥", "💯",
        ],
    );
    insert(
        &mut map,
        Haha,
        &[
            "😂", "🤣", "😆", "😁", "😄", "🤭", "😜", "😝", "🤪", "🙃", "🤤", "🥲",
        ],
    );
    insert(
        &mut map,
        Wow,
        &[
            "😮", "😯", "😲", "🤯", "😱", "😳", "🫣", "🫠", "🧐", "🤓", "😦", "😧", "😨",
        ],
    );
    insert(
        &mut map,
        Sad,
        &["😢", "😭", "🥺", "😿", "💧", "😰", "😥", "😓", "😞", "😔"],
    );
    insert(
        &mut map,
        Angry,
        &["👎", "😡", "😠", "🤬", "💢", "👿", "😤", "🙄"],
    );
    // thinking / neutral faces read as a soft acknowledgement
    insert(
        &mut map,
        Like,
        &["🤔", "🤨", "🥸", "🤡", "😶", "😐", "😑", "😬", "🤫", "🤥"],
    );
    map
});

fn insert(
    map: &mut HashMap<&'static str, ReactionKind>,
    kind: ReactionKind,
    glyphs: &[&'static str],
) {
    for glyph in glyphs {
        map.insert(*glyph, kind);
    }
}

/// Parse one of the six canonical keywords, ignoring case.
pub fn parse_keyword(raw: &str) -> Option<ReactionKind> {
    ReactionKind::ALL
        .into_iter()
        .find(|kind| kind.as_str().eq_ignore_ascii_case(raw))
}

/// Map a raw reaction token to its canonical kind.
///
/// Keywords match case-insensitively; emoji must match exactly.
pub fn normalize_reaction(raw: &str) -> Option<ReactionKind> {
    parse_keyword(raw).or_else(|| EMOJI_REACTIONS.get(raw).copied())
}

/// Number of emoji glyphs the dictionary understands.
pub fn emoji_count() -> usize {
    EMOJI_REACTIONS.len()
}
