//! Action model: what a model reply can ask the bot to do.

use std::fmt;

use serde::{Deserialize, Serialize};

/// The six reactions Zalo supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Heart,
    Haha,
    Wow,
    Sad,
    Angry,
    Like,
}

impl ReactionKind {
    pub const ALL: [ReactionKind; 6] = [
        ReactionKind::Heart,
        ReactionKind::Haha,
        ReactionKind::Wow,
        ReactionKind::Sad,
        ReactionKind::Angry,
        ReactionKind::Like,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::Heart => "heart",
            ReactionKind::Haha => "haha",
            ReactionKind::Wow => "wow",
            ReactionKind::Sad => "sad",
            ReactionKind::Angry => "angry",
            ReactionKind::Like => "like",
        }
    }
}

impl fmt::Display for ReactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A reaction with an optional target message index in the incoming batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReactionSpec {
    pub kind: ReactionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_index: Option<i64>,
}

impl ReactionSpec {
    pub fn new(kind: ReactionKind, target_index: Option<i64>) -> Self {
        Self { kind, target_index }
    }
}

/// `heart` or `0:heart`, the form the platform adapter expects.
impl fmt::Display for ReactionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.target_index {
            Some(index) => write!(f, "{}:{}", index, self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

/// Which previously sent bot messages to recall. Negative indexes count
/// from the most recent message (`-1` is the latest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UndoSelector {
    Single(i64),
    Range { start: i64, end: i64 },
    All,
}

impl fmt::Display for UndoSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UndoSelector::Single(index) => write!(f, "{}", index),
            UndoSelector::Range { start, end } => write!(f, "{}:{}", start, end),
            UndoSelector::All => f.write_str("all"),
        }
    }
}

/// Discriminant of [`Action`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    Reaction,
    Sticker,
    Message,
    Undo,
    Card,
    Image,
}

/// One user-facing operation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    Reaction(ReactionSpec),
    Sticker {
        keyword: String,
    },
    Message {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        quote_index: Option<i64>,
    },
    Undo {
        selector: UndoSelector,
    },
    /// Contact card; `None` sends the bot's own card.
    Card {
        #[serde(skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
    },
    Image {
        url: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        caption: Option<String>,
    },
}

impl Action {
    pub fn reaction(kind: ReactionKind, target_index: Option<i64>) -> Self {
        Action::Reaction(ReactionSpec::new(kind, target_index))
    }

    pub fn sticker(keyword: impl Into<String>) -> Self {
        Action::Sticker {
            keyword: keyword.into(),
        }
    }

    pub fn message(text: impl Into<String>, quote_index: Option<i64>) -> Self {
        Action::Message {
            text: text.into(),
            quote_index,
        }
    }

    pub fn undo(selector: UndoSelector) -> Self {
        Action::Undo { selector }
    }

    pub fn card(user_id: Option<String>) -> Self {
        Action::Card { user_id }
    }

    pub fn image(url: impl Into<String>, caption: Option<String>) -> Self {
        Action::Image {
            url: url.into(),
            caption,
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Reaction(_) => ActionKind::Reaction,
            Action::Sticker { .. } => ActionKind::Sticker,
            Action::Message { .. } => ActionKind::Message,
            Action::Undo { .. } => ActionKind::Undo,
            Action::Card { .. } => ActionKind::Card,
            Action::Image { .. } => ActionKind::Image,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Reaction(spec) => write!(f, "reaction {}", spec),
            Action::Sticker { keyword } => write!(f, "sticker {}", keyword),
            Action::Message {
                text,
                quote_index: Some(index),
            } => write!(f, "message (quote {}) {:?}", index, text),
            Action::Message { text, .. } => write!(f, "message {:?}", text),
            Action::Undo { selector } => write!(f, "undo {}", selector),
            Action::Card { user_id: Some(id) } => write!(f, "card {}", id),
            Action::Card { user_id: None } => f.write_str("card (self)"),
            Action::Image {
                url,
                caption: Some(caption),
            } => write!(f, "image {} {:?}", url, caption),
            Action::Image { url, .. } => write!(f, "image {}", url),
        }
    }
}
