//! Memory dispatcher (for testing).

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::Mutex;
use zalobot_core::ProviderError;

use crate::action::{Action, ActionKind, ReactionSpec, UndoSelector};
use crate::callbacks::StreamCallbacks;
use crate::error::{Error, Result};

/// Everything a dispatcher observed, in call order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DispatchEvent {
    Action(Action),
    Complete,
    Error { message: String },
}

/// In-memory dispatcher that records every call.
///
/// Clones share the same log, so a test can keep one handle while the
/// orchestrator drives another.
#[derive(Debug, Clone, Default)]
pub struct MemoryDispatcher {
    events: Arc<Mutex<Vec<DispatchEvent>>>,
    failing: Arc<HashSet<ActionKind>>,
}

impl MemoryDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call for `kinds` fail after being recorded.
    pub fn failing_on(kinds: impl IntoIterator<Item = ActionKind>) -> Self {
        Self {
            events: Arc::default(),
            failing: Arc::new(kinds.into_iter().collect()),
        }
    }

    async fn record(&self, action: Action) -> Result<()> {
        let kind = action.kind();
        self.events.lock().await.push(DispatchEvent::Action(action));
        if self.failing.contains(&kind) {
            return Err(Error::send_failed(format!("{:?} rejected", kind)));
        }
        Ok(())
    }

    pub async fn events(&self) -> Vec<DispatchEvent> {
        self.events.lock().await.clone()
    }

    pub async fn actions(&self) -> Vec<Action> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|event| match event {
                DispatchEvent::Action(action) => Some(action.clone()),
                _ => None,
            })
            .collect()
    }

    /// Texts of dispatched messages, in order.
    pub async fn messages(&self) -> Vec<String> {
        self.actions()
            .await
            .into_iter()
            .filter_map(|action| match action {
                Action::Message { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub async fn count(&self, kind: ActionKind) -> usize {
        self.actions()
            .await
            .iter()
            .filter(|action| action.kind() == kind)
            .count()
    }

    pub async fn completed(&self) -> usize {
        self.events
            .lock()
            .await
            .iter()
            .filter(|event| matches!(event, DispatchEvent::Complete))
            .count()
    }

    pub async fn errors(&self) -> Vec<String> {
        self.events
            .lock()
            .await
            .iter()
            .filter_map(|event| match event {
                DispatchEvent::Error { message } => Some(message.clone()),
                _ => None,
            })
            .collect()
    }

    pub async fn clear(&self) {
        self.events.lock().await.clear();
    }
}

#[async_trait]
impl StreamCallbacks for MemoryDispatcher {
    async fn on_reaction(&self, reaction: &ReactionSpec) -> Result<()> {
        self.record(Action::Reaction(*reaction)).await
    }

    async fn on_sticker(&self, keyword: &str) -> Result<()> {
        self.record(Action::sticker(keyword)).await
    }

    async fn on_message(&self, text: &str, quote_index: Option<i64>) -> Result<()> {
        self.record(Action::message(text, quote_index)).await
    }

    async fn on_card(&self, user_id: Option<&str>) -> Result<()> {
        self.record(Action::card(user_id.map(str::to_string))).await
    }

    async fn on_undo(&self, selector: &UndoSelector) -> Result<()> {
        self.record(Action::undo(*selector)).await
    }

    async fn on_image(&self, url: &str, caption: Option<&str>) -> Result<()> {
        self.record(Action::image(url, caption.map(str::to_string))).await
    }

    async fn on_complete(&self) {
        self.events.lock().await.push(DispatchEvent::Complete);
    }

    async fn on_error(&self, error: &ProviderError) {
        self.events.lock().await.push(DispatchEvent::Error {
            message: error.to_string(),
        });
    }
}
