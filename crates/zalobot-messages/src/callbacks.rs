//! The callback surface the stream orchestrator drives.

use async_trait::async_trait;
use zalobot_core::ProviderError;

use crate::action::{Action, ReactionSpec, UndoSelector};
use crate::error::Result;

/// Receiver of stream actions.
///
/// Every method has a no-op default so an adapter only wires up what it
/// supports. The orchestrator awaits each call before issuing the next one,
/// and calls each action method at most once per dedup key per attempt.
#[async_trait]
pub trait StreamCallbacks: Send + Sync {
    async fn on_reaction(&self, _reaction: &ReactionSpec) -> Result<()> {
        Ok(())
    }

    async fn on_sticker(&self, _keyword: &str) -> Result<()> {
        Ok(())
    }

    async fn on_message(&self, _text: &str, _quote_index: Option<i64>) -> Result<()> {
        Ok(())
    }

    async fn on_card(&self, _user_id: Option<&str>) -> Result<()> {
        Ok(())
    }

    async fn on_undo(&self, _selector: &UndoSelector) -> Result<()> {
        Ok(())
    }

    async fn on_image(&self, _url: &str, _caption: Option<&str>) -> Result<()> {
        Ok(())
    }

    /// The response is finished, including a cancelled response that
    /// already produced visible output.
    async fn on_complete(&self) {}

    /// Terminal failure after retries and rotations ran out.
    async fn on_error(&self, _error: &ProviderError) {}

    /// Route an [`Action`] to the matching method.
    async fn dispatch(&self, action: &Action) -> Result<()> {
        match action {
            Action::Reaction(spec) => self.on_reaction(spec).await,
            Action::Sticker { keyword } => self.on_sticker(keyword).await,
            Action::Message { text, quote_index } => self.on_message(text, *quote_index).await,
            Action::Undo { selector } => self.on_undo(selector).await,
            Action::Card { user_id } => self.on_card(user_id.as_deref()).await,
            Action::Image { url, caption } => self.on_image(url, caption.as_deref()).await,
        }
    }
}
