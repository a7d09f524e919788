//! Console dispatcher.

use async_trait::async_trait;
use zalobot_core::ProviderError;

use crate::action::{Action, ReactionSpec, UndoSelector};
use crate::callbacks::StreamCallbacks;
use crate::error::{Error, Result};

/// Prints every action to stdout, one line each.
#[derive(Debug, Clone)]
pub struct ConsoleDispatcher {
    name: String,
    enabled: bool,
    json: bool,
}

impl ConsoleDispatcher {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enabled: true,
            json: false,
        }
    }

    /// Print actions as JSON objects instead of plain text.
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    fn print(&self, action: &Action) -> Result<()> {
        if !self.enabled {
            return Err(Error::Disabled(self.name.clone()));
        }
        if self.json {
            let line = serde_json::to_string(action).map_err(anyhow::Error::from)?;
            println!("{}", line);
        } else {
            println!("[{}] {}", self.name, action);
        }
        Ok(())
    }
}

#[async_trait]
impl StreamCallbacks for ConsoleDispatcher {
    async fn on_reaction(&self, reaction: &ReactionSpec) -> Result<()> {
        self.print(&Action::Reaction(*reaction))
    }

    async fn on_sticker(&self, keyword: &str) -> Result<()> {
        self.print(&Action::sticker(keyword))
    }

    async fn on_message(&self, text: &str, quote_index: Option<i64>) -> Result<()> {
        self.print(&Action::message(text, quote_index))
    }

    async fn on_card(&self, user_id: Option<&str>) -> Result<()> {
        self.print(&Action::card(user_id.map(str::to_string)))
    }

    async fn on_undo(&self, selector: &UndoSelector) -> Result<()> {
        self.print(&Action::undo(*selector))
    }

    async fn on_image(&self, url: &str, caption: Option<&str>) -> Result<()> {
        self.print(&Action::image(url, caption.map(str::to_string)))
    }

    async fn on_complete(&self) {
        if self.enabled {
            println!("[{}] complete", self.name);
        }
    }

    async fn on_error(&self, error: &ProviderError) {
        if self.enabled {
            eprintln!("[{}] error: {}", self.name, error);
        }
    }
}
