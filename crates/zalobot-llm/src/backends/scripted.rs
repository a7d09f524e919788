//! Deterministic provider that replays scripted attempts.
//!
//! Every `open_stream` call pops the next [`ScriptedAttempt`] from the queue.
//! An attempt either fails before producing anything or yields its chunks in
//! order, optionally ending in a provider error. Opened and deleted sessions
//! are recorded so callers can assert on the session lifecycle.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use zalobot_core::llm::provider::{
    ChatProvider, ChatRequest, ProviderError, StreamTarget, TextStream,
};
use zalobot_core::SessionId;

/// One step of a scripted stream.
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptStep {
    /// Yield a text chunk.
    Chunk(String),
    /// Yield an error and end the stream.
    Fail(ProviderError),
    /// Pause before the next step (uses tokio time, so paused clocks apply).
    Delay(Duration),
}

/// A single scripted stream attempt.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptedAttempt {
    open_error: Option<ProviderError>,
    steps: Vec<ScriptStep>,
}

impl ScriptedAttempt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt that yields the given chunks and then ends cleanly.
    pub fn chunks<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            open_error: None,
            steps: chunks
                .into_iter()
                .map(|c| ScriptStep::Chunk(c.into()))
                .collect(),
        }
    }

    /// Split `text` into chunks of `chunk_size` characters.
    pub fn from_text(text: &str, chunk_size: usize) -> Self {
        let chars: Vec<char> = text.chars().collect();
        Self::chunks(
            chars
                .chunks(chunk_size.max(1))
                .map(|c| c.iter().collect::<String>()),
        )
    }

    /// Attempt whose stream cannot even be opened.
    pub fn fail_on_open(error: ProviderError) -> Self {
        Self {
            open_error: Some(error),
            steps: Vec::new(),
        }
    }

    pub fn chunk(mut self, text: impl Into<String>) -> Self {
        self.steps.push(ScriptStep::Chunk(text.into()));
        self
    }

    pub fn delay(mut self, duration: Duration) -> Self {
        self.steps.push(ScriptStep::Delay(duration));
        self
    }

    /// End the stream with `error` after the steps so far.
    pub fn then_fail(mut self, error: ProviderError) -> Self {
        self.steps.push(ScriptStep::Fail(error));
        self
    }

    pub fn steps(&self) -> &[ScriptStep] {
        &self.steps
    }
}

/// A recorded `open_stream` call.
#[derive(Debug, Clone)]
pub struct OpenRecord {
    pub session: SessionId,
    pub target: StreamTarget,
    pub prompt: String,
    pub history_len: usize,
    pub at: tokio::time::Instant,
}

/// Replays a queue of [`ScriptedAttempt`]s.
pub struct ScriptedProvider {
    name: String,
    attempts: Mutex<VecDeque<ScriptedAttempt>>,
    opened: Mutex<Vec<OpenRecord>>,
    deleted: Mutex<Vec<SessionId>>,
}

impl ScriptedProvider {
    pub fn new(attempts: impl IntoIterator<Item = ScriptedAttempt>) -> Self {
        Self {
            name: "scripted".to_string(),
            attempts: Mutex::new(attempts.into_iter().collect()),
            opened: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Attempts not consumed yet.
    pub fn remaining(&self) -> usize {
        self.attempts.lock().len()
    }

    pub fn opened(&self) -> Vec<OpenRecord> {
        self.opened.lock().clone()
    }

    pub fn open_count(&self) -> usize {
        self.opened.lock().len()
    }

    pub fn deleted_sessions(&self) -> Vec<SessionId> {
        self.deleted.lock().clone()
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn open_stream(
        &self,
        session: &SessionId,
        target: &StreamTarget,
        request: &ChatRequest,
    ) -> Result<TextStream, ProviderError> {
        self.opened.lock().push(OpenRecord {
            session: session.clone(),
            target: target.clone(),
            prompt: request.prompt.clone(),
            history_len: request.history.len(),
            at: tokio::time::Instant::now(),
        });

        let attempt = self
            .attempts
            .lock()
            .pop_front()
            .ok_or_else(|| ProviderError::other("no scripted attempt left"))?;

        if let Some(err) = attempt.open_error {
            return Err(err);
        }

        let steps = attempt.steps;
        Ok(Box::pin(async_stream::stream! {
            for step in steps {
                match step {
                    ScriptStep::Chunk(text) => yield Ok(text),
                    ScriptStep::Fail(err) => {
                        yield Err(err);
                        break;
                    }
                    ScriptStep::Delay(duration) => tokio::time::sleep(duration).await,
                }
            }
        }))
    }

    fn delete_session(&self, session: &SessionId) {
        self.deleted.lock().push(session.clone());
    }
}
