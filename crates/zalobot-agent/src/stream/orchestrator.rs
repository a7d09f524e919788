//! Stream orchestration with retry and failover.
//!
//! One call to [`StreamOrchestrator::generate_content_stream`] runs a
//! retry loop of stream attempts. Each attempt gets a fresh
//! [`ParserState`], feeds every chunk through the tag parser and dispatches
//! new actions in order. When an attempt fails the error class decides
//! what happens next:
//!
//! | Class | Recovery |
//! |-------|----------|
//! | `AuthDenied` | rotate key, retry immediately |
//! | `RateLimited` | rotate key/model, retry immediately |
//! | `Overloaded` | exponential backoff on the same key/model, capped |
//! | `Cancelled` | stop; close out partial output |
//! | `Other` | stop; report through `on_error` |

use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use zalobot_core::{
    ChatProvider, ChatRequest, ErrorClass, KeyRotation, ProviderError, SessionId, StreamConfig,
    StreamTarget,
};
use zalobot_messages::{Action, StreamCallbacks};

use super::state::ParserState;
use crate::tokenizer::check_input_tokens;

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct StreamOptions {
    /// Conversation thread; `None` runs in a temporary session.
    pub thread_id: Option<String>,

    /// Optional interrupt signal. When it flips to `true` the stream stops
    /// before processing the next chunk.
    pub interrupt_signal: Option<watch::Receiver<bool>>,
}

impl StreamOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_thread(thread_id: impl Into<String>) -> Self {
        Self {
            thread_id: Some(thread_id.into()),
            ..Self::default()
        }
    }

    pub fn with_interrupt_signal(mut self, rx: watch::Receiver<bool>) -> Self {
        self.interrupt_signal = Some(rx);
        self
    }

    /// Attach a fresh interrupt channel and hand back its sender.
    pub fn with_interrupt(self) -> (Self, watch::Sender<bool>) {
        let (tx, rx) = watch::channel(false);
        (self.with_interrupt_signal(rx), tx)
    }

    fn is_interrupted(&self) -> bool {
        self.interrupt_signal
            .as_ref()
            .map(|rx| *rx.borrow())
            .unwrap_or(false)
    }
}

/// How a stream call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamStatus {
    /// The stream ran to the end and `on_complete` was called.
    Completed,
    /// Cancelled by the caller.
    Aborted,
    /// Retries, keys or models ran out, or the error was not recoverable.
    Exhausted,
    /// The input was over the token budget; the provider was not called.
    TokenLimited,
}

/// Result of [`StreamOrchestrator::generate_content_stream`].
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOutcome {
    /// Raw text accumulated by the last attempt.
    pub text: String,
    pub status: StreamStatus,
    /// Stream attempts opened, including the successful one.
    pub attempts: u32,
    /// Backoff retries spent on overload errors.
    pub overload_retries: u32,
    /// The error that ended the call, for `Exhausted`.
    pub error: Option<ProviderError>,
}

/// Bookkeeping for one `generate_content_stream` call.
#[derive(Debug, Default)]
struct RetrySession {
    attempts: u32,
    overload_retries: u32,
    last_error: Option<ProviderError>,
    has_partial_response: bool,
}

impl RetrySession {
    fn outcome(&self, text: String, status: StreamStatus) -> StreamOutcome {
        StreamOutcome {
            text,
            status,
            attempts: self.attempts,
            overload_retries: self.overload_retries,
            error: self.last_error.clone(),
        }
    }
}

enum AttemptEnd {
    Finished,
    Cancelled,
}

/// What the retry loop does after a failed attempt.
enum Recovery {
    Retry,
    Cancel,
    GiveUp,
}

/// Drives provider streams into dispatched actions.
pub struct StreamOrchestrator {
    provider: Arc<dyn ChatProvider>,
    rotation: Arc<dyn KeyRotation>,
    config: StreamConfig,
}

impl StreamOrchestrator {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        rotation: Arc<dyn KeyRotation>,
        config: StreamConfig,
    ) -> Self {
        Self {
            provider,
            rotation,
            config,
        }
    }

    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Stream a reply for `request`, dispatching actions through `callbacks`.
    ///
    /// Always returns the text accumulated by the last attempt, whatever the
    /// outcome. Side effects already dispatched are never rolled back.
    pub async fn generate_content_stream(
        &self,
        request: &ChatRequest,
        callbacks: &dyn StreamCallbacks,
        options: StreamOptions,
    ) -> StreamOutcome {
        let mut retry = RetrySession::default();

        let check = check_input_tokens(request, self.config.max_input_tokens);
        if !check.allowed {
            warn!(
                total_tokens = check.total_tokens,
                max_tokens = check.max_tokens,
                "Input token limit exceeded"
            );
            let notice = self.config.token_limit_message.clone();
            if let Err(e) = callbacks.on_message(&notice, None).await {
                warn!(error = %e, "Failed to send token limit notice");
            }
            callbacks.on_complete().await;
            return retry.outcome(notice, StreamStatus::TokenLimited);
        }

        let session = SessionId::for_thread(options.thread_id.as_deref());
        info!(
            session = %session,
            provider = self.provider.name(),
            prompt_chars = request.prompt.chars().count(),
            history = request.history.len(),
            "Starting stream"
        );

        let mut text = String::new();
        loop {
            if options.is_interrupted() {
                info!(session = %session, "Stream cancelled between attempts");
                retry.last_error = None;
                return self.finish_cancelled(&retry, text, callbacks).await;
            }

            self.provider.delete_session(&session);
            let target = self.rotation.current_target();
            retry.attempts += 1;
            debug!(
                session = %session,
                attempt = retry.attempts,
                key_index = target.key_index,
                model = %target.model,
                "Opening stream"
            );

            let mut state = ParserState::new();
            let result = self
                .run_attempt(&session, &target, request, callbacks, &options, &mut state)
                .await;
            retry.has_partial_response |= state.has_partial_response();

            match result {
                Ok(AttemptEnd::Finished) => {
                    if let Some(plain) = state.flush_plain_text() {
                        if let Err(e) = callbacks.on_message(&plain, None).await {
                            warn!(error = %e, "Failed to send plain text");
                        }
                    }
                    if retry.overload_retries > 0 {
                        info!(
                            session = %session,
                            retries = retry.overload_retries,
                            "Stream succeeded after overload retries"
                        );
                    }
                    if session.is_temporary() {
                        self.provider.delete_session(&session);
                    }
                    callbacks.on_complete().await;
                    return retry.outcome(state.into_buffer(), StreamStatus::Completed);
                }
                Ok(AttemptEnd::Cancelled) => {
                    return self
                        .finish_cancelled(&retry, state.into_buffer(), callbacks)
                        .await;
                }
                Err(err) => {
                    text = state.into_buffer();
                    let recovery = self.recover(&mut retry, &err).await;
                    retry.last_error = Some(err);
                    match recovery {
                        Recovery::Retry => continue,
                        Recovery::Cancel => {
                            retry.last_error = None;
                            return self.finish_cancelled(&retry, text, callbacks).await;
                        }
                        Recovery::GiveUp => break,
                    }
                }
            }
        }

        let last_error = retry
            .last_error
            .clone()
            .unwrap_or_else(|| ProviderError::other("stream failed"));
        error!(
            session = %session,
            attempts = retry.attempts,
            error = %last_error,
            "Stream failed"
        );
        callbacks.on_error(&last_error).await;
        if !session.is_temporary() {
            self.provider.delete_session(&session);
        }
        retry.outcome(text, StreamStatus::Exhausted)
    }

    /// Open one stream and consume it into `state`.
    async fn run_attempt(
        &self,
        session: &SessionId,
        target: &StreamTarget,
        request: &ChatRequest,
        callbacks: &dyn StreamCallbacks,
        options: &StreamOptions,
        state: &mut ParserState,
    ) -> std::result::Result<AttemptEnd, ProviderError> {
        let mut stream = self.provider.open_stream(session, target, request).await?;

        while let Some(item) = stream.next().await {
            if options.is_interrupted() {
                debug!(session = %session, "Interrupt observed mid-stream");
                return Ok(AttemptEnd::Cancelled);
            }
            let chunk = item?;
            if chunk.is_empty() {
                continue;
            }
            state.push_chunk(&chunk);

            let actions = state.take_new_actions();
            if !actions.is_empty() {
                debug!(session = %session, count = actions.len(), "Dispatching actions");
            }
            dispatch_all(callbacks, &actions).await;
        }

        Ok(AttemptEnd::Finished)
    }

    /// Decide how to continue after `err`, rotating or sleeping as needed.
    async fn recover(&self, retry: &mut RetrySession, err: &ProviderError) -> Recovery {
        match err.class() {
            ErrorClass::AuthDenied => {
                if self.rotation.rotate_on_auth_error() {
                    warn!(
                        key_index = self.rotation.current_key_index(),
                        total_keys = self.rotation.total_keys(),
                        "Permission denied, switched key and retrying"
                    );
                    Recovery::Retry
                } else {
                    error!("Permission denied and no usable key left");
                    Recovery::GiveUp
                }
            }
            ErrorClass::RateLimited => {
                if self.rotation.rotate_on_rate_limit() {
                    warn!(
                        key_index = self.rotation.current_key_index(),
                        total_keys = self.rotation.total_keys(),
                        model = %self.rotation.current_model_name(),
                        "Rate limited, switched key/model and retrying"
                    );
                    Recovery::Retry
                } else {
                    error!("Rate limited on every key and model");
                    Recovery::GiveUp
                }
            }
            ErrorClass::Overloaded if retry.overload_retries < self.config.retry.max_retries => {
                retry.overload_retries += 1;
                let delay = self.config.retry.backoff_delay(retry.overload_retries);
                warn!(
                    retry = retry.overload_retries,
                    max_retries = self.config.retry.max_retries,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "Model overloaded, backing off"
                );
                tokio::time::sleep(delay).await;
                Recovery::Retry
            }
            ErrorClass::Cancelled => Recovery::Cancel,
            ErrorClass::Overloaded | ErrorClass::Other => Recovery::GiveUp,
        }
    }

    async fn finish_cancelled(
        &self,
        retry: &RetrySession,
        text: String,
        callbacks: &dyn StreamCallbacks,
    ) -> StreamOutcome {
        info!(partial = retry.has_partial_response, "Stream aborted");
        if retry.has_partial_response {
            callbacks.on_complete().await;
        }
        retry.outcome(text, StreamStatus::Aborted)
    }
}

/// Dispatch in order; a failing action is logged and skipped.
async fn dispatch_all(callbacks: &dyn StreamCallbacks, actions: &[Action]) {
    for action in actions {
        if let Err(e) = callbacks.dispatch(action).await {
            warn!(action = %action, error = %e, "Dispatch failed, skipping action");
        }
    }
}
