//! Stream Orchestrator Tests
//!
//! Tests include:
//! - Chunked streams dispatch each action exactly once
//! - Reaction spellings collapse into one dispatch
//! - Emission order within one scan (undo first, quote before msg)
//! - Overload backoff timing and retry cap
//! - Key rotation on permission denied and rate limits
//! - Cancellation with and without partial output
//! - End-of-stream plain text flush
//! - Input token guard
//! - Session cleanup

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::watch;
use zalobot_agent::{StreamOptions, StreamOrchestrator, StreamStatus};
use zalobot_core::{ChatRequest, KeyManagerConfig, ProviderError, RetryConfig, StreamConfig};
use zalobot_llm::{KeyManager, ScriptedAttempt, ScriptedProvider};
use zalobot_messages::{
    Action, ActionKind, MemoryDispatcher, ReactionKind, ReactionSpec, StreamCallbacks,
    UndoSelector,
};

fn key_manager(keys: usize, models: &[&str]) -> Arc<KeyManager> {
    let config = KeyManagerConfig::new(
        (0..keys).map(|i| format!("key-{}", i)).collect(),
        models.iter().map(|m| m.to_string()).collect(),
    );
    Arc::new(KeyManager::new(config).unwrap())
}

fn retry_config(max_retries: u32, base_delay_ms: u64) -> StreamConfig {
    StreamConfig {
        retry: RetryConfig {
            max_retries,
            base_delay_ms,
        },
        ..StreamConfig::default()
    }
}

fn setup(
    attempts: Vec<ScriptedAttempt>,
    keys: Arc<KeyManager>,
    config: StreamConfig,
) -> (Arc<ScriptedProvider>, StreamOrchestrator) {
    let provider = Arc::new(ScriptedProvider::new(attempts));
    let orchestrator = StreamOrchestrator::new(provider.clone(), keys, config);
    (provider, orchestrator)
}

fn single_attempt(attempt: ScriptedAttempt) -> (Arc<ScriptedProvider>, StreamOrchestrator) {
    setup(vec![attempt], key_manager(1, &["flash"]), StreamConfig::default())
}

/// Flips the interrupt signal as soon as the first message goes out.
struct InterruptOnMessage {
    inner: MemoryDispatcher,
    interrupt: watch::Sender<bool>,
}

#[async_trait]
impl StreamCallbacks for InterruptOnMessage {
    async fn on_message(
        &self,
        text: &str,
        quote_index: Option<i64>,
    ) -> zalobot_messages::Result<()> {
        self.inner.on_message(text, quote_index).await?;
        self.interrupt.send_replace(true);
        Ok(())
    }

    async fn on_complete(&self) {
        self.inner.on_complete().await;
    }

    async fn on_error(&self, error: &ProviderError) {
        self.inner.on_error(error).await;
    }
}

#[tokio::test]
async fn test_chunked_stream_dispatches_each_action_once() {
    let text = concat!(
        "[reaction:heart][msg]Chào bạn![/msg][sticker:hello]",
        "[reaction:❤️][reaction:💖][msg]Hôm nay thế nào?[/msg]",
    );
    let (_, orchestrator) = single_attempt(ScriptedAttempt::from_text(text, 3));
    let dispatcher = MemoryDispatcher::new();

    let outcome = orchestrator
        .generate_content_stream(&ChatRequest::new("Chào"), &dispatcher, StreamOptions::new())
        .await;

    assert_eq!(outcome.status, StreamStatus::Completed);
    assert_eq!(outcome.text, text);
    assert_eq!(
        dispatcher.actions().await,
        vec![
            Action::reaction(ReactionKind::Heart, None),
            Action::message("Chào bạn!", None),
            Action::sticker("hello"),
            Action::message("Hôm nay thế nào?", None),
        ]
    );
    assert_eq!(dispatcher.completed().await, 1);
    assert!(dispatcher.errors().await.is_empty());
}

#[tokio::test]
async fn test_targeted_reactions_are_distinct() {
    let (_, orchestrator) = single_attempt(ScriptedAttempt::chunks([
        "[reaction:0:like][reaction:1:like]",
        "[reaction:0:👍][reaction:like]",
    ]));
    let dispatcher = MemoryDispatcher::new();

    orchestrator
        .generate_content_stream(&ChatRequest::new("?"), &dispatcher, StreamOptions::new())
        .await;

    assert_eq!(
        dispatcher.actions().await,
        vec![
            Action::Reaction(ReactionSpec::new(ReactionKind::Like, Some(0))),
            Action::Reaction(ReactionSpec::new(ReactionKind::Like, Some(1))),
            Action::reaction(ReactionKind::Like, None),
        ]
    );
}

#[tokio::test]
async fn test_reaction_spellings_collapse_to_one() {
    let (_, orchestrator) = single_attempt(ScriptedAttempt::chunks([
        "[reaction:❤️]",
        "[reaction:💖]",
        "[reaction:heart]",
    ]));
    let dispatcher = MemoryDispatcher::new();

    orchestrator
        .generate_content_stream(&ChatRequest::new("?"), &dispatcher, StreamOptions::new())
        .await;

    assert_eq!(
        dispatcher.actions().await,
        vec![Action::reaction(ReactionKind::Heart, None)]
    );
    assert_eq!(dispatcher.count(ActionKind::Reaction).await, 1);
}

#[tokio::test]
async fn test_undo_goes_before_message_in_same_chunk() {
    let (_, orchestrator) = single_attempt(ScriptedAttempt::chunks(["[msg]Mới[/msg][undo:-1]"]));
    let dispatcher = MemoryDispatcher::new();

    orchestrator
        .generate_content_stream(&ChatRequest::new("sửa lại"), &dispatcher, StreamOptions::new())
        .await;

    assert_eq!(
        dispatcher.actions().await,
        vec![
            Action::undo(UndoSelector::Single(-1)),
            Action::message("Mới", None),
        ]
    );
}

#[tokio::test]
async fn test_msg_repeating_quote_is_suppressed() {
    let (_, orchestrator) = single_attempt(ScriptedAttempt::chunks([
        "[quote:2]Đúng rồi[/quote]",
        "[msg]đúng rồi[/msg]",
    ]));
    let dispatcher = MemoryDispatcher::new();

    orchestrator
        .generate_content_stream(&ChatRequest::new("?"), &dispatcher, StreamOptions::new())
        .await;

    assert_eq!(
        dispatcher.actions().await,
        vec![Action::message("Đúng rồi", Some(2))]
    );
}

#[tokio::test]
async fn test_failing_dispatch_does_not_stop_stream() {
    let (_, orchestrator) =
        single_attempt(ScriptedAttempt::chunks(["[sticker:hi]", "[msg]Vẫn gửi[/msg]"]));
    let dispatcher = MemoryDispatcher::failing_on([ActionKind::Sticker]);

    let outcome = orchestrator
        .generate_content_stream(&ChatRequest::new("?"), &dispatcher, StreamOptions::new())
        .await;

    assert_eq!(outcome.status, StreamStatus::Completed);
    assert_eq!(dispatcher.count(ActionKind::Sticker).await, 1);
    assert_eq!(dispatcher.messages().await, vec!["Vẫn gửi".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn test_overload_backoff_then_error() {
    let (provider, orchestrator) = setup(
        vec![
            ScriptedAttempt::fail_on_open(ProviderError::Overloaded("503".into())),
            ScriptedAttempt::fail_on_open(ProviderError::Overloaded("503".into())),
            ScriptedAttempt::fail_on_open(ProviderError::Overloaded("503".into())),
        ],
        key_manager(1, &["flash"]),
        retry_config(2, 100),
    );
    let dispatcher = MemoryDispatcher::new();

    let outcome = orchestrator
        .generate_content_stream(&ChatRequest::new("?"), &dispatcher, StreamOptions::new())
        .await;

    assert_eq!(outcome.status, StreamStatus::Exhausted);
    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.overload_retries, 2);
    assert_eq!(outcome.error, Some(ProviderError::Overloaded("503".into())));
    assert_eq!(dispatcher.errors().await.len(), 1);
    assert_eq!(dispatcher.completed().await, 0);

    let opened = provider.opened();
    assert_eq!(opened.len(), 3);
    let first_gap = opened[1].at - opened[0].at;
    let second_gap = opened[2].at - opened[1].at;
    assert!(first_gap >= Duration::from_millis(100) && first_gap < Duration::from_millis(150));
    assert!(second_gap >= Duration::from_millis(200) && second_gap < Duration::from_millis(250));
    // backoff stays on the same key and model
    assert!(opened.iter().all(|record| record.target == opened[0].target));
}

#[tokio::test(start_paused = true)]
async fn test_overload_recovers() {
    let (_, orchestrator) = setup(
        vec![
            ScriptedAttempt::fail_on_open(ProviderError::Overloaded("503".into())),
            ScriptedAttempt::chunks(["[msg]Ổn rồi[/msg]"]),
        ],
        key_manager(1, &["flash"]),
        retry_config(3, 50),
    );
    let dispatcher = MemoryDispatcher::new();

    let outcome = orchestrator
        .generate_content_stream(&ChatRequest::new("?"), &dispatcher, StreamOptions::new())
        .await;

    assert_eq!(outcome.status, StreamStatus::Completed);
    assert_eq!(outcome.overload_retries, 1);
    assert_eq!(dispatcher.messages().await, vec!["Ổn rồi".to_string()]);
    assert!(dispatcher.errors().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_retry_starts_with_fresh_state() {
    let (_, orchestrator) = setup(
        vec![
            ScriptedAttempt::chunks(["[msg]Xin chào[/msg]"])
                .then_fail(ProviderError::Overloaded("503".into())),
            ScriptedAttempt::chunks(["[msg]Xin chào[/msg]"]),
        ],
        key_manager(1, &["flash"]),
        retry_config(2, 10),
    );
    let dispatcher = MemoryDispatcher::new();

    let outcome = orchestrator
        .generate_content_stream(&ChatRequest::new("?"), &dispatcher, StreamOptions::new())
        .await;

    assert_eq!(outcome.status, StreamStatus::Completed);
    assert_eq!(
        dispatcher.messages().await,
        vec!["Xin chào".to_string(), "Xin chào".to_string()]
    );
}

#[tokio::test(start_paused = true)]
async fn test_auth_denied_rotates_immediately() {
    let (provider, orchestrator) = setup(
        vec![
            ScriptedAttempt::fail_on_open(ProviderError::AuthDenied("403".into())),
            ScriptedAttempt::chunks(["[msg]Chào[/msg]"]),
        ],
        key_manager(2, &["flash"]),
        retry_config(2, 1_000),
    );
    let dispatcher = MemoryDispatcher::new();

    let outcome = orchestrator
        .generate_content_stream(&ChatRequest::new("?"), &dispatcher, StreamOptions::new())
        .await;

    assert_eq!(outcome.status, StreamStatus::Completed);
    assert_eq!(outcome.overload_retries, 0);

    let opened = provider.opened();
    assert_eq!(opened[0].target.key_index, 0);
    assert_eq!(opened[1].target.key_index, 1);
    assert!(opened[1].at - opened[0].at < Duration::from_millis(1));
}

#[tokio::test]
async fn test_auth_denied_on_every_key() {
    let (provider, orchestrator) = setup(
        vec![
            ScriptedAttempt::fail_on_open(ProviderError::AuthDenied("403".into())),
            ScriptedAttempt::fail_on_open(ProviderError::AuthDenied("403".into())),
        ],
        key_manager(2, &["flash"]),
        StreamConfig::default(),
    );
    let dispatcher = MemoryDispatcher::new();

    let outcome = orchestrator
        .generate_content_stream(&ChatRequest::new("?"), &dispatcher, StreamOptions::new())
        .await;

    assert_eq!(outcome.status, StreamStatus::Exhausted);
    assert_eq!(provider.open_count(), 2);
    assert_eq!(dispatcher.errors().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_rate_limit_falls_back_to_next_model() {
    let (provider, orchestrator) = setup(
        vec![
            ScriptedAttempt::fail_on_open(ProviderError::RateLimited("429".into())),
            ScriptedAttempt::chunks(["[msg]Dùng model khác[/msg]"]),
        ],
        key_manager(1, &["flash", "flash-lite"]),
        StreamConfig::default(),
    );
    let dispatcher = MemoryDispatcher::new();

    let outcome = orchestrator
        .generate_content_stream(&ChatRequest::new("?"), &dispatcher, StreamOptions::new())
        .await;

    assert_eq!(outcome.status, StreamStatus::Completed);
    let opened = provider.opened();
    assert_eq!(opened[0].target.model, "flash");
    assert_eq!(opened[1].target.model, "flash-lite");
    assert!(opened[1].at - opened[0].at < Duration::from_millis(1));
    assert_eq!(outcome.overload_retries, 0);
}

#[tokio::test]
async fn test_rate_limit_exhausted() {
    let (provider, orchestrator) = single_attempt(ScriptedAttempt::fail_on_open(
        ProviderError::RateLimited("429".into()),
    ));
    let dispatcher = MemoryDispatcher::new();

    let outcome = orchestrator
        .generate_content_stream(&ChatRequest::new("?"), &dispatcher, StreamOptions::new())
        .await;

    assert_eq!(outcome.status, StreamStatus::Exhausted);
    assert_eq!(outcome.error, Some(ProviderError::RateLimited("429".into())));
    assert_eq!(provider.open_count(), 1);
    assert_eq!(dispatcher.errors().await.len(), 1);
}

#[tokio::test]
async fn test_unrecoverable_error_reports_once() {
    let (provider, orchestrator) = single_attempt(
        ScriptedAttempt::chunks(["[msg]Một nửa"]).then_fail(ProviderError::other("socket closed")),
    );
    let dispatcher = MemoryDispatcher::new();

    let outcome = orchestrator
        .generate_content_stream(&ChatRequest::new("?"), &dispatcher, StreamOptions::new())
        .await;

    assert_eq!(outcome.status, StreamStatus::Exhausted);
    assert_eq!(outcome.text, "[msg]Một nửa");
    assert_eq!(provider.open_count(), 1);
    assert_eq!(dispatcher.errors().await.len(), 1);
    assert!(dispatcher.actions().await.is_empty());
}

#[tokio::test]
async fn test_cancel_after_partial_output() {
    let (_, orchestrator) = single_attempt(ScriptedAttempt::chunks([
        "[msg]Một[/msg]",
        "[msg]Hai[/msg]",
        "[msg]Ba[/msg]",
    ]));
    let (options, tx) = StreamOptions::new().with_interrupt();
    let callbacks = InterruptOnMessage {
        inner: MemoryDispatcher::new(),
        interrupt: tx,
    };

    let outcome = orchestrator
        .generate_content_stream(&ChatRequest::new("?"), &callbacks, options)
        .await;

    assert_eq!(outcome.status, StreamStatus::Aborted);
    assert_eq!(outcome.text, "[msg]Một[/msg]");
    assert_eq!(callbacks.inner.messages().await, vec!["Một".to_string()]);
    assert_eq!(callbacks.inner.completed().await, 1);
    assert!(callbacks.inner.errors().await.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_backoff_closes_out_output() {
    let (provider, orchestrator) = setup(
        vec![
            ScriptedAttempt::chunks(["[msg]Một[/msg]"])
                .then_fail(ProviderError::Overloaded("503".into())),
            ScriptedAttempt::chunks(["[msg]Hai[/msg]"]),
        ],
        key_manager(1, &["flash"]),
        retry_config(2, 100),
    );
    let (options, tx) = StreamOptions::new().with_interrupt();
    let dispatcher = MemoryDispatcher::new();

    // fires halfway through the first backoff sleep
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send_replace(true);
    });

    let outcome = orchestrator
        .generate_content_stream(&ChatRequest::new("?"), &dispatcher, options)
        .await;
    canceller.await.unwrap();

    assert_eq!(outcome.status, StreamStatus::Aborted);
    assert_eq!(outcome.text, "[msg]Một[/msg]");
    assert_eq!(outcome.error, None);
    assert_eq!(outcome.overload_retries, 1);
    assert_eq!(provider.open_count(), 1);
    assert_eq!(dispatcher.messages().await, vec!["Một".to_string()]);
    assert_eq!(dispatcher.completed().await, 1);
    assert!(dispatcher.errors().await.is_empty());
}

#[tokio::test]
async fn test_cancel_before_start() {
    let (provider, orchestrator) = single_attempt(ScriptedAttempt::chunks(["[msg]Không[/msg]"]));
    let (options, tx) = StreamOptions::new().with_interrupt();
    tx.send_replace(true);
    let dispatcher = MemoryDispatcher::new();

    let outcome = orchestrator
        .generate_content_stream(&ChatRequest::new("?"), &dispatcher, options)
        .await;

    assert_eq!(outcome.status, StreamStatus::Aborted);
    assert_eq!(outcome.text, "");
    assert_eq!(provider.open_count(), 0);
    assert!(dispatcher.events().await.is_empty());
}

#[tokio::test]
async fn test_provider_cancel_without_output_is_silent() {
    let (_, orchestrator) = single_attempt(
        ScriptedAttempt::chunks(["Đang nghĩ"]).then_fail(ProviderError::Cancelled),
    );
    let dispatcher = MemoryDispatcher::new();

    let outcome = orchestrator
        .generate_content_stream(&ChatRequest::new("?"), &dispatcher, StreamOptions::new())
        .await;

    assert_eq!(outcome.status, StreamStatus::Aborted);
    assert_eq!(outcome.error, None);
    assert!(dispatcher.events().await.is_empty());
}

#[tokio::test]
async fn test_plain_text_flushed_at_end() {
    let (_, orchestrator) =
        single_attempt(ScriptedAttempt::chunks(["Chỉ là ", "văn bản thường"]));
    let dispatcher = MemoryDispatcher::new();

    orchestrator
        .generate_content_stream(&ChatRequest::new("?"), &dispatcher, StreamOptions::new())
        .await;

    assert_eq!(
        dispatcher.events().await,
        vec![
            zalobot_messages::DispatchEvent::Action(Action::message("Chỉ là văn bản thường", None)),
            zalobot_messages::DispatchEvent::Complete,
        ]
    );
}

#[tokio::test]
async fn test_plain_text_dropped_after_tagged_message() {
    let (_, orchestrator) =
        single_attempt(ScriptedAttempt::chunks(["[msg]Có tag[/msg]", " còn thừa"]));
    let dispatcher = MemoryDispatcher::new();

    orchestrator
        .generate_content_stream(&ChatRequest::new("?"), &dispatcher, StreamOptions::new())
        .await;

    assert_eq!(dispatcher.messages().await, vec!["Có tag".to_string()]);
}

#[tokio::test]
async fn test_token_guard_skips_provider() {
    let config = StreamConfig {
        max_input_tokens: 10,
        ..StreamConfig::default()
    };
    let notice = config.token_limit_message.clone();
    let (provider, orchestrator) = setup(
        vec![ScriptedAttempt::chunks(["[msg]Không dùng[/msg]"])],
        key_manager(1, &["flash"]),
        config,
    );
    let dispatcher = MemoryDispatcher::new();

    let outcome = orchestrator
        .generate_content_stream(
            &ChatRequest::new("rất dài ".repeat(50)),
            &dispatcher,
            StreamOptions::new(),
        )
        .await;

    assert_eq!(outcome.status, StreamStatus::TokenLimited);
    assert_eq!(provider.open_count(), 0);
    assert_eq!(dispatcher.messages().await, vec![notice]);
    assert_eq!(dispatcher.completed().await, 1);
}

#[tokio::test]
async fn test_temporary_session_removed_after_success() {
    let (provider, orchestrator) = single_attempt(ScriptedAttempt::chunks(["[msg]Ok[/msg]"]));
    let dispatcher = MemoryDispatcher::new();

    orchestrator
        .generate_content_stream(&ChatRequest::new("?"), &dispatcher, StreamOptions::new())
        .await;

    let session = provider.opened()[0].session.clone();
    assert!(session.is_temporary());
    // once before opening, once after finishing
    assert_eq!(provider.deleted_sessions(), vec![session.clone(), session]);
}

#[tokio::test]
async fn test_thread_session_kept_after_success() {
    let (provider, orchestrator) = single_attempt(ScriptedAttempt::chunks(["[msg]Ok[/msg]"]));
    let dispatcher = MemoryDispatcher::new();

    orchestrator
        .generate_content_stream(
            &ChatRequest::new("?"),
            &dispatcher,
            StreamOptions::for_thread("thread-7"),
        )
        .await;

    assert_eq!(provider.opened()[0].session.as_str(), "thread-7");
    assert_eq!(provider.deleted_sessions().len(), 1);
}

#[tokio::test]
async fn test_thread_session_removed_after_failure() {
    let (provider, orchestrator) =
        single_attempt(ScriptedAttempt::fail_on_open(ProviderError::other("boom")));
    let dispatcher = MemoryDispatcher::new();

    orchestrator
        .generate_content_stream(
            &ChatRequest::new("?"),
            &dispatcher,
            StreamOptions::for_thread("thread-7"),
        )
        .await;

    let deleted = provider.deleted_sessions();
    assert_eq!(deleted.len(), 2);
    assert!(deleted.iter().all(|s| s.as_str() == "thread-7"));
}

#[tokio::test]
async fn test_thread_id_with_temp_prefix_is_kept() {
    let (provider, orchestrator) = single_attempt(ScriptedAttempt::chunks(["[msg]Ok[/msg]"]));
    let dispatcher = MemoryDispatcher::new();

    orchestrator
        .generate_content_stream(
            &ChatRequest::new("?"),
            &dispatcher,
            StreamOptions::for_thread("temp_42"),
        )
        .await;

    let session = provider.opened()[0].session.clone();
    assert_eq!(session.as_str(), "temp_42");
    assert!(!session.is_temporary());
    assert_eq!(provider.deleted_sessions(), vec![session]);
}
