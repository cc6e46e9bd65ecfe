//! Integration tests for the command pool
//!
//! Every test drives a real `CommandPool` against the scripted backend in
//! `common`, so no Claude Code installation is needed.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Reply, ScriptedBackend, eventually, pool, warm_pool};
use kodegen_claude_pool::pool::DEFAULT_WARMUP_PROMPT;
use kodegen_claude_pool::{
    ClaudeError, CommandPool, PoolConfig, PoolState, PromptOptions, ReplyOutcome,
};
use tokio_util::sync::CancellationToken;

fn with_timeout(ms: u64) -> PromptOptions {
    PromptOptions::default().with_timeout(Duration::from_millis(ms))
}

/// Token that cancels itself after `ms` milliseconds
fn cancel_after(ms: u64) -> CancellationToken {
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(ms)).await;
        canceller.cancel();
    });
    token
}

async fn wait_for_state(pool: &CommandPool, state: PoolState) {
    assert!(
        eventually(|| pool.state() == state).await,
        "pool never reached {state}, stuck at {}",
        pool.state()
    );
}

// ============================================================================
// Activation and warmup
// ============================================================================

#[tokio::test]
async fn test_activate_warms_one_session() {
    let backend = ScriptedBackend::echo();
    let pool = warm_pool(&backend).await;

    assert!(pool.is_available());
    assert_eq!(pool.state(), PoolState::Available);
    assert_eq!(pool.active_model().as_deref(), Some("haiku"));
    assert_eq!(backend.invocations(), 1);
    assert_eq!(backend.prompts(), vec![DEFAULT_WARMUP_PROMPT.to_string()]);
    assert!(pool.stats().last_warmup_at.is_some());
}

#[tokio::test]
async fn test_activate_twice_reuses_session() {
    let backend = ScriptedBackend::echo();
    let pool = pool(&backend);

    let (first, second) = tokio::join!(pool.activate(), pool.activate());
    assert!(first.is_ok());
    assert!(second.is_ok());
    pool.activate().await.unwrap();

    assert_eq!(backend.invocations(), 1);
}

#[tokio::test]
async fn test_session_id_comes_from_init() {
    let backend = ScriptedBackend::echo();
    let pool = warm_pool(&backend).await;

    assert_eq!(
        pool.session_id().map(|id| id.as_str().to_string()).as_deref(),
        Some("session-1")
    );
}

#[tokio::test]
async fn test_warmup_accepts_token_in_any_case() {
    let backend = ScriptedBackend::scripted(|call| {
        (call.prompt == DEFAULT_WARMUP_PROMPT).then(|| Reply::Text("Ready!".into()))
    });
    let pool = warm_pool(&backend).await;
    assert!(pool.is_available());
}

#[tokio::test]
async fn test_warmup_without_token_fails() {
    let backend = ScriptedBackend::scripted(|call| {
        (call.prompt == DEFAULT_WARMUP_PROMPT).then(|| Reply::Text("Hello there".into()))
    });
    let pool = pool(&backend);

    let err = pool.activate().await.unwrap_err();
    assert!(matches!(err, ClaudeError::Warmup(_)), "unexpected error: {err}");
    assert!(!pool.is_available());
    assert_eq!(pool.state(), PoolState::Unavailable);
    assert!(pool.last_error().is_some());

    let reply = pool.send_prompt("x", with_timeout(500)).await;
    assert_eq!(reply.outcome, ReplyOutcome::Unavailable);
    assert_eq!(reply.text, None);
    assert!(backend.requests().is_empty());
}

#[tokio::test]
async fn test_warmup_error_result_fails() {
    let backend = ScriptedBackend::scripted(|call| {
        (call.prompt == DEFAULT_WARMUP_PROMPT).then_some(Reply::Error)
    });
    let pool = pool(&backend);

    assert!(matches!(pool.activate().await, Err(ClaudeError::Warmup(_))));
    assert!(!pool.is_available());
}

#[tokio::test]
async fn test_warmup_timeout_fails() {
    let backend = ScriptedBackend::scripted(|call| {
        (call.prompt == DEFAULT_WARMUP_PROMPT).then_some(Reply::Hang)
    });
    let config = PoolConfig::builder()
        .warmup_timeout(Duration::from_millis(50))
        .build();
    let pool = CommandPool::new(config, backend.clone()).unwrap();

    assert!(matches!(pool.activate().await, Err(ClaudeError::Timeout(_))));
    assert_eq!(pool.state(), PoolState::Unavailable);
    assert!(eventually(|| backend.live_sessions() == 0).await);
}

#[tokio::test]
async fn test_warmup_stream_end_fails() {
    let backend = ScriptedBackend::scripted(|call| {
        (call.prompt == DEFAULT_WARMUP_PROMPT).then_some(Reply::End)
    });
    let pool = pool(&backend);

    assert!(matches!(pool.activate().await, Err(ClaudeError::SessionEnded(_))));
    assert_eq!(pool.wait_settled().await, PoolState::Unavailable);
}

#[tokio::test]
async fn test_activate_retries_after_failed_warmup() {
    let backend = ScriptedBackend::scripted(|call| {
        (call.prompt == DEFAULT_WARMUP_PROMPT && call.session == 1)
            .then(|| Reply::Text("not yet".into()))
    });
    let pool = pool(&backend);

    assert!(pool.activate().await.is_err());
    pool.activate().await.unwrap();

    assert!(pool.is_available());
    assert_eq!(backend.invocations(), 2);
    assert_eq!(pool.last_error(), None);
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let config = PoolConfig::builder().model("").build();
    let result = CommandPool::new(config, ScriptedBackend::echo());
    assert!(matches!(result, Err(ClaudeError::InvalidConfig(_))));
}

// ============================================================================
// Requests
// ============================================================================

#[tokio::test]
async fn test_prompt_before_activate_is_unavailable() {
    let backend = ScriptedBackend::echo();
    let pool = pool(&backend);

    let reply = pool.send_prompt("x", PromptOptions::default()).await;
    assert_eq!(reply.outcome, ReplyOutcome::Unavailable);
    assert!(!reply.has_text());
    assert_eq!(backend.invocations(), 0);
}

#[tokio::test]
async fn test_prompts_reuse_the_warm_session() {
    let backend = ScriptedBackend::echo();
    let pool = warm_pool(&backend).await;

    for prompt in ["fn main() {", "let x =", "impl Foo for"] {
        let reply = pool.send_prompt(prompt, with_timeout(1000)).await;
        assert_eq!(reply.outcome, ReplyOutcome::Completed);
        assert_eq!(reply.text, Some(format!("haiku:{prompt}")));
    }

    assert_eq!(backend.invocations(), 1);
    assert_eq!(backend.requests(), vec!["fn main() {", "let x =", "impl Foo for"]);
    assert_eq!(pool.stats().completed, 3);
    assert_eq!(pool.state(), PoolState::Available);
}

#[tokio::test]
async fn test_prompt_without_timeout_completes() {
    let backend = ScriptedBackend::echo();
    let pool = warm_pool(&backend).await;

    let reply = pool.send_prompt("a", PromptOptions::default()).await;
    assert_eq!(reply.text.as_deref(), Some("haiku:a"));
}

#[tokio::test]
async fn test_error_result_completes_without_text() {
    let backend = ScriptedBackend::scripted(|call| (call.prompt == "bad").then_some(Reply::Error));
    let pool = warm_pool(&backend).await;

    let reply = pool.send_prompt("bad", with_timeout(1000)).await;
    assert_eq!(reply.outcome, ReplyOutcome::Completed);
    assert_eq!(reply.text, None);
    assert!(pool.is_available());
}

#[tokio::test]
async fn test_empty_result_text_is_none() {
    let backend =
        ScriptedBackend::scripted(|call| (call.prompt == "empty").then(|| Reply::Text(String::new())));
    let pool = warm_pool(&backend).await;

    let reply = pool.send_prompt("empty", with_timeout(1000)).await;
    assert_eq!(reply.outcome, ReplyOutcome::Completed);
    assert_eq!(reply.text, None);
}

#[tokio::test]
async fn test_second_request_while_busy_is_rejected() {
    let backend = ScriptedBackend::scripted(|call| {
        (call.prompt == "slow").then(|| Reply::Delayed(Duration::from_millis(200), "done".into()))
    });
    let pool = Arc::new(warm_pool(&backend).await);

    let first = tokio::spawn({
        let pool = Arc::clone(&pool);
        async move { pool.send_prompt("slow", with_timeout(2000)).await }
    });
    wait_for_state(&pool, PoolState::Busy).await;
    assert!(pool.is_available());

    let second = pool.send_prompt("fast", with_timeout(2000)).await;
    assert_eq!(second.outcome, ReplyOutcome::Unavailable);

    let first = first.await.unwrap();
    assert_eq!(first.text.as_deref(), Some("done"));
    assert_eq!(backend.requests(), vec!["slow"]);
}

#[tokio::test]
async fn test_recent_activity_follows_the_warm_session() {
    let backend = ScriptedBackend::echo();
    let pool = pool(&backend);
    assert!(pool.recent_activity().is_empty());

    pool.activate().await.unwrap();
    let reply = pool.send_prompt("one", with_timeout(1000)).await;
    assert_eq!(reply.outcome, ReplyOutcome::Completed);

    let details: Vec<String> = pool
        .recent_activity()
        .into_iter()
        .map(|activity| activity.detail)
        .collect();
    assert_eq!(details, vec!["READY", "haiku:one"]);

    // A new session starts with an empty log
    pool.recycle_all().await.unwrap();
    let details: Vec<String> = pool
        .recent_activity()
        .into_iter()
        .map(|activity| activity.detail)
        .collect();
    assert_eq!(details, vec!["READY"]);

    pool.dispose();
    assert!(pool.recent_activity().is_empty());
}

// ============================================================================
// Timeouts and cancellation
// ============================================================================

#[tokio::test]
async fn test_timeout_returns_none_and_recycles() {
    let backend = ScriptedBackend::scripted(|call| {
        (call.prompt == "stuck" && call.session == 1).then_some(Reply::Hang)
    });
    let pool = warm_pool(&backend).await;

    let reply = pool.send_prompt("stuck", with_timeout(50)).await;
    assert_eq!(reply.outcome, ReplyOutcome::TimedOut);
    assert_eq!(reply.text, None);

    assert_eq!(pool.wait_settled().await, PoolState::Available);
    assert_eq!(backend.invocations(), 2);
    assert!(eventually(|| backend.live_sessions() == 1).await);

    let stats = pool.stats();
    assert_eq!(stats.timed_out, 1);
    assert_eq!(stats.recycles, 1);

    let reply = pool.send_prompt("after", with_timeout(1000)).await;
    assert_eq!(reply.text.as_deref(), Some("haiku:after"));
}

#[tokio::test]
async fn test_cancel_before_send_skips_the_session() {
    let backend = ScriptedBackend::echo();
    let pool = warm_pool(&backend).await;

    let token = CancellationToken::new();
    token.cancel();
    let reply = pool
        .send_prompt("never", PromptOptions::default().with_cancel(token))
        .await;

    assert_eq!(reply.outcome, ReplyOutcome::Cancelled);
    assert_eq!(reply.text, None);
    assert!(backend.requests().is_empty());
    assert_eq!(pool.state(), PoolState::Available);
}

#[tokio::test]
async fn test_cancel_during_request_keeps_session() {
    let backend = ScriptedBackend::scripted(|call| {
        (call.prompt == "slow").then(|| Reply::Delayed(Duration::from_millis(150), "late".into()))
    });
    let pool = warm_pool(&backend).await;

    let token = cancel_after(20);

    let reply = pool
        .send_prompt("slow", with_timeout(5000).with_cancel(token))
        .await;
    assert_eq!(reply.outcome, ReplyOutcome::Cancelled);
    assert_eq!(reply.text, None);

    // The late result frees the session without reaching anyone
    wait_for_state(&pool, PoolState::Available).await;
    let reply = pool.send_prompt("next", with_timeout(1000)).await;
    assert_eq!(reply.text.as_deref(), Some("haiku:next"));

    assert_eq!(backend.invocations(), 1);
    assert_eq!(pool.stats().cancelled, 1);
}

#[tokio::test]
async fn test_cancel_then_hang_recycles_at_deadline() {
    let backend = ScriptedBackend::scripted(|call| {
        (call.prompt == "stuck" && call.session == 1).then_some(Reply::Hang)
    });
    let pool = warm_pool(&backend).await;

    let token = cancel_after(20);

    let reply = pool
        .send_prompt("stuck", with_timeout(100).with_cancel(token))
        .await;
    assert_eq!(reply.outcome, ReplyOutcome::Cancelled);
    assert_eq!(pool.state(), PoolState::Busy);

    // Once the abandoned request's deadline passes the hung session is replaced
    assert!(eventually(|| backend.invocations() == 2 && pool.state() == PoolState::Available).await);
    let reply = pool.send_prompt("after", with_timeout(1000)).await;
    assert_eq!(reply.text.as_deref(), Some("haiku:after"));
    assert_eq!(pool.stats().recycles, 1);
}

#[tokio::test]
async fn test_cancel_answered_before_deadline_does_not_recycle() {
    let backend = ScriptedBackend::scripted(|call| {
        (call.prompt == "slow").then(|| Reply::Delayed(Duration::from_millis(60), "late".into()))
    });
    let pool = warm_pool(&backend).await;

    let token = cancel_after(20);
    let reply = pool
        .send_prompt("slow", with_timeout(150).with_cancel(token))
        .await;
    assert_eq!(reply.outcome, ReplyOutcome::Cancelled);

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(pool.state(), PoolState::Available);
    assert_eq!(backend.invocations(), 1);
}

// ============================================================================
// Model switching and recycling
// ============================================================================

#[tokio::test]
async fn test_update_model_to_same_model_is_noop() {
    let backend = ScriptedBackend::echo();
    let pool = warm_pool(&backend).await;

    pool.update_model("haiku");

    assert_eq!(pool.state(), PoolState::Available);
    assert_eq!(backend.invocations(), 1);
}

#[tokio::test]
async fn test_update_model_recycles_session() {
    let backend = ScriptedBackend::echo();
    let pool = warm_pool(&backend).await;

    pool.update_model("sonnet");
    assert_eq!(pool.state(), PoolState::Recycling);
    assert_eq!(pool.desired_model(), "sonnet");

    assert_eq!(pool.wait_settled().await, PoolState::Available);
    assert_eq!(pool.active_model().as_deref(), Some("sonnet"));
    assert_eq!(backend.models(), vec!["haiku", "sonnet"]);

    let reply = pool.send_prompt("x", with_timeout(1000)).await;
    assert_eq!(reply.text.as_deref(), Some("sonnet:x"));
    assert!(eventually(|| backend.live_sessions() == 1).await);
}

#[tokio::test]
async fn test_update_model_before_activate_only_sets_model() {
    let backend = ScriptedBackend::echo();
    let pool = pool(&backend);

    pool.update_model("opus");
    assert_eq!(pool.state(), PoolState::Uninitialized);
    assert_eq!(backend.invocations(), 0);

    pool.activate().await.unwrap();
    assert_eq!(backend.models(), vec!["opus"]);
}

#[tokio::test]
async fn test_update_model_while_busy_waits_for_result() {
    let backend = ScriptedBackend::scripted(|call| {
        (call.prompt == "slow").then(|| Reply::Delayed(Duration::from_millis(100), "old".into()))
    });
    let pool = Arc::new(warm_pool(&backend).await);

    let request = tokio::spawn({
        let pool = Arc::clone(&pool);
        async move { pool.send_prompt("slow", with_timeout(2000)).await }
    });
    wait_for_state(&pool, PoolState::Busy).await;

    pool.update_model("sonnet");
    assert_eq!(pool.state(), PoolState::Busy);

    let reply = request.await.unwrap();
    assert_eq!(reply.outcome, ReplyOutcome::Completed);
    assert_eq!(reply.text.as_deref(), Some("old"));

    assert_eq!(pool.wait_settled().await, PoolState::Available);
    assert_eq!(pool.active_model().as_deref(), Some("sonnet"));
    assert_eq!(backend.invocations(), 2);
}

#[tokio::test]
async fn test_update_model_during_activation_restarts_warmup() {
    let backend = ScriptedBackend::scripted(|call| {
        (call.prompt == DEFAULT_WARMUP_PROMPT && call.session == 1)
            .then(|| Reply::Delayed(Duration::from_millis(100), "READY".into()))
    });
    let pool = Arc::new(pool(&backend));

    let activation = tokio::spawn({
        let pool = Arc::clone(&pool);
        async move { pool.activate().await }
    });
    wait_for_state(&pool, PoolState::Activating).await;
    pool.update_model("sonnet");

    activation.await.unwrap().unwrap();
    assert_eq!(pool.state(), PoolState::Available);
    assert_eq!(pool.active_model().as_deref(), Some("sonnet"));
    assert_eq!(backend.models(), vec!["haiku", "sonnet"]);
}

#[tokio::test]
async fn test_recycle_all_replaces_session() {
    let backend = ScriptedBackend::echo();
    let pool = warm_pool(&backend).await;

    pool.recycle_all().await.unwrap();

    assert!(pool.is_available());
    assert_eq!(backend.invocations(), 2);
    assert_eq!(
        pool.session_id().map(|id| id.as_str().to_string()).as_deref(),
        Some("session-2")
    );
    assert!(eventually(|| backend.live_sessions() == 1).await);
}

#[tokio::test]
async fn test_recycle_all_fails_in_flight_request() {
    let backend = ScriptedBackend::scripted(|call| (call.prompt == "stuck").then_some(Reply::Hang));
    let pool = Arc::new(warm_pool(&backend).await);

    let request = tokio::spawn({
        let pool = Arc::clone(&pool);
        async move { pool.send_prompt("stuck", PromptOptions::default()).await }
    });
    wait_for_state(&pool, PoolState::Busy).await;

    pool.recycle_all().await.unwrap();

    let reply = request.await.unwrap();
    assert_eq!(reply.outcome, ReplyOutcome::SessionLost);
    assert_eq!(reply.text, None);
    assert!(pool.is_available());
}

// ============================================================================
// Session failure
// ============================================================================

#[tokio::test]
async fn test_session_end_marks_pool_stale_then_recovers() {
    let backend = ScriptedBackend::scripted(|call| (call.prompt == "crash").then_some(Reply::End));
    let pool = warm_pool(&backend).await;

    let reply = pool.send_prompt("crash", with_timeout(1000)).await;
    assert_eq!(reply.outcome, ReplyOutcome::SessionLost);
    assert_eq!(pool.state(), PoolState::Unavailable);
    assert!(!pool.is_available());

    // The next request finds the stale session and triggers a recycle
    let reply = pool.send_prompt("retry", with_timeout(1000)).await;
    assert_eq!(reply.outcome, ReplyOutcome::Unavailable);

    assert_eq!(pool.wait_settled().await, PoolState::Available);
    let reply = pool.send_prompt("retry", with_timeout(1000)).await;
    assert_eq!(reply.text.as_deref(), Some("haiku:retry"));
    assert_eq!(backend.invocations(), 2);
    assert_eq!(pool.stats().lost, 1);
}

#[tokio::test]
async fn test_failed_recycle_is_retried_by_next_request() {
    let backend = ScriptedBackend::scripted(|call| match (call.session, call.prompt.as_str()) {
        (1, "stuck") => Some(Reply::Hang),
        (2, DEFAULT_WARMUP_PROMPT) => Some(Reply::Text("nope".into())),
        _ => None,
    });
    let pool = warm_pool(&backend).await;

    let reply = pool.send_prompt("stuck", with_timeout(50)).await;
    assert_eq!(reply.outcome, ReplyOutcome::TimedOut);
    assert_eq!(pool.wait_settled().await, PoolState::Unavailable);
    assert_eq!(backend.invocations(), 2);

    // The rejected replacement is retried instead of leaving the pool dead
    let reply = pool.send_prompt("retry", with_timeout(1000)).await;
    assert_eq!(reply.outcome, ReplyOutcome::Unavailable);
    assert_eq!(pool.wait_settled().await, PoolState::Available);

    let reply = pool.send_prompt("retry", with_timeout(1000)).await;
    assert_eq!(reply.text.as_deref(), Some("haiku:retry"));
    assert_eq!(backend.invocations(), 3);
}

#[tokio::test]
async fn test_failed_activation_waits_for_activate() {
    let backend = ScriptedBackend::scripted(|call| {
        (call.prompt == DEFAULT_WARMUP_PROMPT && call.session == 1)
            .then(|| Reply::Text("nope".into()))
    });
    let pool = pool(&backend);

    assert!(pool.activate().await.is_err());
    let reply = pool.send_prompt("x", with_timeout(100)).await;
    assert_eq!(reply.outcome, ReplyOutcome::Unavailable);
    assert_eq!(pool.state(), PoolState::Unavailable);
    assert_eq!(backend.invocations(), 1);
}

#[tokio::test]
async fn test_stream_failure_is_reported() {
    let backend = ScriptedBackend::scripted(|call| {
        (call.prompt == "boom").then(|| Reply::Fail("pipe closed".into()))
    });
    let pool = warm_pool(&backend).await;

    let reply = pool.send_prompt("boom", with_timeout(1000)).await;
    assert_eq!(reply.outcome, ReplyOutcome::SessionLost);
    assert!(pool.last_error().unwrap().contains("pipe closed"));

    pool.activate().await.unwrap();
    assert!(pool.is_available());
}

// ============================================================================
// Disposal
// ============================================================================

#[tokio::test]
async fn test_dispose_is_final() {
    let backend = ScriptedBackend::echo();
    let pool = warm_pool(&backend).await;

    pool.dispose();
    pool.dispose();

    assert_eq!(pool.state(), PoolState::Disposed);
    assert!(!pool.is_available());
    assert_eq!(
        pool.send_prompt("x", with_timeout(100)).await.outcome,
        ReplyOutcome::Unavailable
    );
    assert!(matches!(pool.activate().await, Err(ClaudeError::Disposed)));
    assert!(matches!(pool.recycle_all().await, Err(ClaudeError::Disposed)));

    pool.update_model("sonnet");
    assert_eq!(pool.state(), PoolState::Disposed);
    assert!(eventually(|| backend.live_sessions() == 0).await);
}

#[tokio::test]
async fn test_dispose_resolves_in_flight_request() {
    let backend = ScriptedBackend::scripted(|call| (call.prompt == "stuck").then_some(Reply::Hang));
    let pool = Arc::new(warm_pool(&backend).await);

    let request = tokio::spawn({
        let pool = Arc::clone(&pool);
        async move { pool.send_prompt("stuck", PromptOptions::default()).await }
    });
    wait_for_state(&pool, PoolState::Busy).await;

    pool.dispose();

    let reply = request.await.unwrap();
    assert_eq!(reply.outcome, ReplyOutcome::SessionLost);
}

#[tokio::test]
async fn test_dispose_during_warmup_aborts_activation() {
    let backend = ScriptedBackend::scripted(|call| {
        (call.prompt == DEFAULT_WARMUP_PROMPT).then_some(Reply::Hang)
    });
    let pool = Arc::new(pool(&backend));

    let activation = tokio::spawn({
        let pool = Arc::clone(&pool);
        async move { pool.activate().await }
    });
    wait_for_state(&pool, PoolState::Activating).await;
    pool.dispose();

    let result = activation.await.unwrap();
    assert!(matches!(result, Err(ClaudeError::Disposed)));
    assert_eq!(pool.state(), PoolState::Disposed);
}

#[tokio::test]
async fn test_drop_releases_session() {
    let backend = ScriptedBackend::echo();
    let pool = warm_pool(&backend).await;
    assert_eq!(backend.live_sessions(), 1);

    drop(pool);
    assert!(eventually(|| backend.live_sessions() == 0).await);
}
