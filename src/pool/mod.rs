//! Command pool: one warm Claude Code session serving many completions
//!
//! Starting the CLI and getting a first answer out of it takes hundreds of
//! milliseconds to seconds. [`CommandPool`] pays that cost once: it starts a
//! session, validates it with a warmup exchange, and then feeds every
//! following prompt into the same running process.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                         CommandPool                          │
//! │                                                              │
//! │  send_prompt ──push──▶ MessageChannel ──▶ QueryBackend       │
//! │       ▲                                       │              │
//! │       │ oneshot                               ▼              │
//! │  PendingRequest ◀──result── Collector ◀── SessionDriver      │
//! │                                                              │
//! │  update_model / timeout / failure ──▶ recycle (new session)  │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Requests are strictly single-flight: a prompt is only pushed while no
//! other request is outstanding, so each `result` event answers the one
//! pending request. A call made while another is in flight is rejected
//! with [`ReplyOutcome::Unavailable`].
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use kodegen_claude_pool::pool::{CommandPool, PoolConfig, PromptOptions};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let pool = CommandPool::with_cli(PoolConfig::default(), None)?;
//! pool.activate().await?;
//!
//! let reply = pool
//!     .send_prompt("fn add(a: i32, b: i32) -> i32 {", PromptOptions::default().with_timeout(Duration::from_secs(10)))
//!     .await;
//! if let Some(text) = reply.text {
//!     log::info!("completion: {text}");
//! }
//!
//! pool.update_model("sonnet");
//! pool.dispose();
//! # Ok(())
//! # }
//! ```

mod collector;
mod config;
mod inner;
mod lifecycle;
mod reply;
mod request;
mod state;
mod warmup;

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::Result;
use crate::query::{CliQuery, QueryBackend};
use crate::session::Activity;
use crate::types::identifiers::SessionId;

use inner::PoolInner;

pub use config::{
    DEFAULT_MODEL, DEFAULT_READINESS_TOKEN, DEFAULT_WARMUP_PROMPT, DEFAULT_WARMUP_TIMEOUT_MS,
    PoolConfig, PoolConfigBuilder,
};
pub use reply::{PromptOptions, PromptReply, ReplyOutcome};
pub use state::{PoolState, PoolStats};
pub use warmup::is_ready_response;

/// Owner of one warm session and the only way callers reach it
///
/// Methods that start or replace sessions spawn Tokio tasks and must run
/// inside a Tokio runtime. Dropping the pool disposes it.
pub struct CommandPool {
    inner: Arc<PoolInner>,
}

impl CommandPool {
    /// Create a pool over any query backend; nothing starts until [`activate`](Self::activate)
    ///
    /// # Errors
    /// Returns `ClaudeError::InvalidConfig` if the configuration is invalid
    pub fn new(config: PoolConfig, backend: impl QueryBackend) -> Result<Self> {
        Self::with_backend(config, Arc::new(backend))
    }

    /// Create a pool over a shared query backend
    ///
    /// # Errors
    /// Returns `ClaudeError::InvalidConfig` if the configuration is invalid
    pub fn with_backend(config: PoolConfig, backend: Arc<dyn QueryBackend>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(PoolInner::new(config, backend)),
        })
    }

    /// Create a pool driving the Claude Code CLI
    ///
    /// # Errors
    /// Returns `ClaudeError::InvalidConfig` if the configuration is invalid
    pub fn with_cli(config: PoolConfig, cli_path: Option<PathBuf>) -> Result<Self> {
        let backend = cli_path.map_or_else(CliQuery::new, CliQuery::with_cli_path);
        Self::new(config, backend)
    }

    /// Start and warm up a session
    ///
    /// No-op while a warm session exists. Concurrent calls wait for the
    /// activation in progress instead of starting a second session.
    ///
    /// # Errors
    /// Returns the reason the warmup failed, or `ClaudeError::Disposed`.
    /// The pool stays unavailable in both cases.
    pub async fn activate(&self) -> Result<()> {
        self.inner.activate().await
    }

    /// Whether a warm session exists to take requests
    #[must_use]
    pub fn is_available(&self) -> bool {
        let core = self.inner.core.lock();
        matches!(core.state, PoolState::Available | PoolState::Busy) && core.session.is_some()
    }

    /// Send one prompt to the warm session and wait for its result
    ///
    /// Never fails: every problem resolves to a reply with `text: None`
    /// and an outcome saying why. A timeout also recycles the session;
    /// a cancellation leaves it alone.
    pub async fn send_prompt(&self, message: impl Into<String>, options: PromptOptions) -> PromptReply {
        self.inner.send_prompt(message.into(), options).await
    }

    /// Switch models, recycling the session if the model actually changes
    ///
    /// An in-flight request finishes on the old session first. Before the
    /// first activation this only changes which model will be used.
    pub fn update_model(&self, model: impl Into<String>) {
        let model = model.into();
        let mut core = self.inner.core.lock();

        if core.state == PoolState::Disposed || core.desired_model == model {
            return;
        }

        log::info!("Model changed from {} to {model}", core.desired_model);
        core.desired_model = model;

        let needs_recycle = core
            .active_model()
            .is_some_and(|active| active != core.desired_model);

        let state = core.state;
        match state {
            PoolState::Available if needs_recycle => {
                self.inner.schedule_recycle(&mut core, "model changed");
            }
            PoolState::Busy => core.recycle_after_request = needs_recycle,
            _ => {}
        }
    }

    /// Replace the session now, failing any in-flight request
    ///
    /// # Errors
    /// Returns the warmup failure of the new session, or `ClaudeError::Disposed`
    pub async fn recycle_all(&self) -> Result<()> {
        self.inner.recycle(None, "recycle requested").await
    }

    /// Close the session and refuse all further work. Idempotent.
    pub fn dispose(&self) {
        self.inner.dispose();
    }

    /// Current lifecycle state
    #[must_use]
    pub fn state(&self) -> PoolState {
        self.inner.core.lock().state
    }

    /// Wait until no activation or recycle is in progress and return the state reached
    pub async fn wait_settled(&self) -> PoolState {
        let mut states = self.inner.state_tx.subscribe();
        let settled = states
            .wait_for(|state| !state.is_transitional())
            .await
            .map_or(PoolState::Disposed, |state| *state);
        settled
    }

    /// Model of the warm session, if one is running
    #[must_use]
    pub fn active_model(&self) -> Option<String> {
        self.inner.core.lock().active_model().map(String::from)
    }

    /// Model the pool wants to run; differs from `active_model` while switching
    #[must_use]
    pub fn desired_model(&self) -> String {
        self.inner.core.lock().desired_model.clone()
    }

    /// CLI session ID of the warm session, once reported
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.inner
            .core
            .lock()
            .session
            .as_ref()
            .and_then(|s| s.session_id.clone())
    }

    /// Recent intermediate activity of the warm session, oldest first
    ///
    /// Empty when no session is running. Bounded by `activity_log_capacity`.
    #[must_use]
    pub fn recent_activity(&self) -> Vec<Activity> {
        self.inner
            .core
            .lock()
            .session
            .as_ref()
            .map(|s| s.activity.snapshot())
            .unwrap_or_default()
    }

    /// Why the pool last became unavailable
    #[must_use]
    pub fn last_error(&self) -> Option<String> {
        self.inner.core.lock().last_error.clone()
    }

    /// Snapshot of the pool's counters
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        self.inner.core.lock().stats.clone()
    }

    /// Configuration the pool was built with
    #[must_use]
    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }
}

impl Drop for CommandPool {
    fn drop(&mut self) {
        self.inner.dispose();
    }
}
