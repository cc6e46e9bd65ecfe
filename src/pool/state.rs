//! Pool state structures
//!
//! Everything here lives behind the pool's state mutex. The lock is only
//! ever held for short synchronous sections, never across an `.await`.

use chrono::{DateTime, Utc};
use std::time::Instant;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::channel::MessageChannel;
use crate::session::{ActivityLog, TurnResult};
use crate::types::identifiers::{RequestId, SessionId};

/// Lifecycle state of a [`CommandPool`](super::CommandPool)
///
/// ```text
/// Uninitialized ─▶ Activating ─▶ Available ⇄ Busy
///                      │             │        │
///                      ▼             ▼        ▼
///                 Unavailable ◀─ Recycling ◀──┘
///
/// any state ─▶ Disposed (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PoolState {
    /// `activate` has never run
    Uninitialized,
    /// First session is warming up
    Activating,
    /// A warm session is idle and accepts a request
    Available,
    /// A warm session is serving a request
    Busy,
    /// The session is being replaced
    Recycling,
    /// Warmup failed or the session died; see `last_error`
    Unavailable,
    /// `dispose` was called
    Disposed,
}

impl PoolState {
    /// States that resolve on their own without caller action
    #[must_use]
    pub const fn is_transitional(self) -> bool {
        matches!(self, Self::Activating | Self::Recycling)
    }
}

impl std::fmt::Display for PoolState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Activating => "activating",
            Self::Available => "available",
            Self::Busy => "busy",
            Self::Recycling => "recycling",
            Self::Unavailable => "unavailable",
            Self::Disposed => "disposed",
        };
        f.write_str(name)
    }
}

/// Counters describing what a pool has done so far
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Number of times the query backend was invoked
    pub sessions_started: u64,
    /// Number of sessions replaced (model change, timeout, explicit recycle, failure)
    pub recycles: u64,
    /// Requests that received a result
    pub completed: u64,
    /// Requests that hit their timeout
    pub timed_out: u64,
    /// Requests abandoned by their caller
    pub cancelled: u64,
    /// Requests whose session went away underneath them
    pub lost: u64,
    /// When the current session passed its warmup
    pub last_warmup_at: Option<DateTime<Utc>>,
}

/// The warm session currently owned by the pool
pub(super) struct ActiveSession {
    pub generation: u64,
    pub model: String,
    pub channel: MessageChannel,
    pub session_id: Option<SessionId>,
    pub activity: ActivityLog,
    pub collector: JoinHandle<()>,
}

impl ActiveSession {
    /// Close the input and stop the collector; dropping the driver stops the process
    pub fn shutdown(self) {
        self.channel.close();
        self.collector.abort();
    }
}

/// The single in-flight request
pub(super) struct PendingRequest {
    pub id: RequestId,
    pub generation: u64,
    pub responder: oneshot::Sender<TurnResult>,
    pub deadline: Option<Instant>,
    pub cancel: Option<CancellationToken>,
    pub started_at: Instant,
}

/// Mutable pool state guarded by one lock
pub(super) struct PoolCore {
    pub state: PoolState,
    /// Model the next session will be started with
    pub desired_model: String,
    pub session: Option<ActiveSession>,
    pub pending: Option<PendingRequest>,
    /// Bumped for every session started; stale callbacks compare against it
    pub generation: u64,
    /// Model changed while busy; recycle once the current result is in
    pub recycle_after_request: bool,
    /// The session died after warmup; recycle on the next request
    pub stale: bool,
    pub last_error: Option<String>,
    pub stats: PoolStats,
}

impl PoolCore {
    pub fn new(model: String) -> Self {
        Self {
            state: PoolState::Uninitialized,
            desired_model: model,
            session: None,
            pending: None,
            generation: 0,
            recycle_after_request: false,
            stale: false,
            last_error: None,
            stats: PoolStats::default(),
        }
    }

    /// Model of the warm session, if there is one
    pub fn active_model(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.model.as_str())
    }
}
