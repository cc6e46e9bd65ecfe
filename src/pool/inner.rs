//! Shared pool internals
//!
//! [`PoolInner`] is owned by the public [`CommandPool`](super::CommandPool)
//! handle and shared with the collector and recycle tasks.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::query::QueryBackend;

use super::config::PoolConfig;
use super::state::{PoolCore, PoolState};

pub(super) struct PoolInner {
    pub backend: Arc<dyn QueryBackend>,
    pub config: PoolConfig,
    pub core: Mutex<PoolCore>,
    pub state_tx: watch::Sender<PoolState>,
    /// Serializes activation and recycling
    pub lifecycle: tokio::sync::Mutex<()>,
    /// Cancelled by `dispose` to cut a running warmup short
    pub shutdown: CancellationToken,
}

impl PoolInner {
    pub fn new(config: PoolConfig, backend: Arc<dyn QueryBackend>) -> Self {
        let (state_tx, _) = watch::channel(PoolState::Uninitialized);
        Self {
            backend,
            core: Mutex::new(PoolCore::new(config.model.clone())),
            config,
            state_tx,
            lifecycle: tokio::sync::Mutex::new(()),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn set_state(&self, core: &mut PoolCore, next: PoolState) {
        if core.state != next {
            log::debug!("Pool state {} -> {}", core.state, next);
            core.state = next;
            self.state_tx.send_replace(next);
        }
    }

    /// Drop the current session and fail any in-flight request
    pub fn teardown(&self, core: &mut PoolCore) {
        if let Some(session) = core.session.take() {
            log::debug!(
                "Closing session generation {} ({})",
                session.generation,
                session.model
            );
            session.shutdown();
        }
        if let Some(pending) = core.pending.take() {
            // Dropping the responder resolves the waiting caller as lost
            log::debug!("Request {} lost to session teardown", pending.id);
        }
        core.recycle_after_request = false;
    }

    /// Move to `Recycling` now and replace the session in the background
    ///
    /// Activation already in progress picks up model changes by itself, so
    /// nothing is scheduled while `Activating` or already `Recycling`.
    pub fn schedule_recycle(self: &Arc<Self>, core: &mut PoolCore, reason: &str) {
        if matches!(
            core.state,
            PoolState::Disposed | PoolState::Activating | PoolState::Recycling
        ) {
            return;
        }

        log::info!("Scheduling session recycle: {reason}");
        self.set_state(core, PoolState::Recycling);

        let inner = Arc::clone(self);
        let expected = core.generation;
        let reason = reason.to_string();
        tokio::spawn(async move {
            if let Err(e) = inner.recycle(Some(expected), &reason).await {
                log::warn!("Recycle after {reason:?} failed: {e}");
            }
        });
    }
}
