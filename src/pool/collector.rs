//! Background task that routes a session's results back to waiting callers
//!
//! One collector runs per warm session and owns its [`SessionDriver`].
//! Because at most one request is ever outstanding, every `result` event
//! belongs to whatever request is pending when it arrives.

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;

use crate::session::{SessionDriver, StructuredEvent, TurnResult};
use crate::types::identifiers::SessionId;

use super::inner::PoolInner;
use super::state::PoolState;

#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Spawn the collector for session `generation`
pub(super) fn spawn(
    inner: Arc<PoolInner>,
    mut driver: SessionDriver,
    generation: u64,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            let flow = match driver.next_event().await {
                StructuredEvent::Result(turn) => inner.deliver(generation, turn),
                StructuredEvent::Init { session_id, .. } => {
                    inner.record_session_id(generation, session_id)
                }
                StructuredEvent::Activity(_) => Flow::Continue,
                StructuredEvent::Ended => {
                    inner.session_failed(generation, "session stream ended".to_string())
                }
                StructuredEvent::Failed(reason) => inner.session_failed(generation, reason),
            };

            if flow == Flow::Stop {
                break;
            }
        }
        log::debug!("Collector for session generation {generation} stopped");
    })
}

impl PoolInner {
    fn deliver(self: &Arc<Self>, generation: u64, turn: TurnResult) -> Flow {
        let mut core = self.core.lock();
        if core.generation != generation {
            return Flow::Stop;
        }

        let pending = core.pending.take();
        if core.state == PoolState::Busy {
            self.set_state(&mut core, PoolState::Available);
        }
        if core.recycle_after_request {
            core.recycle_after_request = false;
            self.schedule_recycle(&mut core, "model changed");
        }

        match pending {
            Some(request) => {
                debug_assert_eq!(request.generation, generation);
                let abandoned = request.cancel.as_ref().is_some_and(|t| t.is_cancelled());
                let overdue = request.deadline.is_some_and(|d| Instant::now() > d);
                log::debug!(
                    "Request {} answered after {:?}{}{}",
                    request.id,
                    request.started_at.elapsed(),
                    if abandoned { " (abandoned by caller)" } else { "" },
                    if overdue { " (past its deadline)" } else { "" }
                );
                if request.responder.send(turn).is_err() && !abandoned {
                    log::debug!("Request {} no longer waiting; result discarded", request.id);
                }
            }
            None => {
                log::warn!(
                    "Discarding unsolicited result ({} turns) on session generation {generation}",
                    turn.num_turns
                );
            }
        }

        Flow::Continue
    }

    fn record_session_id(&self, generation: u64, session_id: Option<SessionId>) -> Flow {
        let mut core = self.core.lock();
        if core.generation != generation {
            return Flow::Stop;
        }
        if let Some(session) = core.session.as_mut()
            && session_id.is_some()
        {
            session.session_id = session_id;
        }
        Flow::Continue
    }

    /// The session died after warmup; mark the pool stale
    fn session_failed(&self, generation: u64, reason: String) -> Flow {
        let mut core = self.core.lock();
        if core.generation != generation || core.state == PoolState::Disposed {
            return Flow::Stop;
        }

        log::error!("Session generation {generation} failed: {reason}");
        self.teardown(&mut core);
        core.last_error = Some(reason);
        // A recycle already scheduled replaces the session anyway
        if core.state != PoolState::Recycling {
            core.stale = true;
            self.set_state(&mut core, PoolState::Unavailable);
        }

        Flow::Stop
    }
}
