//! The request path: one prompt in, one reply out

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;

use crate::session::TurnResult;
use crate::types::identifiers::RequestId;

use super::inner::PoolInner;
use super::reply::{PromptOptions, PromptReply, ReplyOutcome};
use super::state::{PendingRequest, PoolState};

/// Whichever of result, timeout and cancellation fired first
enum Race {
    Answered(TurnResult),
    Lost,
    Expired,
    Abandoned,
}

async fn expire(timeout: Option<Duration>) {
    match timeout {
        Some(limit) => tokio::time::sleep(limit).await,
        None => std::future::pending().await,
    }
}

async fn abandon(token: Option<CancellationToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}

impl PoolInner {
    pub async fn send_prompt(self: &Arc<Self>, message: String, options: PromptOptions) -> PromptReply {
        let id = RequestId::generate();

        if options.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            log::debug!("Request {id} cancelled before it was sent");
            self.core.lock().stats.cancelled += 1;
            return PromptReply::empty(ReplyOutcome::Cancelled);
        }

        let answer = match self.begin_request(&id, message, &options) {
            Ok(answer) => answer,
            Err(outcome) => return PromptReply::empty(outcome),
        };

        let race = tokio::select! {
            biased;
            answer = answer => match answer {
                Ok(turn) => Race::Answered(turn),
                Err(_) => Race::Lost,
            },
            () = expire(options.timeout) => Race::Expired,
            () = abandon(options.cancel.clone()) => Race::Abandoned,
        };

        let mut core = self.core.lock();
        match race {
            Race::Answered(turn) => {
                core.stats.completed += 1;
                PromptReply::completed(turn.text)
            }
            Race::Lost => {
                log::debug!("Request {id} lost its session");
                core.stats.lost += 1;
                PromptReply::empty(ReplyOutcome::SessionLost)
            }
            Race::Expired => {
                core.stats.timed_out += 1;
                let still_pending = core.pending.as_ref().is_some_and(|p| p.id == id);
                if still_pending {
                    log::warn!(
                        "Request {id} timed out after {:?}; recycling its session",
                        options.timeout.unwrap_or_default()
                    );
                    core.pending = None;
                    self.schedule_recycle(&mut core, "request timed out");
                }
                PromptReply::empty(ReplyOutcome::TimedOut)
            }
            Race::Abandoned => {
                // The session stays busy until its own result shows up
                log::debug!("Request {id} cancelled by caller");
                core.stats.cancelled += 1;
                let deadline = core
                    .pending
                    .as_ref()
                    .filter(|p| p.id == id)
                    .and_then(|p| p.deadline);
                if let Some(deadline) = deadline {
                    self.watch_abandoned(id, deadline);
                }
                PromptReply::empty(ReplyOutcome::Cancelled)
            }
        }
    }

    /// Recycle the session if an abandoned request is still unanswered at its deadline
    fn watch_abandoned(self: &Arc<Self>, id: RequestId, deadline: Instant) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep_until(deadline.into()).await;

            let mut core = inner.core.lock();
            let still_pending = core.pending.as_ref().is_some_and(|p| p.id == id);
            if still_pending {
                log::warn!("Abandoned request {id} passed its deadline; recycling its session");
                core.pending = None;
                inner.schedule_recycle(&mut core, "abandoned request timed out");
            }
        });
    }

    /// Claim the warm session for one request and push its prompt
    fn begin_request(
        self: &Arc<Self>,
        id: &RequestId,
        message: String,
        options: &PromptOptions,
    ) -> Result<oneshot::Receiver<TurnResult>, ReplyOutcome> {
        let mut core = self.core.lock();

        let state = core.state;
        match state {
            PoolState::Available => {}
            PoolState::Unavailable if core.stale => {
                self.schedule_recycle(&mut core, "previous session ended");
                return Err(ReplyOutcome::Unavailable);
            }
            PoolState::Busy => {
                log::warn!("Request {id} rejected: another request is still in flight");
                return Err(ReplyOutcome::Unavailable);
            }
            state => {
                log::debug!("Request {id} rejected: pool is {state}");
                return Err(ReplyOutcome::Unavailable);
            }
        }

        let Some(session) = core.session.as_ref() else {
            return Err(ReplyOutcome::Unavailable);
        };
        let generation = session.generation;

        if let Err(e) = session.channel.push(message) {
            log::error!("Request {id} could not be queued: {e}");
            core.stale = true;
            self.set_state(&mut core, PoolState::Unavailable);
            return Err(ReplyOutcome::SessionLost);
        }

        let (responder, answer) = oneshot::channel();
        let started_at = Instant::now();
        core.pending = Some(PendingRequest {
            id: id.clone(),
            generation,
            responder,
            deadline: options.timeout.map(|limit| started_at + limit),
            cancel: options.cancel.clone(),
            started_at,
        });
        self.set_state(&mut core, PoolState::Busy);
        log::debug!("Request {id} sent on session generation {generation}");

        Ok(answer)
    }
}
