//! Session lifecycle: activation, warmup, recycling and disposal

use std::sync::Arc;

use chrono::Utc;

use crate::channel::MessageChannel;
use crate::error::{ClaudeError, Result};
use crate::session::{SessionDriver, TurnResult};

use super::collector;
use super::inner::PoolInner;
use super::state::{ActiveSession, PoolState};
use super::warmup::await_warmup;

/// What to do after a warmup finished
enum WarmupVerdict {
    Ready,
    /// The model changed while warming up; start over with the new one
    Restart,
    Failed(ClaudeError),
}

impl PoolInner {
    /// Bring up a warm session unless one is already serving
    pub async fn activate(self: &Arc<Self>) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;

        {
            let core = self.core.lock();
            match core.state {
                PoolState::Available | PoolState::Busy => return Ok(()),
                PoolState::Disposed => return Err(ClaudeError::Disposed),
                _ => {}
            }
        }

        self.start_session(PoolState::Activating).await
    }

    /// Replace the current session with a fresh one
    ///
    /// With `expected` set, the recycle only goes ahead if that session
    /// generation is still the current one; a scheduled recycle must not
    /// tear down a session that replaced the stuck one in the meantime.
    pub async fn recycle(self: &Arc<Self>, expected: Option<u64>, reason: &str) -> Result<()> {
        let _lifecycle = self.lifecycle.lock().await;

        {
            let mut core = self.core.lock();
            if core.state == PoolState::Disposed {
                return Err(ClaudeError::Disposed);
            }
            if let Some(generation) = expected
                && core.generation != generation
            {
                log::debug!("Skipping recycle ({reason}): generation {generation} already replaced");
                return Ok(());
            }

            log::info!("Recycling session: {reason}");
            core.stats.recycles += 1;
            self.teardown(&mut core);
            self.set_state(&mut core, PoolState::Recycling);
        }

        self.start_session(PoolState::Recycling).await
    }

    /// Start sessions until one passes its warmup against the desired model
    ///
    /// Callers hold the lifecycle lock.
    async fn start_session(self: &Arc<Self>, phase: PoolState) -> Result<()> {
        loop {
            let (generation, model) = {
                let mut core = self.core.lock();
                if core.state == PoolState::Disposed {
                    return Err(ClaudeError::Disposed);
                }
                self.teardown(&mut core);
                core.generation += 1;
                core.stale = false;
                core.stats.sessions_started += 1;
                self.set_state(&mut core, phase);
                (core.generation, core.desired_model.clone())
            };

            log::info!("Starting session generation {generation} for model {model}");

            let (channel, reader) = MessageChannel::new();
            // Queued before the backend is polled: the CLI reads input first
            channel.push(self.config.warmup_prompt.as_str())?;

            let mut driver = SessionDriver::start(
                self.backend.as_ref(),
                reader,
                self.config.session_options(&model),
                self.config.activity_log_capacity,
            );

            let warmup = tokio::select! {
                result = await_warmup(&mut driver, &self.config) => result,
                () = self.shutdown.cancelled() => Err(ClaudeError::Disposed),
            };

            match self.finish_warmup(phase, generation, model, channel, driver, warmup) {
                WarmupVerdict::Ready => return Ok(()),
                WarmupVerdict::Restart => {}
                WarmupVerdict::Failed(e) => return Err(e),
            }
        }
    }

    fn finish_warmup(
        self: &Arc<Self>,
        phase: PoolState,
        generation: u64,
        model: String,
        channel: MessageChannel,
        driver: SessionDriver,
        warmup: Result<TurnResult>,
    ) -> WarmupVerdict {
        let mut core = self.core.lock();

        if core.state == PoolState::Disposed || core.generation != generation {
            channel.close();
            return WarmupVerdict::Failed(ClaudeError::Disposed);
        }

        let turn = match warmup {
            Ok(turn) => turn,
            Err(e) => {
                log::warn!("Warmup failed for model {model}: {e}");
                channel.close();
                core.last_error = Some(e.to_string());
                // A failed replacement is retried by the next request
                core.stale = phase == PoolState::Recycling;
                self.set_state(&mut core, PoolState::Unavailable);
                return WarmupVerdict::Failed(e);
            }
        };

        if core.desired_model != model {
            log::info!(
                "Model changed to {} during warmup, restarting",
                core.desired_model
            );
            channel.close();
            core.stats.recycles += 1;
            return WarmupVerdict::Restart;
        }

        log::info!(
            "Session generation {generation} ready on {model} ({}ms warmup)",
            turn.duration_ms
        );

        let session_id = driver.session_id().cloned();
        let activity = driver.activity_log().clone();
        let collector = collector::spawn(Arc::clone(self), driver, generation);
        core.session = Some(ActiveSession {
            generation,
            model,
            channel,
            session_id,
            activity,
            collector,
        });
        core.last_error = None;
        core.stats.last_warmup_at = Some(Utc::now());
        self.set_state(&mut core, PoolState::Available);

        WarmupVerdict::Ready
    }

    /// Tear everything down for good. Idempotent.
    pub fn dispose(&self) {
        self.shutdown.cancel();

        let mut core = self.core.lock();
        if core.state == PoolState::Disposed {
            return;
        }
        self.teardown(&mut core);
        self.set_state(&mut core, PoolState::Disposed);
        log::info!("Pool disposed");
    }
}
