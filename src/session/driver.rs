//! Session driver: one query invocation and its classified output

use futures::StreamExt;

use crate::channel::ChannelReader;
use crate::error::{ClaudeError, Result};
use crate::query::{MessageStream, QueryBackend};
use crate::types::identifiers::SessionId;
use crate::types::options::ClaudeAgentOptions;

use super::activity::ActivityLog;
use super::event::{StructuredEvent, TurnResult, classify};

/// Owns exactly one running query and turns its output into [`StructuredEvent`]s
///
/// The driver does no retries and keeps no timers. Once the underlying
/// stream ends or fails it reports that once and then only ever yields
/// [`StructuredEvent::Ended`].
pub struct SessionDriver {
    model: String,
    messages: MessageStream,
    session_id: Option<SessionId>,
    activity: ActivityLog,
    finished: bool,
}

impl SessionDriver {
    /// Start a session reading from `input`
    ///
    /// Nothing is awaited here; the backend starts producing once the
    /// driver is polled for its first event.
    pub fn start(
        backend: &dyn QueryBackend,
        input: ChannelReader,
        options: ClaudeAgentOptions,
        activity_capacity: usize,
    ) -> Self {
        let model = options.model.clone().unwrap_or_default();
        log::debug!("Starting session for model {model:?}");
        let messages = backend.query(input.into_stream(), options);

        Self {
            model,
            messages,
            session_id: None,
            activity: ActivityLog::new(activity_capacity),
            finished: false,
        }
    }

    /// Wait for the next event
    pub async fn next_event(&mut self) -> StructuredEvent {
        if self.finished {
            return StructuredEvent::Ended;
        }

        let event = match self.messages.next().await {
            Some(Ok(message)) => classify(message),
            Some(Err(e)) => {
                self.finished = true;
                StructuredEvent::Failed(e.to_string())
            }
            None => {
                self.finished = true;
                StructuredEvent::Ended
            }
        };

        self.record(&event);
        event
    }

    /// Skip activity until the next result
    ///
    /// # Errors
    /// Returns `ClaudeError::SessionEnded` if the stream ends or fails first
    pub async fn next_result(&mut self) -> Result<TurnResult> {
        loop {
            match self.next_event().await {
                StructuredEvent::Result(turn) => return Ok(turn),
                StructuredEvent::Ended => {
                    return Err(ClaudeError::session_ended(
                        "stream ended before a result arrived",
                    ));
                }
                StructuredEvent::Failed(reason) => return Err(ClaudeError::session_ended(reason)),
                StructuredEvent::Init { .. } | StructuredEvent::Activity(_) => {}
            }
        }
    }

    fn record(&mut self, event: &StructuredEvent) {
        match event {
            StructuredEvent::Init { session_id, model } => {
                log::debug!("Session initialised: id={session_id:?} model={model:?}");
                if session_id.is_some() {
                    self.session_id.clone_from(session_id);
                }
            }
            StructuredEvent::Activity(activity) => {
                log::debug!("Session activity {:?}: {}", activity.kind, activity.detail);
                self.activity.push(activity.clone());
            }
            StructuredEvent::Result(turn) => {
                log::debug!(
                    "Session result: subtype={} turns={} {}ms",
                    turn.subtype,
                    turn.num_turns,
                    turn.duration_ms
                );
                self.session_id = Some(turn.session_id.clone());
            }
            StructuredEvent::Ended => log::debug!("Session stream ended"),
            StructuredEvent::Failed(reason) => log::error!("Session stream failed: {reason}"),
        }
    }

    /// Model this session was started with
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Session ID reported by the CLI, once known
    #[must_use]
    pub fn session_id(&self) -> Option<&SessionId> {
        self.session_id.as_ref()
    }

    /// Shared handle to the most recent intermediate activity
    #[must_use]
    pub fn activity_log(&self) -> &ActivityLog {
        &self.activity
    }

    /// Whether the underlying stream has ended
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
