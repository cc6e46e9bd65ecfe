//! Per-request options and replies

use std::time::Duration;

use tokio_util::sync::CancellationToken;

/// Options for one `send_prompt` call
#[derive(Debug, Clone, Default)]
pub struct PromptOptions {
    /// Give up on the request after this long and recycle the session
    pub timeout: Option<Duration>,
    /// Caller-side abandonment signal
    pub cancel: Option<CancellationToken>,
}

impl PromptOptions {
    /// Options with a timeout
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Options with a cancellation token
    #[must_use]
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// How a `send_prompt` call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The session produced a result
    Completed,
    /// No warm session could take the request
    Unavailable,
    /// The timeout elapsed first; the session is being recycled
    TimedOut,
    /// The caller cancelled
    Cancelled,
    /// The session was recycled, disposed or died while the request was in flight
    SessionLost,
}

/// Reply to one `send_prompt` call
///
/// `text` is `None` for every outcome except a `Completed` result with
/// non-empty text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptReply {
    /// Completion text
    pub text: Option<String>,
    /// Why the call ended
    pub outcome: ReplyOutcome,
}

impl PromptReply {
    pub(super) fn completed(text: String) -> Self {
        Self {
            text: (!text.is_empty()).then_some(text),
            outcome: ReplyOutcome::Completed,
        }
    }

    pub(super) const fn empty(outcome: ReplyOutcome) -> Self {
        Self {
            text: None,
            outcome,
        }
    }

    /// Whether the reply carries text
    #[must_use]
    pub fn has_text(&self) -> bool {
        self.text.is_some()
    }
}
