//! Push/pull bridge feeding user messages into a long-lived session
//!
//! [`MessageChannel`] is the producer half: the pool pushes prompts into it
//! whenever it likes. [`ChannelReader`] is the single consumer half, handed
//! to the query backend as the session's input stream. Messages come out in
//! push order and none is ever dropped: a push either completes the
//! reader's pending wait or lands in the buffer.
//!
//! ```text
//!   push("a") ──┐
//!   push("b") ──┼──▶ [ pending: a, b ] ──recv()──▶ backend stdin
//!   close()   ──┘         or waiter
//! ```

use std::collections::VecDeque;
use std::pin::Pin;
use std::sync::Arc;

use futures::Stream;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::error::{ClaudeError, Result};

/// Input sequence consumed by a query backend
pub type InputStream = Pin<Box<dyn Stream<Item = UserEnvelope> + Send>>;

// ============================================================================
// Outbound message shape
// ============================================================================

/// One user turn in the shape the CLI's `stream-json` input expects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEnvelope {
    /// Always "user"
    #[serde(rename = "type")]
    pub message_type: String,
    /// The user turn itself
    pub message: UserTurn,
    /// Always empty for top-level prompts
    pub parent_tool_use_id: Option<String>,
    /// Left empty; the CLI assigns the session
    pub session_id: String,
}

/// Role and content of a user turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserTurn {
    /// Always "user"
    pub role: String,
    /// Prompt text
    pub content: String,
}

impl UserEnvelope {
    /// Wrap prompt text into a user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            message_type: "user".to_string(),
            message: UserTurn {
                role: "user".to_string(),
                content: content.into(),
            },
            parent_tool_use_id: None,
            session_id: String::new(),
        }
    }

    /// Prompt text carried by this message
    #[must_use]
    pub fn content(&self) -> &str {
        &self.message.content
    }

    /// Serialize as one newline-terminated JSON line
    ///
    /// # Errors
    /// Returns error if serialization fails
    pub fn to_json_line(&self) -> Result<String> {
        Ok(format!("{}\n", serde_json::to_string(self)?))
    }
}

// ============================================================================
// Channel
// ============================================================================

#[derive(Default)]
struct ChannelState {
    pending: VecDeque<UserEnvelope>,
    waiter: Option<oneshot::Sender<UserEnvelope>>,
    closed: bool,
}

/// Producer half of a session's input
///
/// Dropping the channel closes it, so the reader never waits on a producer
/// that no longer exists.
pub struct MessageChannel {
    state: Arc<Mutex<ChannelState>>,
}

/// Consumer half of a session's input; there is exactly one per channel
pub struct ChannelReader {
    state: Arc<Mutex<ChannelState>>,
}

impl MessageChannel {
    /// Create a channel and its only reader
    #[must_use]
    pub fn new() -> (Self, ChannelReader) {
        let state = Arc::new(Mutex::new(ChannelState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            ChannelReader { state },
        )
    }

    /// Push a prompt onto the channel
    ///
    /// # Errors
    /// Returns `ClaudeError::ChannelClosed` once the channel has been closed
    pub fn push(&self, content: impl Into<String>) -> Result<()> {
        let envelope = UserEnvelope::user(content);
        let mut state = self.state.lock();

        if state.closed {
            return Err(ClaudeError::ChannelClosed);
        }

        match state.waiter.take() {
            Some(waiter) => {
                // The reader may have stopped waiting; keep the message then
                if let Err(envelope) = waiter.send(envelope) {
                    state.pending.push_back(envelope);
                }
            }
            None => state.pending.push_back(envelope),
        }

        Ok(())
    }

    /// Close the channel. Idempotent.
    ///
    /// A waiting reader sees end-of-sequence at once. Messages already
    /// buffered are still delivered before the end.
    pub fn close(&self) {
        let mut state = self.state.lock();
        state.closed = true;
        // Dropping the sender ends the reader's wait
        state.waiter.take();
    }

    /// Whether `close` has been called
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Number of messages pushed but not yet read
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.state.lock().pending.len()
    }
}

impl Drop for MessageChannel {
    fn drop(&mut self) {
        self.close();
    }
}

impl ChannelReader {
    /// Next message in push order, or `None` once the channel is closed and drained
    pub async fn recv(&mut self) -> Option<UserEnvelope> {
        let waiter = {
            let mut state = self.state.lock();
            if let Some(envelope) = state.pending.pop_front() {
                return Some(envelope);
            }
            if state.closed {
                return None;
            }
            let (tx, rx) = oneshot::channel();
            state.waiter = Some(tx);
            rx
        };

        waiter.await.ok()
    }

    /// Turn the reader into the input stream a query backend consumes
    #[must_use]
    pub fn into_stream(self) -> InputStream {
        Box::pin(futures::stream::unfold(self, |mut reader| async move {
            reader.recv().await.map(|envelope| (envelope, reader))
        }))
    }
}
