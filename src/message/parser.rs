//! Message parser for Claude Code stream-json output

use crate::error::{ClaudeError, Result};
use crate::types::messages::Message;

/// Parse a JSON value into a typed Message
///
/// # Arguments
/// * `data` - Raw JSON value from CLI output
///
/// # Errors
/// Returns `ClaudeError::MessageParse` if the JSON cannot be parsed into a valid Message.
/// The CLI also prints message types this crate does not model; callers
/// reading a live stream skip those instead of failing.
pub fn parse_message(data: serde_json::Value) -> Result<Message> {
    serde_json::from_value(data.clone()).map_err(|e| {
        ClaudeError::message_parse(format!("Failed to parse message: {e}"), Some(data))
    })
}
