//! Structured events surfaced by a session

use crate::types::identifiers::SessionId;
use crate::types::messages::Message;

/// What a session reported, reduced to what the pool acts on
#[derive(Debug, Clone, PartialEq)]
pub enum StructuredEvent {
    /// The CLI finished starting up
    Init {
        /// Session ID assigned by the CLI
        session_id: Option<SessionId>,
        /// Model the CLI actually loaded
        model: Option<String>,
    },
    /// Intermediate progress; never resolves a request
    Activity(Activity),
    /// Terminal outcome of the current request
    Result(TurnResult),
    /// The output stream ended
    Ended,
    /// The output stream failed
    Failed(String),
}

/// Intermediate progress within a turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    /// What kind of progress this is
    pub kind: ActivityKind,
    /// Short human-readable detail (tool names, a text snippet, a subtype)
    pub detail: String,
}

/// Kinds of intermediate progress
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityKind {
    /// Assistant produced text
    AssistantText,
    /// Assistant asked to run one or more tools
    ToolUse,
    /// A tool result was fed back
    ToolResult,
    /// Non-init system message
    System,
    /// Partial streaming event
    Partial,
}

/// Terminal outcome of one request
#[derive(Debug, Clone, PartialEq)]
pub struct TurnResult {
    /// Final text; empty unless the turn succeeded
    pub text: String,
    /// Number of turns the CLI took
    pub num_turns: u32,
    /// Result subtype as reported (`success`, `error_max_turns`, ...)
    pub subtype: String,
    /// Whether the CLI flagged the result as an error
    pub is_error: bool,
    /// Session the result belongs to
    pub session_id: SessionId,
    /// Wall time the CLI spent on the turn
    pub duration_ms: u64,
}

impl TurnResult {
    /// Whether the turn completed normally
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.subtype == "success" && !self.is_error
    }
}

const DETAIL_LIMIT: usize = 80;

fn snippet(text: &str) -> String {
    match text.char_indices().nth(DETAIL_LIMIT) {
        Some((end, _)) => format!("{}…", &text[..end]),
        None => text.to_string(),
    }
}

/// Classify one CLI message
#[must_use]
pub fn classify(message: Message) -> StructuredEvent {
    match message {
        Message::System { subtype, data } if subtype == "init" => StructuredEvent::Init {
            session_id: data
                .get("session_id")
                .and_then(|v| v.as_str())
                .map(SessionId::from),
            model: data
                .get("model")
                .and_then(|v| v.as_str())
                .map(String::from),
        },
        Message::System { subtype, .. } => StructuredEvent::Activity(Activity {
            kind: ActivityKind::System,
            detail: subtype,
        }),
        Message::Assistant { message, .. } => {
            let tools: Vec<&str> = message.tool_uses().collect();
            let activity = if tools.is_empty() {
                Activity {
                    kind: ActivityKind::AssistantText,
                    detail: snippet(&message.text()),
                }
            } else {
                Activity {
                    kind: ActivityKind::ToolUse,
                    detail: tools.join(","),
                }
            };
            StructuredEvent::Activity(activity)
        }
        Message::User { .. } => StructuredEvent::Activity(Activity {
            kind: ActivityKind::ToolResult,
            detail: String::new(),
        }),
        Message::StreamEvent { .. } => StructuredEvent::Activity(Activity {
            kind: ActivityKind::Partial,
            detail: String::new(),
        }),
        Message::Result {
            subtype,
            duration_ms,
            is_error,
            num_turns,
            session_id,
            result,
            ..
        } => {
            let mut turn = TurnResult {
                text: String::new(),
                num_turns,
                subtype,
                is_error,
                session_id,
                duration_ms,
            };
            if turn.is_success() {
                turn.text = result.unwrap_or_default();
            }
            StructuredEvent::Result(turn)
        }
    }
}
