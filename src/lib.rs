//! # Warm Claude Code sessions for low-latency completions
//!
//! Every fresh Claude Code invocation pays for process startup, connection
//! setup and model warm-up before it produces a single token. Editor
//! completions cannot afford that on every keystroke. This crate keeps one
//! CLI session running, validated and ready, and funnels prompts into it.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::time::Duration;
//! use kodegen_claude_pool::{CommandPool, PoolConfig, PromptOptions, ReplyOutcome};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = CommandPool::with_cli(PoolConfig::default(), None)?;
//!     pool.activate().await?;
//!
//!     let options = PromptOptions::default().with_timeout(Duration::from_secs(5));
//!     let reply = pool.send_prompt("Complete: let total = items.iter()", options).await;
//!     match reply.outcome {
//!         ReplyOutcome::Completed => log::info!("{}", reply.text.unwrap_or_default()),
//!         outcome => log::warn!("no completion: {outcome:?}"),
//!     }
//!
//!     pool.dispose();
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`channel`]: Push/pull bridge feeding prompts into a running session
//! - [`query`]: The query primitive ([`QueryBackend`]) and its CLI implementation
//! - [`session`]: One query invocation turned into a stream of structured events
//! - [`pool`]: [`CommandPool`], which warms, serves, recycles and disposes sessions
//! - [`transport`]: Subprocess plumbing to the Claude Code CLI
//! - [`message`]: Parsing of the CLI's `stream-json` output
//! - [`types`]: Messages, options and identifiers
//! - [`error`]: Error types and handling
//!
//! ## Error Handling
//!
//! Lifecycle operations return [`Result<T, ClaudeError>`](Result).
//! [`CommandPool::send_prompt`] never fails; problems come back as a
//! [`PromptReply`] without text whose [`ReplyOutcome`] says what happened.
//!
//! ## Requirements
//!
//! - Claude Code: `npm install -g @anthropic-ai/claude-code`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod error;
pub mod message;
pub mod pool;
pub mod query;
pub mod session;
pub mod transport;
pub mod types;

pub use channel::{ChannelReader, MessageChannel, UserEnvelope};
pub use error::{ClaudeError, Result};
pub use message::parse_message;
pub use pool::{
    CommandPool, PoolConfig, PoolConfigBuilder, PoolState, PoolStats, PromptOptions, PromptReply,
    ReplyOutcome,
};
pub use query::{CliQuery, MessageStream, QueryBackend};
pub use session::{SessionDriver, StructuredEvent, TurnResult};
pub use transport::{SubprocessTransport, Transport};

pub use types::identifiers::{RequestId, SessionId, ToolName};
pub use types::messages::{ContentBlock, ContentValue, Message, UserContent};
pub use types::options::{ClaudeAgentOptions, ClaudeAgentOptionsBuilder};
pub use types::permissions::PermissionMode;

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
