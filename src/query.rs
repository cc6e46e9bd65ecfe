//! The external query primitive a session is built on
//!
//! A [`QueryBackend`] takes an input sequence of user messages plus the option
//! set for one session and returns the stream of messages the model produces.
//! [`CliQuery`] is the production backend: one call spawns one Claude Code
//! process in `stream-json` mode that stays alive for as long as the input
//! sequence stays open.
//!
//! ```no_run
//! use kodegen_claude_pool::channel::MessageChannel;
//! use kodegen_claude_pool::query::{CliQuery, QueryBackend};
//! use kodegen_claude_pool::types::options::ClaudeAgentOptions;
//! use futures::StreamExt;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let (channel, reader) = MessageChannel::new();
//! channel.push("Say READY")?;
//!
//! let options = ClaudeAgentOptions::builder().model("haiku").build();
//! let mut stream = CliQuery::new().query(reader.into_stream(), options);
//! while let Some(message) = stream.next().await {
//!     log::info!("{:?}", message?);
//! }
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::channel::InputStream;
use crate::error::Result;
use crate::message::parse_message;
use crate::transport::{SubprocessTransport, Transport};
use crate::types::messages::Message;
use crate::types::options::ClaudeAgentOptions;

/// Output sequence of a query: parsed messages, or the error that ended it
pub type MessageStream = Pin<Box<dyn Stream<Item = Result<Message>> + Send>>;

/// Entry point that turns an input sequence into a model session
///
/// Each call must start a brand-new session; the pool relies on this to
/// replace sessions wholesale. Dropping the returned stream must release
/// everything the session holds.
pub trait QueryBackend: Send + Sync + 'static {
    /// Start a session reading `input` and configured by `options`
    fn query(&self, input: InputStream, options: ClaudeAgentOptions) -> MessageStream;
}

/// Query backend that drives the Claude Code CLI as a subprocess
#[derive(Debug, Clone, Default)]
pub struct CliQuery {
    cli_path: Option<PathBuf>,
}

impl CliQuery {
    /// Backend that locates `claude` on first use
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend that always runs the given CLI binary
    #[must_use]
    pub fn with_cli_path(path: impl Into<PathBuf>) -> Self {
        Self {
            cli_path: Some(path.into()),
        }
    }
}

impl QueryBackend for CliQuery {
    fn query(&self, input: InputStream, options: ClaudeAgentOptions) -> MessageStream {
        let cli_path = self.cli_path.clone();

        Box::pin(async_stream::try_stream! {
            let mut transport = SubprocessTransport::new(options, cli_path)?;
            transport.connect().await?;

            let mut output = transport.read_messages();
            let transport = Arc::new(Mutex::new(transport));
            let _pump = InputPump::spawn(Arc::clone(&transport), input);

            while let Some(item) = output.recv().await {
                let value = item?;
                match parse_message(value) {
                    Ok(message) => yield message,
                    Err(e) => log::debug!("Skipping unrecognised CLI message: {e}"),
                }
            }
        })
    }
}

/// Copies the input sequence onto the CLI's stdin
///
/// Aborted on drop, so tearing down the output stream also stops the writer.
struct InputPump {
    task: JoinHandle<()>,
}

impl InputPump {
    fn spawn(transport: Arc<Mutex<SubprocessTransport>>, mut input: InputStream) -> Self {
        let task = tokio::spawn(async move {
            while let Some(envelope) = input.next().await {
                let line = match envelope.to_json_line() {
                    Ok(line) => line,
                    Err(e) => {
                        log::error!("Failed to encode user message: {e}");
                        continue;
                    }
                };

                if let Err(e) = transport.lock().await.write(&line).await {
                    log::warn!("Stopped writing to Claude Code: {e}");
                    return;
                }
            }

            // Input closed: let the CLI finish its current turn and exit
            if let Err(e) = transport.lock().await.end_input().await {
                log::debug!("Failed to close Claude Code stdin: {e}");
            }
        });

        Self { task }
    }
}

impl Drop for InputPump {
    fn drop(&mut self) {
        self.task.abort();
    }
}
