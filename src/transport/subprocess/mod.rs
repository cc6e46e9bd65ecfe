//! Subprocess transport implementation using Claude Code CLI
//!
//! Spawns the Claude Code CLI as a subprocess and talks to it over
//! stdin/stdout using newline-delimited JSON.

mod command;
mod config;
mod lifecycle;
mod reader;
mod transport;

pub use command::CommandBuilder;
pub use transport::SubprocessTransport;
