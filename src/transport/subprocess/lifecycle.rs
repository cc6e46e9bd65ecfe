//! Lifecycle management for subprocess transport (connect, teardown)

use std::collections::HashMap;
use std::env;
use std::process::Stdio;
use std::sync::atomic::Ordering;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::VERSION;
use crate::error::{ClaudeError, Result};
use crate::types::options::ClaudeAgentOptions;

use super::command::CommandBuilder;
use super::config::DANGEROUS_ENV_VARS;
use super::transport::SubprocessTransport;

impl SubprocessTransport {
    /// Spawn the Claude Code CLI process and set up stdio pipes
    ///
    /// # Errors
    /// Returns error if process spawning fails or stdio handles cannot be obtained
    pub(super) async fn connect_impl(&mut self) -> Result<()> {
        if self.process.is_some() {
            return Ok(());
        }

        let builder = CommandBuilder::new(&self.cli_path, &self.options);
        let mut cmd = builder.build();

        let mut process_env = env::vars().collect::<HashMap<_, _>>();
        process_env.extend(forwarded_env(&self.options));

        process_env.insert("CLAUDE_CODE_ENTRYPOINT".to_string(), "sdk-rust".to_string());
        process_env.insert("CLAUDE_AGENT_SDK_VERSION".to_string(), VERSION.to_string());

        if let Some(ref cwd) = self.cwd {
            process_env.insert("PWD".to_string(), cwd.to_string_lossy().to_string());
            cmd.current_dir(cwd);
        }

        cmd.envs(process_env);

        // stderr is piped so the child never touches the parent terminal
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| {
            if let Some(ref cwd) = self.cwd
                && !cwd.exists()
            {
                return ClaudeError::connection(format!(
                    "Working directory does not exist: {}",
                    cwd.display()
                ));
            }
            ClaudeError::connection(format!("Failed to start Claude Code: {e}"))
        })?;

        log::debug!(
            "Spawned Claude Code (pid {:?}) from {}",
            child.id(),
            self.cli_path.display()
        );

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| ClaudeError::connection("Failed to get stdin handle"))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ClaudeError::connection("Failed to get stdout handle"))?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ClaudeError::connection("Failed to get stderr handle"))?;

        // Drain stderr so the child never blocks on a full pipe
        let stderr_task = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                log::debug!("claude stderr: {line}");
            }
        });

        self.stdin = Some(stdin);
        self.stdout = Some(BufReader::new(stdout));
        self.process = Some(child);
        self.stderr_task = Some(stderr_task);
        self.ready.store(true, Ordering::SeqCst);

        Ok(())
    }

    /// Handle Drop cleanup
    pub(super) fn drop_impl(&mut self) {
        drop(self.stdin.take());

        if let Some(task) = self.reader_task.take() {
            task.abort();
        }

        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }

        if let Some(mut child) = self.process.take() {
            let _ = child.start_kill();
        }
    }
}

/// Environment variables from the options that may reach the CLI process
///
/// Anything in [`DANGEROUS_ENV_VARS`] is dropped with a warning.
pub(super) fn forwarded_env(options: &ClaudeAgentOptions) -> HashMap<String, String> {
    options
        .env
        .iter()
        .filter(|(key, _)| {
            let refused = DANGEROUS_ENV_VARS.contains(&key.as_str());
            if refused {
                log::warn!("Refusing to forward environment variable {key} to Claude Code");
            }
            !refused
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}
