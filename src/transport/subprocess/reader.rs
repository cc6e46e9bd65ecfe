//! Message reading logic for subprocess transport

use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;

use crate::error::{ClaudeError, Result};

use super::transport::SubprocessTransport;

impl SubprocessTransport {
    /// Read messages from the subprocess output
    ///
    /// Spawns a background task that reads JSON messages from stdout. The task
    /// takes ownership of the child process so it can report a failing exit
    /// status once stdout reaches EOF.
    pub(super) fn read_messages_impl(
        &mut self,
    ) -> mpsc::UnboundedReceiver<Result<serde_json::Value>> {
        let (tx, rx) = mpsc::unbounded_channel();

        let stdout = self.stdout.take();
        let process = self.process.take();
        let max_buffer_size = self.max_buffer_size;
        let read_timeout = self.options.read_timeout;

        let task = tokio::spawn(async move {
            let Some(mut stdout) = stdout else {
                let _ = tx.send(Err(ClaudeError::connection(
                    "Not connected - stdout not available",
                )));
                return;
            };
            let mut json_buffer = String::new();

            loop {
                let mut line = String::new();

                // A warm session idles between requests, so the timeout is opt-in
                let read = match read_timeout {
                    Some(limit) => {
                        match tokio::time::timeout(limit, stdout.read_line(&mut line)).await {
                            Ok(read) => read,
                            Err(_) => {
                                let _ = tx.send(Err(ClaudeError::timeout(
                                    "Read operation timed out",
                                )));
                                break;
                            }
                        }
                    }
                    None => stdout.read_line(&mut line).await,
                };

                match read {
                    Ok(0) => break,
                    Ok(_) => {
                        let line = line.trim();
                        if line.is_empty() {
                            continue;
                        }

                        // Accumulate partial JSON until we can parse it
                        json_buffer.push_str(line);

                        if json_buffer.len() > max_buffer_size {
                            let _ = tx.send(Err(ClaudeError::json_decode_overflow(
                                max_buffer_size,
                            )));
                            json_buffer.clear();
                            continue;
                        }

                        if let Ok(data) = serde_json::from_str::<serde_json::Value>(&json_buffer) {
                            json_buffer.clear();
                            if tx.send(Ok(data)).is_err() {
                                break;
                            }
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(ClaudeError::Io(e)));
                        break;
                    }
                }
            }

            if let Some(mut child) = process {
                match child.wait().await {
                    Ok(status) => {
                        if !status.success()
                            && let Some(code) = status.code()
                        {
                            let _ = tx.send(Err(ClaudeError::process(
                                "Command failed",
                                code,
                                Some("Check debug logs for stderr output".to_string()),
                            )));
                        }
                    }
                    Err(e) => {
                        let _ = tx.send(Err(ClaudeError::Io(e)));
                    }
                }
            }
        });

        self.reader_task = Some(task);

        rx
    }
}
