//! CLI command building logic for subprocess transport

use tokio::process::Command;

use crate::types::options::ClaudeAgentOptions;

/// Command builder for Claude CLI
///
/// The CLI always runs in streaming mode: user messages arrive as JSON
/// lines on stdin for as long as the session lives.
pub struct CommandBuilder<'a> {
    cli_path: &'a std::path::Path,
    options: &'a ClaudeAgentOptions,
}

impl<'a> CommandBuilder<'a> {
    /// Create a new command builder
    pub fn new(cli_path: &'a std::path::Path, options: &'a ClaudeAgentOptions) -> Self {
        Self { cli_path, options }
    }

    /// Build the complete CLI command with all arguments
    pub fn build(&self) -> Command {
        let mut cmd = Command::new(self.cli_path);

        // Base arguments
        cmd.arg("--print")
            .arg("--output-format")
            .arg("stream-json")
            .arg("--verbose")
            .arg("--input-format")
            .arg("stream-json");

        if let Some(ref system_prompt) = self.options.system_prompt {
            cmd.arg("--system-prompt").arg(system_prompt);
        }

        self.add_tool_args(&mut cmd);
        self.add_configuration_args(&mut cmd);

        // Never pick up user or project settings; the session is configured
        // entirely from the options above.
        cmd.arg("--setting-sources").arg("");

        // A recycled session must never leave an orphaned CLI behind
        cmd.kill_on_drop(true);

        cmd
    }

    /// Add tool-related arguments
    fn add_tool_args(&self, cmd: &mut Command) {
        if !self.options.allowed_tools.is_empty() {
            let tools: Vec<&str> = self
                .options
                .allowed_tools
                .iter()
                .map(|t| t.as_str())
                .collect();
            cmd.arg("--allowedTools").arg(tools.join(","));
        }

        if !self.options.disallowed_tools.is_empty() {
            let tools: Vec<&str> = self
                .options
                .disallowed_tools
                .iter()
                .map(|t| t.as_str())
                .collect();
            cmd.arg("--disallowedTools").arg(tools.join(","));
        }
    }

    /// Add configuration arguments (model, max turns, permissions, persistence)
    fn add_configuration_args(&self, cmd: &mut Command) {
        if let Some(max_turns) = self.options.max_turns {
            cmd.arg("--max-turns").arg(max_turns.to_string());
        }

        if let Some(ref model) = self.options.model {
            cmd.arg("--model").arg(model);
        }

        if let Some(mode) = self.options.permission_mode {
            cmd.arg("--permission-mode").arg(mode.as_cli_arg());
        }

        if self.options.disable_session_persistence {
            cmd.arg("--no-session-persistence");
        }
    }
}
