//! Options for one Claude Code CLI invocation
//!
//! A warm session is a single long-lived invocation, so these options are
//! fixed for the lifetime of the session. Changing any of them (most often
//! the model) means starting a new session.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use super::identifiers::ToolName;
use super::permissions::PermissionMode;

// ============================================================================
// Claude Agent Options
// ============================================================================

/// Options for a single CLI invocation
#[derive(Debug, Clone, Default)]
pub struct ClaudeAgentOptions {
    /// List of tools that Claude is allowed to use
    pub allowed_tools: Vec<ToolName>,
    /// List of tools that Claude is not allowed to use
    pub disallowed_tools: Vec<ToolName>,
    /// System prompt replacing the CLI default
    pub system_prompt: Option<String>,
    /// Permission mode for tool execution
    pub permission_mode: Option<PermissionMode>,
    /// Maximum number of turns per request
    pub max_turns: Option<u32>,
    /// AI model to use
    pub model: Option<String>,
    /// Working directory for the CLI process
    pub cwd: Option<PathBuf>,
    /// Environment variables for the CLI process
    pub env: HashMap<String, String>,
    /// Maximum buffer size for JSON messages (default: 1MB)
    pub max_buffer_size: Option<usize>,
    /// Maximum time to wait for the next stdout line; `None` waits forever
    pub read_timeout: Option<Duration>,
    /// Pass `--no-session-persistence` so the CLI keeps nothing on disk
    pub disable_session_persistence: bool,
}

impl ClaudeAgentOptions {
    /// Create a new builder for `ClaudeAgentOptions`
    #[must_use]
    pub fn builder() -> ClaudeAgentOptionsBuilder {
        ClaudeAgentOptionsBuilder::default()
    }
}

// ============================================================================
// Builder for ClaudeAgentOptions
// ============================================================================

/// Builder for `ClaudeAgentOptions`
#[derive(Debug, Default)]
pub struct ClaudeAgentOptionsBuilder {
    options: ClaudeAgentOptions,
}

impl ClaudeAgentOptionsBuilder {
    /// Set allowed tools
    #[must_use]
    pub fn allowed_tools(mut self, tools: Vec<impl Into<ToolName>>) -> Self {
        self.options.allowed_tools = tools.into_iter().map(std::convert::Into::into).collect();
        self
    }

    /// Set disallowed tools
    #[must_use]
    pub fn disallowed_tools(mut self, tools: Vec<impl Into<ToolName>>) -> Self {
        self.options.disallowed_tools = tools.into_iter().map(std::convert::Into::into).collect();
        self
    }

    /// Set system prompt
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.options.system_prompt = Some(prompt.into());
        self
    }

    /// Set permission mode
    #[must_use]
    pub const fn permission_mode(mut self, mode: PermissionMode) -> Self {
        self.options.permission_mode = Some(mode);
        self
    }

    /// Set max turns
    ///
    /// # Panics
    /// Panics if turns exceeds 1000
    #[must_use]
    pub fn max_turns(mut self, turns: u32) -> Self {
        const MAX_ALLOWED_TURNS: u32 = 1000;
        assert!(
            turns <= MAX_ALLOWED_TURNS,
            "max_turns {turns} exceeds maximum allowed: {MAX_ALLOWED_TURNS}"
        );
        self.options.max_turns = Some(turns);
        self
    }

    /// Set model
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.options.model = Some(model.into());
        self
    }

    /// Set working directory
    #[must_use]
    pub fn cwd(mut self, path: impl Into<PathBuf>) -> Self {
        self.options.cwd = Some(path.into());
        self
    }

    /// Add an environment variable for the CLI process
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.env.insert(key.into(), value.into());
        self
    }

    /// Set the per-line read timeout
    #[must_use]
    pub const fn read_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.options.read_timeout = timeout;
        self
    }

    /// Disable on-disk session persistence
    #[must_use]
    pub const fn disable_session_persistence(mut self, disable: bool) -> Self {
        self.options.disable_session_persistence = disable;
        self
    }

    /// Build the options
    #[must_use]
    pub fn build(self) -> ClaudeAgentOptions {
        self.options
    }
}
