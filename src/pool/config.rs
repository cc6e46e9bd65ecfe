//! Pool configuration

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::{ClaudeError, Result};
use crate::types::identifiers::ToolName;
use crate::types::options::ClaudeAgentOptions;
use crate::types::permissions::PermissionMode;

/// Model a pool starts with when none is configured
pub const DEFAULT_MODEL: &str = "haiku";

/// Synthetic first prompt sent to every new session
pub const DEFAULT_WARMUP_PROMPT: &str = "Reply with exactly one word: READY";

/// Token a warmup reply must contain (case-insensitive)
pub const DEFAULT_READINESS_TOKEN: &str = "ready";

/// How long a new session may take to answer its warmup
pub const DEFAULT_WARMUP_TIMEOUT_MS: u64 = 30_000;

const MAX_ALLOWED_TURNS: u32 = 1000;

/// Configuration of a [`CommandPool`](super::CommandPool)
///
/// Deserializes from JSON with every field optional:
///
/// ```
/// use kodegen_claude_pool::pool::PoolConfig;
///
/// let config = PoolConfig::from_json(r#"{ "model": "sonnet", "warmup_timeout_ms": 5000 }"#).unwrap();
/// assert_eq!(config.model, "sonnet");
/// assert_eq!(config.readiness_token, "ready");
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Model of the first session
    pub model: String,
    /// Prompt used to validate a fresh session
    pub warmup_prompt: String,
    /// Text a warmup reply must mention somewhere
    pub readiness_token: String,
    /// Upper bound on the warmup exchange
    pub warmup_timeout_ms: u64,
    /// System prompt for every session
    pub system_prompt: Option<String>,
    /// Tools a session may use; completions normally need none
    pub allowed_tools: Vec<String>,
    /// Tools a session must never use
    pub disallowed_tools: Vec<String>,
    /// Extra environment for the CLI process; loader and `PATH` overrides are refused
    pub env: HashMap<String, String>,
    /// Must allow unattended operation
    pub permission_mode: PermissionMode,
    /// Turn limit per request
    pub max_turns: u32,
    /// Working directory of the CLI
    pub cwd: Option<PathBuf>,
    /// Intermediate events kept per session for diagnostics
    pub activity_log_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            warmup_prompt: DEFAULT_WARMUP_PROMPT.to_string(),
            readiness_token: DEFAULT_READINESS_TOKEN.to_string(),
            warmup_timeout_ms: DEFAULT_WARMUP_TIMEOUT_MS,
            system_prompt: None,
            allowed_tools: Vec::new(),
            disallowed_tools: Vec::new(),
            env: HashMap::new(),
            permission_mode: PermissionMode::BypassPermissions,
            max_turns: 1,
            cwd: None,
            activity_log_capacity: crate::session::DEFAULT_ACTIVITY_CAPACITY,
        }
    }
}

impl PoolConfig {
    /// Create a new builder for `PoolConfig`
    #[must_use]
    pub fn builder() -> PoolConfigBuilder {
        PoolConfigBuilder::default()
    }

    /// Parse a JSON document
    ///
    /// # Errors
    /// Returns error if the JSON is malformed or the values are invalid
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the values for consistency
    ///
    /// # Errors
    /// Returns `ClaudeError::InvalidConfig` describing the first problem found
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(ClaudeError::invalid_config("model must not be empty"));
        }
        if self.warmup_prompt.trim().is_empty() {
            return Err(ClaudeError::invalid_config("warmup_prompt must not be empty"));
        }
        if self.readiness_token.trim().is_empty() {
            return Err(ClaudeError::invalid_config(
                "readiness_token must not be empty",
            ));
        }
        if self.warmup_timeout_ms == 0 {
            return Err(ClaudeError::invalid_config(
                "warmup_timeout_ms must be greater than zero",
            ));
        }
        if self.max_turns == 0 || self.max_turns > MAX_ALLOWED_TURNS {
            return Err(ClaudeError::invalid_config(format!(
                "max_turns must be between 1 and {MAX_ALLOWED_TURNS}, got {}",
                self.max_turns
            )));
        }
        if self.permission_mode == PermissionMode::Default {
            return Err(ClaudeError::invalid_config(
                "permission_mode 'default' would block on interactive prompts",
            ));
        }
        Ok(())
    }

    /// Warmup timeout as a `Duration`
    #[must_use]
    pub const fn warmup_timeout(&self) -> Duration {
        Duration::from_millis(self.warmup_timeout_ms)
    }

    /// Fixed option set for one session running `model`
    #[must_use]
    pub fn session_options(&self, model: &str) -> ClaudeAgentOptions {
        let mut options = ClaudeAgentOptions::builder()
            .model(model)
            .max_turns(self.max_turns)
            .permission_mode(self.permission_mode)
            .read_timeout(None)
            .disable_session_persistence(true)
            .build();

        options.allowed_tools = self
            .allowed_tools
            .iter()
            .map(|t| ToolName::from(t.as_str()))
            .collect();
        options.disallowed_tools = self
            .disallowed_tools
            .iter()
            .map(|t| ToolName::from(t.as_str()))
            .collect();

        options.system_prompt.clone_from(&self.system_prompt);
        options.env.clone_from(&self.env);
        options.cwd.clone_from(&self.cwd);

        options
    }
}

/// Builder for `PoolConfig`
#[derive(Debug, Default)]
pub struct PoolConfigBuilder {
    config: PoolConfig,
}

impl PoolConfigBuilder {
    /// Set the initial model
    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the warmup prompt
    #[must_use]
    pub fn warmup_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.warmup_prompt = prompt.into();
        self
    }

    /// Set the readiness token
    #[must_use]
    pub fn readiness_token(mut self, token: impl Into<String>) -> Self {
        self.config.readiness_token = token.into();
        self
    }

    /// Set the warmup timeout
    #[must_use]
    pub fn warmup_timeout(mut self, timeout: Duration) -> Self {
        self.config.warmup_timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the system prompt
    #[must_use]
    pub fn system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.system_prompt = Some(prompt.into());
        self
    }

    /// Set allowed tools
    #[must_use]
    pub fn allowed_tools(mut self, tools: Vec<impl Into<String>>) -> Self {
        self.config.allowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Set disallowed tools
    #[must_use]
    pub fn disallowed_tools(mut self, tools: Vec<impl Into<String>>) -> Self {
        self.config.disallowed_tools = tools.into_iter().map(Into::into).collect();
        self
    }

    /// Add an environment variable for every session
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.env.insert(key.into(), value.into());
        self
    }

    /// Set permission mode
    #[must_use]
    pub const fn permission_mode(mut self, mode: PermissionMode) -> Self {
        self.config.permission_mode = mode;
        self
    }

    /// Set max turns per request
    #[must_use]
    pub const fn max_turns(mut self, turns: u32) -> Self {
        self.config.max_turns = turns;
        self
    }

    /// Set working directory
    #[must_use]
    pub fn cwd(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cwd = Some(path.into());
        self
    }

    /// Set how many activity entries each session keeps
    #[must_use]
    pub const fn activity_log_capacity(mut self, capacity: usize) -> Self {
        self.config.activity_log_capacity = capacity;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> PoolConfig {
        self.config
    }
}
