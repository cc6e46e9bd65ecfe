//! Permission mode passed to the CLI
//!
//! A warm session runs unattended, so nothing here models interactive
//! permission prompts; only the mode flag survives.

use serde::{Deserialize, Serialize};

/// Permission modes for tool execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PermissionMode {
    /// Default mode - CLI prompts for dangerous tools
    Default,
    /// Auto-accept file edits
    AcceptEdits,
    /// Plan mode
    Plan,
    /// Allow all tools without prompting
    #[default]
    BypassPermissions,
}

impl PermissionMode {
    /// Value of the `--permission-mode` CLI flag
    #[must_use]
    pub const fn as_cli_arg(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::AcceptEdits => "acceptEdits",
            Self::Plan => "plan",
            Self::BypassPermissions => "bypassPermissions",
        }
    }
}
