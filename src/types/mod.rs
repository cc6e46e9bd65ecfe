//! Type definitions shared by the transport, session and pool layers
//!
//! - [`identifiers`] - Type-safe ID wrappers (`SessionId`, `ToolName`, `RequestId`)
//! - [`permissions`] - Permission mode flag
//! - [`messages`] - Message and content block types of the CLI stream
//! - [`options`] - Options for one CLI invocation

pub mod identifiers;
pub mod messages;
pub mod options;
pub mod permissions;

pub use identifiers::{RequestId, SessionId, ToolName};
pub use permissions::PermissionMode;
