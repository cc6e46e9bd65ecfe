//! One warm session: a single query invocation bound to one message channel
//!
//! - `event` - classification of CLI messages into [`StructuredEvent`]s
//! - `activity` - [`ActivityLog`], the bounded diagnostics buffer
//! - `driver` - [`SessionDriver`], which owns the query's output stream

mod activity;
mod driver;
mod event;

pub use activity::{ActivityLog, DEFAULT_ACTIVITY_CAPACITY};
pub use driver::SessionDriver;
pub use event::{Activity, ActivityKind, StructuredEvent, TurnResult, classify};
