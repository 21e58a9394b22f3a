//! Beeper listener: polls Beeper's local `index.db` for new messages and
//! hands each one, normalized, to subscribers.
//!
//! - `config`: listener options, read from `BEEPER_*` environment variables
//! - `normalize`: raw row -> [`NormalizedMessage`] enrichment
//! - `poller`: cursor-driven poll cycle
//! - `dispatcher`: callback and channel fan-out
//! - `source`: lifecycle and the [`RealTimeSource`] contract

pub mod config;
pub mod descriptor;
pub mod dispatcher;
pub mod error;
pub mod normalize;
pub mod poller;
pub mod source;
pub mod summary;

pub use beeper_types::{MessageContent, MessageType, Network, NormalizedMessage, RoomInfo};
pub use config::{CursorStart, ListenerConfig};
pub use dispatcher::Dispatcher;
pub use error::{ListenerError, Result};
pub use source::{BeeperSource, LifecycleState, RealTimeSource};
