//! Shared types for the Beeper listener: the normalized message contract
//! handed to subscribers, and the classifiers it is built from.

pub mod content;
pub mod message;
pub mod network;

pub use content::{MessageContent, MessageType};
pub use message::{NormalizedMessage, RoomInfo, format_human_time, format_human_time_in};
pub use network::Network;
