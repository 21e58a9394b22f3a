use chrono::{Local, TimeZone};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::{MessageContent, MessageType};
use crate::network::Network;

/// A new message as delivered to subscribers.
///
/// Field names and JSON types are the compatibility contract with consumers;
/// do not rename them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedMessage {
    pub room_id: String,
    /// Beeper rooms are threads, so this always equals `room_id`.
    pub thread_id: String,
    pub thread_name: String,
    pub sender_id: String,
    pub sender_name: String,
    pub network: Network,
    pub text: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    pub event_id: String,
    pub message_type: MessageType,
    pub is_sent_by_me: bool,
    pub is_encrypted: bool,
    pub is_reply: bool,
    pub reply_to_id: Option<String>,
    pub human_time: String,
    pub raw_message_data: Value,
    pub raw_sender_data: Value,
}

impl NormalizedMessage {
    /// Typed view of `raw_message_data`.
    pub fn content(&self) -> MessageContent {
        MessageContent::from_raw(&self.raw_message_data, Some(self.message_type.as_str()))
    }
}

/// Room metadata from the `threads` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub room_id: String,
    pub thread_data: Value,
    pub last_activity: Option<i64>,
}

/// Local wall-clock rendering of a millisecond timestamp.
pub fn format_human_time(timestamp_ms: i64) -> String {
    format_human_time_in(timestamp_ms, &Local)
}

/// Same as [`format_human_time`] in an explicit time zone. Timestamps out of
/// chrono's range come back as the raw number.
pub fn format_human_time_in<Tz: TimeZone>(timestamp_ms: i64, tz: &Tz) -> String
where
    Tz::Offset: std::fmt::Display,
{
    match tz.timestamp_millis_opt(timestamp_ms).single() {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => timestamp_ms.to_string(),
    }
}
