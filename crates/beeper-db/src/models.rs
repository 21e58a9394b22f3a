//! Database row types. These map directly to SQLite rows and stay
//! independent of the normalized types handed to subscribers.

/// One row of `mx_room_messages` with its sender and account lookups.
#[derive(Debug, Clone, PartialEq)]
pub struct MessageRow {
    pub row_id: i64,
    pub room_id: String,
    pub sender_id: String,
    /// The `message` JSON blob, unparsed.
    pub message_json: Option<String>,
    pub timestamp: i64,
    pub event_id: String,
    pub msg_type: Option<String>,
    pub is_sent_by_me: bool,
    pub is_encrypted: bool,
    pub in_reply_to_id: Option<String>,
    pub text_content: Option<String>,
    pub formatted_content: Option<String>,
    pub sender: Option<UserRecord>,
    pub account: Option<AccountRecord>,
}

impl MessageRow {
    pub fn position(&self) -> Cursor {
        Cursor {
            timestamp: self.timestamp,
            row_id: self.row_id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub user_id: String,
    pub account_id: Option<String>,
    /// The `user` JSON profile (`displayName`, `fullName`, ...), unparsed.
    pub profile_json: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AccountRecord {
    pub account_id: String,
    pub platform_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThreadRow {
    pub thread_id: String,
    pub thread_json: Option<String>,
    pub timestamp: Option<i64>,
}

/// Position of the last processed message.
///
/// Ordered by `(timestamp, row_id)` so rows sharing a millisecond are still
/// visited exactly once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cursor {
    pub timestamp: i64,
    pub row_id: i64,
}

impl Cursor {
    /// Before every row.
    pub const START: Cursor = Cursor {
        timestamp: i64::MIN,
        row_id: i64::MIN,
    };

    /// Move forward to `position`. Never moves backwards.
    pub fn advance(&mut self, position: Cursor) {
        if position > *self {
            *self = position;
        }
    }
}
