/// Table names in Beeper's `index.db` that the listener reads.
pub const MESSAGES_TABLE: &str = "mx_room_messages";
pub const USERS_TABLE: &str = "users";
pub const ACCOUNTS_TABLE: &str = "accounts";
pub const THREADS_TABLE: &str = "threads";

/// Tables the poll query joins. `threads` is optional.
pub const EXPECTED_TABLES: &[&str] = &[MESSAGES_TABLE, USERS_TABLE, ACCOUNTS_TABLE];

/// Columns selected for every message query, in the order
/// `queries::map_message_row` reads them.
///
/// `users` may hold one row per account for the same contact, so the joins
/// pick a single row instead of fanning a message out.
pub(crate) const MESSAGE_SELECT: &str = "
    SELECT m.rowid, m.roomID, m.senderContactID, m.message, m.timestamp, m.eventID,
           m.type, m.isSentByMe, m.isEncrypted, m.inReplyToID,
           m.text_content, m.text_formattedContent,
           u.userID, u.accountID, u.user,
           a.accountID, a.platformName
    FROM mx_room_messages m
    LEFT JOIN users u ON u.rowid = (
        SELECT rowid FROM users WHERE userID = m.senderContactID LIMIT 1
    )
    LEFT JOIN accounts a ON a.rowid = (
        SELECT rowid FROM accounts WHERE accountID = u.accountID LIMIT 1
    )";

/// Rows every message query skips: deleted messages and rows without a
/// usable millisecond timestamp.
pub(crate) const LIVE_MESSAGE_FILTER: &str =
    "COALESCE(m.isDeleted, 0) = 0 AND typeof(m.timestamp) = 'integer'";
