//! Writable databases shaped like Beeper's `index.db`.
//!
//! Only the columns the listener reads are created. Used by tests across the
//! workspace; production code never writes.

use anyhow::Result;
use rusqlite::{Connection, params};
use std::path::Path;

const SCHEMA: &str = "
    CREATE TABLE accounts (
        accountID       TEXT PRIMARY KEY,
        platformName    TEXT,
        user            TEXT
    );

    CREATE TABLE users (
        accountID       TEXT NOT NULL,
        userID          TEXT NOT NULL,
        user            TEXT,
        PRIMARY KEY (accountID, userID)
    );

    CREATE TABLE mx_room_messages (
        roomID                  TEXT NOT NULL,
        eventID                 TEXT NOT NULL,
        senderContactID         TEXT,
        type                    TEXT,
        message                 TEXT,
        timestamp               INTEGER,
        isSentByMe              INTEGER DEFAULT 0,
        isEncrypted             INTEGER DEFAULT 0,
        isDeleted               INTEGER DEFAULT 0,
        inReplyToID             TEXT,
        text_content            TEXT,
        text_formattedContent   TEXT
    );

    CREATE INDEX idx_messages_timestamp ON mx_room_messages(timestamp);
";

const THREADS_SCHEMA: &str = "
    CREATE TABLE threads (
        threadID    TEXT PRIMARY KEY,
        accountID   TEXT,
        thread      TEXT,
        timestamp   INTEGER
    );
";

/// A message to insert. Unset columns are NULL.
#[derive(Debug, Clone, Default)]
pub struct FixtureMessage {
    pub room_id: String,
    pub event_id: String,
    pub sender_id: Option<String>,
    pub msg_type: Option<String>,
    pub message_json: Option<String>,
    pub timestamp: i64,
    pub is_sent_by_me: bool,
    pub is_encrypted: bool,
    pub is_deleted: bool,
    pub in_reply_to_id: Option<String>,
    pub text_content: Option<String>,
    pub formatted_content: Option<String>,
}

impl FixtureMessage {
    /// A plain `TEXT` row carrying `text` both in the column and the JSON blob.
    pub fn text(event_id: &str, room_id: &str, sender_id: &str, text: &str, timestamp: i64) -> Self {
        Self {
            room_id: room_id.to_string(),
            event_id: event_id.to_string(),
            sender_id: Some(sender_id.to_string()),
            msg_type: Some("TEXT".to_string()),
            message_json: Some(serde_json::json!({ "text": text }).to_string()),
            timestamp,
            text_content: Some(text.to_string()),
            ..Default::default()
        }
    }
}

pub struct Fixture {
    conn: Connection,
}

impl Fixture {
    /// Create a fresh database at `path` with messages, users, accounts and threads.
    pub fn create(path: &Path) -> Result<Self> {
        let fixture = Self::create_without_threads(path)?;
        fixture.conn.execute_batch(THREADS_SCHEMA)?;
        Ok(fixture)
    }

    /// Same as [`Fixture::create`] but with no `threads` table.
    pub fn create_without_threads(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn add_account(&self, account_id: &str, platform_name: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO accounts (accountID, platformName) VALUES (?1, ?2)",
            params![account_id, platform_name],
        )?;
        Ok(())
    }

    pub fn add_user(&self, account_id: &str, user_id: &str, profile_json: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO users (accountID, userID, user) VALUES (?1, ?2, ?3)",
            params![account_id, user_id, profile_json],
        )?;
        Ok(())
    }

    pub fn add_thread(&self, thread_id: &str, thread_json: &str, timestamp: i64) -> Result<()> {
        self.conn.execute(
            "INSERT INTO threads (threadID, thread, timestamp) VALUES (?1, ?2, ?3)",
            params![thread_id, thread_json, timestamp],
        )?;
        Ok(())
    }

    /// Insert a message and return its rowid.
    pub fn insert_message(&self, msg: &FixtureMessage) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO mx_room_messages (
                roomID, eventID, senderContactID, type, message, timestamp,
                isSentByMe, isEncrypted, isDeleted, inReplyToID,
                text_content, text_formattedContent
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                msg.room_id,
                msg.event_id,
                msg.sender_id,
                msg.msg_type,
                msg.message_json,
                msg.timestamp,
                msg.is_sent_by_me,
                msg.is_encrypted,
                msg.is_deleted,
                msg.in_reply_to_id,
                msg.text_content,
                msg.formatted_content,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }
}
