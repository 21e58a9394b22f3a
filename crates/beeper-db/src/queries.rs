use crate::models::{AccountRecord, Cursor, MessageRow, ThreadRow, UserRecord};
use crate::schema::{EXPECTED_TABLES, LIVE_MESSAGE_FILTER, MESSAGE_SELECT, MESSAGES_TABLE, THREADS_TABLE};
use crate::Database;
use anyhow::Result;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension, Row, params};

impl Database {
    // -- Health --

    /// Expected tables that are absent from the file.
    pub fn missing_tables(&self) -> Result<Vec<&'static str>> {
        self.with_conn(|conn| {
            let mut missing = Vec::new();
            for table in EXPECTED_TABLES {
                if !table_exists(conn, table)? {
                    missing.push(*table);
                }
            }
            Ok(missing)
        })
    }

    pub fn count_messages(&self) -> Result<i64> {
        self.with_conn(|conn| {
            let count = conn.query_row(
                &format!("SELECT COUNT(*) FROM {MESSAGES_TABLE}"),
                [],
                |row| row.get(0),
            )?;
            Ok(count)
        })
    }

    // -- Messages --

    /// Live messages strictly after `cursor`, oldest first, at most `limit`.
    pub fn messages_after(&self, cursor: Cursor, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_messages_after(conn, cursor, limit))
    }

    /// The `limit` most recent live messages of a room, newest first.
    pub fn recent_room_messages(&self, room_id: &str, limit: u32) -> Result<Vec<MessageRow>> {
        self.with_conn(|conn| query_recent_room_messages(conn, room_id, limit))
    }

    /// Position of the newest live message, if the table has any.
    pub fn latest_position(&self) -> Result<Option<Cursor>> {
        self.with_conn(|conn| {
            let position = conn
                .query_row(
                    "SELECT m.timestamp, m.rowid FROM mx_room_messages m
                     WHERE typeof(m.timestamp) = 'integer'
                     ORDER BY m.timestamp DESC, m.rowid DESC
                     LIMIT 1",
                    [],
                    |row| {
                        Ok(Cursor {
                            timestamp: row.get(0)?,
                            row_id: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            Ok(position)
        })
    }

    // -- Threads --

    /// Room metadata, or `None` when the room or the `threads` table is absent.
    pub fn get_thread(&self, thread_id: &str) -> Result<Option<ThreadRow>> {
        self.with_conn(|conn| {
            if !table_exists(conn, THREADS_TABLE)? {
                return Ok(None);
            }

            let row = conn
                .query_row(
                    "SELECT threadID, thread, timestamp FROM threads WHERE threadID = ?1 LIMIT 1",
                    [thread_id],
                    |row| {
                        Ok(ThreadRow {
                            thread_id: row.get(0)?,
                            thread_json: text_at(row, 1)?,
                            timestamp: row.get::<_, Option<i64>>(2).unwrap_or(None),
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }
}

fn table_exists(conn: &Connection, table: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn query_messages_after(conn: &Connection, cursor: Cursor, limit: u32) -> Result<Vec<MessageRow>> {
    let sql = format!(
        "{MESSAGE_SELECT}
         WHERE {LIVE_MESSAGE_FILTER}
           AND (m.timestamp > ?1 OR (m.timestamp = ?1 AND m.rowid > ?2))
         ORDER BY m.timestamp ASC, m.rowid ASC
         LIMIT ?3"
    );
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt
        .query_map(params![cursor.timestamp, cursor.row_id, limit], map_message_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

fn query_recent_room_messages(conn: &Connection, room_id: &str, limit: u32) -> Result<Vec<MessageRow>> {
    let sql = format!(
        "{MESSAGE_SELECT}
         WHERE {LIVE_MESSAGE_FILTER}
           AND m.roomID = ?1
         ORDER BY m.timestamp DESC, m.rowid DESC
         LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;

    let rows = stmt
        .query_map(params![room_id, limit], map_message_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// Map a row selected with `MESSAGE_SELECT`.
///
/// Beeper's columns are loosely typed, so everything except rowid and
/// timestamp is read leniently rather than failing the whole batch.
fn map_message_row(row: &Row<'_>) -> rusqlite::Result<MessageRow> {
    let sender = match text_at(row, 12)? {
        Some(user_id) => Some(UserRecord {
            user_id,
            account_id: text_at(row, 13)?,
            profile_json: text_at(row, 14)?,
        }),
        None => None,
    };
    let account = match text_at(row, 15)? {
        Some(account_id) => Some(AccountRecord {
            account_id,
            platform_name: text_at(row, 16)?,
        }),
        None => None,
    };

    Ok(MessageRow {
        row_id: row.get(0)?,
        room_id: text_at(row, 1)?.unwrap_or_default(),
        sender_id: text_at(row, 2)?.unwrap_or_default(),
        message_json: text_at(row, 3)?,
        timestamp: row.get(4)?,
        event_id: text_at(row, 5)?.unwrap_or_default(),
        msg_type: text_at(row, 6)?,
        is_sent_by_me: flag_at(row, 7)?,
        is_encrypted: flag_at(row, 8)?,
        in_reply_to_id: text_at(row, 9)?.filter(|id| !id.trim().is_empty()),
        text_content: text_at(row, 10)?,
        formatted_content: text_at(row, 11)?,
        sender,
        account,
    })
}

fn text_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<String>> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => None,
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Some(String::from_utf8_lossy(bytes).into_owned())
        }
        ValueRef::Integer(i) => Some(i.to_string()),
        ValueRef::Real(f) => Some(f.to_string()),
    })
}

fn flag_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<bool> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Null => false,
        ValueRef::Integer(i) => i != 0,
        ValueRef::Real(f) => f != 0.0,
        ValueRef::Text(t) | ValueRef::Blob(t) => {
            matches!(t, b"1" | b"true" | b"TRUE" | b"True")
        }
    })
}
