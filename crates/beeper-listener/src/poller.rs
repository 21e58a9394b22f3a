use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use beeper_db::{Cursor, Database};
use beeper_types::NormalizedMessage;
use tracing::{debug, info};

use crate::config::{CursorStart, ListenerConfig};
use crate::normalize::normalize;

/// Owns the read cursor and runs one query-and-normalize cycle at a time.
///
/// The connection is kept across cycles and dropped after a failed one, so
/// the next cycle starts from a fresh open.
pub struct Poller {
    path: PathBuf,
    busy_timeout: Duration,
    batch_size: u32,
    db: Option<Database>,
    cursor: Cursor,
}

impl Poller {
    /// Open the database and place the cursor according to `cursor_start`.
    ///
    /// `resume` is where an earlier poller of the same source stopped. The
    /// cursor never starts behind it.
    pub fn open(config: &ListenerConfig, resume: Option<Cursor>) -> Result<Self> {
        let db = Database::open(&config.database_path, config.busy_timeout)?;
        let mut cursor = match config.cursor_start {
            CursorStart::Beginning => Cursor::START,
            CursorStart::Latest => db.latest_position()?.unwrap_or(Cursor::START),
        };
        if let Some(previous) = resume {
            cursor.advance(previous);
        }

        info!(
            "Poller ready on {} (cursor at ts={} row={})",
            config.database_path.display(),
            cursor.timestamp,
            cursor.row_id
        );
        Ok(Self {
            path: config.database_path.clone(),
            busy_timeout: config.busy_timeout,
            batch_size: config.batch_size,
            db: Some(db),
            cursor,
        })
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor
    }

    /// Read the rows after the cursor and normalize them.
    ///
    /// On a query error nothing is returned and the cursor stays put. On
    /// success the cursor covers every row read, including rows skipped for
    /// having no text. The batch is in ascending timestamp order.
    pub fn poll_cycle(&mut self) -> Result<Vec<NormalizedMessage>> {
        let cursor = self.cursor;
        let batch_size = self.batch_size;

        let result = self.database()?.messages_after(cursor, batch_size);
        let rows = match result {
            Ok(rows) => rows,
            Err(e) => {
                self.db = None;
                return Err(e);
            }
        };

        let mut batch = Vec::with_capacity(rows.len());
        for row in rows {
            let position = row.position();
            if let Some(message) = normalize(row) {
                batch.push(message);
            }
            self.cursor.advance(position);
        }

        if !batch.is_empty() {
            debug!("Poll cycle: {} new messages", batch.len());
        }
        batch.sort_by_key(|m| m.timestamp);
        Ok(batch)
    }

    fn database(&mut self) -> Result<&Database> {
        if self.db.is_none() {
            let db = Database::open(&self.path, self.busy_timeout)?;
            debug!("Reopened {}", self.path.display());
            self.db = Some(db);
        }
        // Populated above.
        self.db
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("database connection unavailable"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beeper_db::fixtures::{Fixture, FixtureMessage};
    use tempfile::TempDir;

    const ROOM: &str = "!abc:beeper.local";

    fn setup(start: CursorStart) -> (TempDir, Fixture, ListenerConfig) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.db");
        let fixture = Fixture::create(&path).unwrap();
        let mut config = ListenerConfig::new(&path);
        config.cursor_start = start;
        config.batch_size = 3;
        (dir, fixture, config)
    }

    fn text(fixture: &Fixture, event: &str, ts: i64) -> i64 {
        fixture
            .insert_message(&FixtureMessage::text(event, ROOM, "@bob", event, ts))
            .unwrap()
    }

    #[test]
    fn drains_backlog_across_cycles_exactly_once() {
        let (_dir, fixture, config) = setup(CursorStart::Beginning);
        let mut last_row = 0;
        for i in 0..7 {
            last_row = text(&fixture, &format!("$m{i}"), 1000 + i);
        }

        let mut poller = Poller::open(&config, None).unwrap();
        let mut seen = Vec::new();
        for _ in 0..4 {
            let batch = poller.poll_cycle().unwrap();
            assert!(batch.len() <= 3);
            seen.extend(batch.into_iter().map(|m| m.event_id));
        }

        let expected: Vec<String> = (0..7).map(|i| format!("$m{i}")).collect();
        assert_eq!(seen, expected);
        assert_eq!(poller.cursor(), Cursor { timestamp: 1006, row_id: last_row });
    }

    #[test]
    fn latest_start_skips_history() {
        let (_dir, fixture, config) = setup(CursorStart::Latest);
        text(&fixture, "$old", 10);

        let mut poller = Poller::open(&config, None).unwrap();
        assert!(poller.poll_cycle().unwrap().is_empty());

        text(&fixture, "$new", 20);
        let batch = poller.poll_cycle().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].event_id, "$new");
    }

    #[test]
    fn skipped_rows_still_advance_cursor() {
        let (_dir, fixture, config) = setup(CursorStart::Beginning);
        let empty = FixtureMessage {
            room_id: ROOM.into(),
            event_id: "$empty".into(),
            sender_id: Some("@bob".into()),
            timestamp: 5,
            ..Default::default()
        };
        let empty_row = fixture.insert_message(&empty).unwrap();

        let mut poller = Poller::open(&config, None).unwrap();
        assert!(poller.poll_cycle().unwrap().is_empty());
        assert_eq!(poller.cursor(), Cursor { timestamp: 5, row_id: empty_row });
    }

    #[test]
    fn resumed_poller_never_moves_behind_previous_cursor() {
        let (_dir, fixture, config) = setup(CursorStart::Beginning);
        text(&fixture, "$a", 10);

        let mut first = Poller::open(&config, None).unwrap();
        assert_eq!(first.poll_cycle().unwrap().len(), 1);

        let mut resumed = Poller::open(&config, Some(first.cursor())).unwrap();
        assert_eq!(resumed.cursor(), first.cursor());
        assert!(resumed.poll_cycle().unwrap().is_empty());

        text(&fixture, "$b", 20);
        let batch = resumed.poll_cycle().unwrap();
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].event_id, "$b");
    }

    #[test]
    fn latest_start_wins_over_older_resume_point() {
        let (_dir, fixture, config) = setup(CursorStart::Latest);
        text(&fixture, "$a", 10);
        let newest = text(&fixture, "$b", 20);

        let poller = Poller::open(&config, Some(Cursor { timestamp: 10, row_id: 1 })).unwrap();
        assert_eq!(poller.cursor(), Cursor { timestamp: 20, row_id: newest });
    }

    #[test]
    fn failed_cycle_keeps_cursor_and_recovers() {
        let (dir, fixture, config) = setup(CursorStart::Beginning);
        text(&fixture, "$a", 1);

        let mut poller = Poller::open(&config, None).unwrap();
        assert_eq!(poller.poll_cycle().unwrap().len(), 1);
        let before = poller.cursor();

        // Replace the file with garbage: the next cycle must fail without moving.
        drop(fixture);
        let path = dir.path().join("index.db");
        std::fs::write(&path, b"definitely not sqlite").unwrap();
        poller.db = None;
        assert!(poller.poll_cycle().is_err());
        assert_eq!(poller.cursor(), before);

        // A healthy file again: polling resumes.
        std::fs::remove_file(&path).unwrap();
        let fixture = Fixture::create(&path).unwrap();
        text(&fixture, "$a", 1);
        text(&fixture, "$b", 2);
        let batch = poller.poll_cycle().unwrap();
        let events: Vec<_> = batch.iter().map(|m| m.event_id.as_str()).collect();
        assert_eq!(events, vec!["$b"]);
    }
}
