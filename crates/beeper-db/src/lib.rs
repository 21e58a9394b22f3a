//! Read-only access to Beeper's local `index.db`.
//!
//! Beeper owns the file and writes to it continuously; this crate never
//! mutates it. Connections are opened with `SQLITE_OPEN_READ_ONLY`.

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;
pub mod models;
pub mod queries;
pub mod schema;

use anyhow::{Result, anyhow, bail};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;
use tracing::debug;

pub use models::{AccountRecord, Cursor, MessageRow, ThreadRow, UserRecord};

pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open `path` read-only. `busy_timeout` bounds how long a query waits
    /// on a lock held by the Beeper client.
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if !path.is_file() {
            bail!("Database not found: {}", path.display());
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        conn.busy_timeout(busy_timeout)?;

        debug!("Database opened read-only at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| anyhow!("DB lock poisoned: {}", e))?;
        f(&conn)
    }
}
