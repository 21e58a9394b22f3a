use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use tracing::warn;

use crate::error::{ListenerError, Result};

/// Where Beeper Desktop keeps its index on Linux, relative to `$HOME`.
const DEFAULT_DB_RELATIVE: &str = ".config/BeeperTexts/index.db";

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_BATCH_SIZE: u32 = 50;
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the cursor starts when polling begins.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CursorStart {
    /// Skip history: only rows newer than the newest row at `start()`.
    #[default]
    Latest,
    /// Replay every message in the database, oldest first.
    Beginning,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListenerConfig {
    pub database_path: PathBuf,
    pub poll_interval: Duration,
    /// Upper bound on rows read per cycle. A larger backlog drains over
    /// consecutive ticks.
    pub batch_size: u32,
    pub cursor_start: CursorStart,
    /// How long a query waits on a lock held by the Beeper client.
    pub busy_timeout: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self::new(default_database_path())
    }
}

impl ListenerConfig {
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
            cursor_start: CursorStart::default(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// Build from `BEEPER_*` environment variables, falling back to defaults.
    ///
    /// - `BEEPER_DATABASE_PATH` (`~` is expanded)
    /// - `BEEPER_POLL_INTERVAL_MS`
    /// - `BEEPER_BATCH_SIZE`
    /// - `BEEPER_BACKFILL` (`1`/`true`/`yes` replays history)
    /// - `BEEPER_BUSY_TIMEOUT_MS`
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`ListenerConfig::from_env`] with an injectable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(path) = lookup("BEEPER_DATABASE_PATH").filter(|p| !p.trim().is_empty()) {
            config.database_path = expand_home(path.trim());
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "BEEPER_POLL_INTERVAL_MS") {
            config.poll_interval = Duration::from_millis(ms);
        }
        if let Some(size) = parse_var::<u32, _>(&lookup, "BEEPER_BATCH_SIZE") {
            config.batch_size = size;
        }
        if let Some(ms) = parse_var::<u64, _>(&lookup, "BEEPER_BUSY_TIMEOUT_MS") {
            config.busy_timeout = Duration::from_millis(ms);
        }
        if let Some(flag) = lookup("BEEPER_BACKFILL") {
            config.cursor_start = match flag.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => CursorStart::Beginning,
                _ => CursorStart::Latest,
            };
        }

        config
    }

    /// Static checks. Reachability of the file is checked at connection time.
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(ListenerError::InvalidConfig("database_path is empty".into()));
        }
        if self.batch_size == 0 {
            return Err(ListenerError::InvalidConfig("batch_size must be positive".into()));
        }
        if self.poll_interval.is_zero() {
            return Err(ListenerError::InvalidConfig("poll_interval must be positive".into()));
        }
        Ok(())
    }
}

pub fn default_database_path() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) => Path::new(&home).join(DEFAULT_DB_RELATIVE),
        None => PathBuf::from(DEFAULT_DB_RELATIVE),
    }
}

/// Expand a leading `~/` to `$HOME`.
pub fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => Path::new(&home).join(rest),
        _ => PathBuf::from(path),
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Option<T>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!("Ignoring {}={:?}: not a valid number", key, raw);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults() {
        let config = ListenerConfig::from_lookup(lookup(&[]));
        assert!(config.database_path.ends_with(".config/BeeperTexts/index.db"));
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.batch_size, 50);
        assert_eq!(config.cursor_start, CursorStart::Latest);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn env_overrides() {
        let config = ListenerConfig::from_lookup(lookup(&[
            ("BEEPER_DATABASE_PATH", "/tmp/beeper/index.db"),
            ("BEEPER_POLL_INTERVAL_MS", "250"),
            ("BEEPER_BATCH_SIZE", "10"),
            ("BEEPER_BACKFILL", "true"),
        ]));
        assert_eq!(config.database_path, PathBuf::from("/tmp/beeper/index.db"));
        assert_eq!(config.poll_interval, Duration::from_millis(250));
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.cursor_start, CursorStart::Beginning);
    }

    #[test]
    fn bad_numbers_fall_back() {
        let config = ListenerConfig::from_lookup(lookup(&[
            ("BEEPER_POLL_INTERVAL_MS", "soon"),
            ("BEEPER_BATCH_SIZE", "-3"),
        ]));
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.batch_size, 50);
    }

    #[test]
    fn validate_rejects_degenerate_values() {
        let mut config = ListenerConfig::new("");
        assert!(matches!(config.validate(), Err(ListenerError::InvalidConfig(_))));

        config.database_path = "/tmp/index.db".into();
        config.batch_size = 0;
        assert!(config.validate().is_err());

        config.batch_size = 1;
        config.poll_interval = Duration::ZERO;
        assert!(config.validate().is_err());
    }
}
