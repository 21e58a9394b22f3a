use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced to the host application.
///
/// Failures inside a running poll cycle never reach the host; they are logged
/// and retried on the next tick.
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("database unavailable at {}: {reason}", .path.display())]
    Unreachable { path: PathBuf, reason: String },

    #[error("listener is not running")]
    NotRunning,

    #[error("listener is running; stop it first")]
    AlreadyRunning,

    #[error("database error: {0:#}")]
    Database(anyhow::Error),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl From<anyhow::Error> for ListenerError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err)
    }
}

pub type Result<T> = std::result::Result<T, ListenerError>;
