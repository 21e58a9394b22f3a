use std::future::Future;
use std::time::Duration;

use beeper_db::{Cursor, Database};
use beeper_types::{NormalizedMessage, RoomInfo};
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, error, info, warn};

use crate::config::ListenerConfig;
use crate::descriptor::{self, ConnectionField};
use crate::dispatcher::Dispatcher;
use crate::error::{ListenerError, Result};
use crate::normalize::normalize;
use crate::poller::Poller;
use crate::summary;

/// The contract a host application drives a real-time data source through.
pub trait RealTimeSource {
    /// Replace the configuration. Not allowed while running.
    fn configure(&mut self, config: ListenerConfig) -> Result<()>;

    /// Whether the configured database can be opened and has the expected
    /// tables. Never fails; problems are logged.
    fn test_connection(&self) -> bool;

    /// Begin polling. A no-op when already running.
    fn start(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Stop polling. Returns once an in-flight cycle has finished.
    fn stop(&mut self) -> impl Future<Output = Result<()>> + Send;

    /// Register a callback for every new message.
    fn subscribe<F>(&self, callback: F)
    where
        F: Fn(NormalizedMessage) + Send + Sync + 'static;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Idle,
    Running,
    Stopped,
}

struct Worker {
    cancel: CancellationToken,
    /// Cancels the poll task if the source is dropped while running.
    _guard: DropGuard,
    /// Resolves to the cursor the task stopped at.
    handle: JoinHandle<Cursor>,
}

/// Polls Beeper's `index.db` and dispatches new messages.
pub struct BeeperSource {
    config: ListenerConfig,
    dispatcher: Dispatcher,
    state: LifecycleState,
    worker: Option<Worker>,
    /// Where the last poll task stopped; a restart resumes from here.
    resume_from: Option<Cursor>,
}

impl Default for BeeperSource {
    fn default() -> Self {
        Self::new(ListenerConfig::default())
    }
}

impl BeeperSource {
    pub fn new(config: ListenerConfig) -> Self {
        Self {
            config,
            dispatcher: Dispatcher::new(),
            state: LifecycleState::Idle,
            worker: None,
            resume_from: None,
        }
    }

    pub fn name(&self) -> &'static str {
        descriptor::SOURCE_NAME
    }

    pub fn description(&self) -> &'static str {
        descriptor::SOURCE_DESCRIPTION
    }

    pub fn connection_fields(&self) -> Vec<ConnectionField> {
        descriptor::connection_fields()
    }

    pub fn config(&self) -> &ListenerConfig {
        &self.config
    }

    /// A poll task that ended on its own reports as `Stopped`.
    pub fn state(&self) -> LifecycleState {
        match (self.state, &self.worker) {
            (LifecycleState::Running, Some(worker)) if worker.handle.is_finished() => {
                LifecycleState::Stopped
            }
            (state, _) => state,
        }
    }

    /// Cancel the poll task, wait for it, and keep its cursor for a restart.
    async fn join_worker(&mut self) -> Result<()> {
        let Some(worker) = self.worker.take() else {
            return Ok(());
        };
        worker.cancel.cancel();
        let cursor = worker.handle.await?;
        self.resume_from = Some(cursor);
        Ok(())
    }

    /// Receive new messages through a broadcast channel instead of a callback.
    pub fn subscribe_channel(&self) -> broadcast::Receiver<NormalizedMessage> {
        self.dispatcher.subscribe_channel()
    }

    /// The `limit` most recent messages of a room, oldest first.
    ///
    /// Independent of polling: works in any state and never moves the cursor.
    /// Rows without text are left out, so fewer than `limit` may come back.
    pub fn get_thread_messages(&self, thread_id: &str, limit: u32) -> Result<Vec<NormalizedMessage>> {
        let db = open_checked(&self.config)?;
        let mut rows = db.recent_room_messages(thread_id, limit)?;
        rows.reverse();
        Ok(rows.into_iter().filter_map(normalize).collect())
    }

    /// Metadata of a room from the `threads` table.
    pub fn get_room_info(&self, room_id: &str) -> Result<Option<RoomInfo>> {
        let db = open_checked(&self.config)?;
        let Some(thread) = db.get_thread(room_id)? else {
            return Ok(None);
        };

        let thread_data = thread
            .thread_json
            .as_deref()
            .and_then(|json| match serde_json::from_str(json) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(room_id, "Malformed thread JSON: {}", e);
                    None
                }
            })
            .unwrap_or_else(|| Value::Object(Map::new()));

        Ok(Some(RoomInfo {
            room_id: thread.thread_id,
            thread_data,
            last_activity: thread.timestamp,
        }))
    }
}

impl RealTimeSource for BeeperSource {
    fn configure(&mut self, config: ListenerConfig) -> Result<()> {
        if self.state == LifecycleState::Running {
            return Err(ListenerError::AlreadyRunning);
        }
        config.validate()?;
        if config.database_path != self.config.database_path {
            self.resume_from = None;
        }
        self.config = config;
        Ok(())
    }

    fn test_connection(&self) -> bool {
        match open_checked(&self.config).and_then(|db| Ok(db.count_messages()?)) {
            Ok(count) => {
                info!(
                    "Connection OK: {} ({} messages)",
                    self.config.database_path.display(),
                    count
                );
                true
            }
            Err(e) => {
                warn!("Connection test failed: {}", e);
                false
            }
        }
    }

    async fn start(&mut self) -> Result<()> {
        if self.state() == LifecycleState::Running {
            debug!("start() while running; ignoring");
            return Ok(());
        }
        // A poll task that died on its own still holds the latest cursor.
        if let Err(e) = self.join_worker().await {
            warn!("Previous poll task failed: {}", e);
        }

        let config = self.config.clone();
        let resume = self.resume_from;
        let poller = tokio::task::spawn_blocking(move || -> Result<Poller> {
            open_checked(&config)?;
            Ok(Poller::open(&config, resume)?)
        })
        .await??;

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_poll_loop(
            poller,
            self.dispatcher.clone(),
            self.config.poll_interval,
            cancel.clone(),
        ));

        self.worker = Some(Worker {
            _guard: cancel.clone().drop_guard(),
            cancel,
            handle,
        });
        self.state = LifecycleState::Running;
        info!(
            "Monitoring {} every {:?}",
            self.config.database_path.display(),
            self.config.poll_interval
        );
        Ok(())
    }

    async fn stop(&mut self) -> Result<()> {
        if self.state() != LifecycleState::Running {
            return Err(ListenerError::NotRunning);
        }

        self.state = LifecycleState::Stopped;
        self.join_worker().await?;
        info!("Monitoring stopped");
        Ok(())
    }

    fn subscribe<F>(&self, callback: F)
    where
        F: Fn(NormalizedMessage) + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(callback);
    }
}

/// Open the configured database and check it has the tables polling needs.
fn open_checked(config: &ListenerConfig) -> Result<Database> {
    config.validate()?;

    let unreachable = |reason: String| ListenerError::Unreachable {
        path: config.database_path.clone(),
        reason,
    };

    let db = Database::open(&config.database_path, config.busy_timeout)
        .map_err(|e| unreachable(format!("{:#}", e)))?;
    let missing = db
        .missing_tables()
        .map_err(|e| unreachable(format!("{:#}", e)))?;
    if !missing.is_empty() {
        return Err(unreachable(format!("missing tables: {}", missing.join(", "))));
    }
    Ok(db)
}

/// Tick, poll, dispatch; until cancelled. Returns the final cursor.
///
/// Cancellation is only observed between cycles, so a cycle that has started
/// always dispatches its whole batch.
async fn run_poll_loop(
    mut poller: Poller,
    dispatcher: Dispatcher,
    period: Duration,
    cancel: CancellationToken,
) -> Cursor {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }

        let last_cursor = poller.cursor();
        // SQLite reads block; keep them off the async workers.
        let joined = tokio::task::spawn_blocking(move || {
            let result = poller.poll_cycle();
            (poller, result)
        })
        .await;

        let result = match joined {
            Ok((returned, result)) => {
                poller = returned;
                result
            }
            Err(e) => {
                error!("Poll cycle task failed, stopping: {}", e);
                return last_cursor;
            }
        };

        match result {
            Ok(batch) => {
                for message in batch {
                    summary::log_message(&message);
                    dispatcher.dispatch(message);
                }
            }
            Err(e) => {
                warn!("Poll cycle failed, retrying next tick: {:#}", e);
            }
        }
    }

    let cursor = poller.cursor();
    debug!("Poll loop exited at ts={} row={}", cursor.timestamp, cursor.row_id);
    cursor
}
