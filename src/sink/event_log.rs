use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use async_trait::async_trait;
use serde::Serialize;
use tokio::{
    fs::{self, OpenOptions},
    io::AsyncWriteExt,
    sync::{
        Mutex,
        mpsc::{self, error::TrySendError},
    },
    time,
};
use tracing::{info, warn};

use crate::{controller::SignalState, decision::VehicleEvent, util::AbortOnDropHandle};

use super::{error::SinkResult, guarded};

/// Record handed to an [`EventLog`].
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LogRecord {
    /// One per processed vehicle report.
    VehicleDetection(VehicleEvent),
    /// One per signal controller state change.
    ControllerStateChange(SignalState),
}

/// Event/session log. Failures never affect the caller.
#[async_trait]
pub trait EventLog: Send + Sync {
    async fn record(&self, record: &LogRecord) -> SinkResult<()>;
}

#[derive(Debug, Default)]
pub struct TracingEventLog;

#[async_trait]
impl EventLog for TracingEventLog {
    async fn record(&self, record: &LogRecord) -> SinkResult<()> {
        match record {
            LogRecord::VehicleDetection(event) => info!(
                vehicle = event.vehicle.as_deref().unwrap_or("-"),
                status = %event.status,
                distance_m = event.distance_m,
                "vehicle detection"
            ),
            LogRecord::ControllerStateChange(state) => {
                info!(state = %state, "controller state change")
            }
        }
        Ok(())
    }
}

/// Appends records as JSON lines to a file.
#[derive(Debug)]
pub struct JsonlEventLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlEventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl EventLog for JsonlEventLog {
    async fn record(&self, record: &LogRecord) -> SinkResult<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).await?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }
}

/// Records the [`EventDispatcher`] queues before dropping new ones.
pub const DEFAULT_EVENT_QUEUE_CAPACITY: usize = 1024;

/// Fire-and-forget front of an [`EventLog`].
///
/// Records are queued and written in order by a background worker, so callers never wait on
/// the log and a slow or failing log cannot stall them. While the queue is full, new records
/// are dropped with a warning.
#[derive(Debug)]
pub struct EventDispatcher {
    tx: mpsc::Sender<LogRecord>,
    _handle: AbortOnDropHandle<()>,
}

impl EventDispatcher {
    pub fn spawn(log: Arc<dyn EventLog>, write_timeout: time::Duration) -> Arc<Self> {
        Self::spawn_with_capacity(log, write_timeout, DEFAULT_EVENT_QUEUE_CAPACITY)
    }

    pub fn spawn_with_capacity(
        log: Arc<dyn EventLog>,
        write_timeout: time::Duration,
        capacity: usize,
    ) -> Arc<Self> {
        let (tx, mut rx) = mpsc::channel::<LogRecord>(capacity.max(1));

        let handle = tokio::spawn(async move {
            while let Some(record) = rx.recv().await {
                if let Err(e) = guarded(write_timeout, log.record(&record)).await {
                    warn!(error = %e, "event log write failed");
                }
            }
        })
        .into();

        Arc::new(Self {
            tx,
            _handle: handle,
        })
    }

    pub fn dispatch(&self, record: LogRecord) {
        match self.tx.try_send(record) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("event log queue full, record dropped"),
            Err(TrySendError::Closed(_)) => warn!("event log worker stopped, record dropped"),
        }
    }
}
