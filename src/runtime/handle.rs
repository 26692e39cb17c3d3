use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use thiserror::Error;
use tokio::sync::{Mutex, broadcast, mpsc, oneshot};
use tracing::{debug, info};

use crate::{
    checkin::{CheckInDraft, CheckInPatch, CheckInRecord},
    core::{
        durable::{DurableError, DurableStore},
        store::StoreError,
    },
    persist::PersistError,
    types::RecordId,
};

use super::events::CheckInEvent;

/// Failure reported by a [`CheckInLogHandle`] call.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// Rejected by the store.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The write could not be persisted and was rolled back.
    #[error("persistence failed: {0}")]
    Persist(#[from] PersistError),
    /// The runtime loop has stopped.
    #[error("check-in runtime is not running")]
    ChannelClosed,
    /// A blocking store task panicked or was cancelled.
    #[error("blocking task failed: {0}")]
    Join(String),
    /// Shutdown found the store still referenced by an in-flight task.
    #[error("check-in store still in use at shutdown")]
    StoreBusy,
}

impl From<DurableError> for RuntimeError {
    fn from(value: DurableError) -> Self {
        match value {
            DurableError::Store(err) => Self::Store(err),
            DurableError::Persist(err) => Self::Persist(err),
        }
    }
}

impl RuntimeError {
    /// True for [`StoreError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, RuntimeError::Store(StoreError::NotFound(_)))
    }
}

/// Channel sizing for [`spawn_checkin_log`].
#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Commands that may queue before callers wait.
    #[serde(default = "default_command_queue_bound")]
    pub command_queue_bound: usize,
    /// Events buffered per subscriber before it lags.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            command_queue_bound: default_command_queue_bound(),
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_command_queue_bound() -> usize {
    256
}

fn default_event_capacity() -> usize {
    1024
}

/// Cloneable handle to the runtime loop started by [`spawn_checkin_log`].
pub struct CheckInLogHandle {
    cmd_tx: mpsc::Sender<Command>,
    events_tx: broadcast::Sender<CheckInEvent>,
}

impl Clone for CheckInLogHandle {
    fn clone(&self) -> Self {
        Self {
            cmd_tx: self.cmd_tx.clone(),
            events_tx: self.events_tx.clone(),
        }
    }
}

enum Command {
    Write(WriteCommand),
    Read(ReadCommand),
    Shutdown {
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
}

enum WriteCommand {
    Create {
        draft: CheckInDraft,
        resp: oneshot::Sender<Result<CheckInRecord, RuntimeError>>,
    },
    Update {
        id: RecordId,
        patch: CheckInPatch,
        resp: oneshot::Sender<Result<CheckInRecord, RuntimeError>>,
    },
    Delete {
        id: RecordId,
        resp: oneshot::Sender<Result<(), RuntimeError>>,
    },
}

enum ReadCommand {
    Get {
        id: RecordId,
        resp: oneshot::Sender<Result<CheckInRecord, RuntimeError>>,
    },
    List {
        resp: oneshot::Sender<Vec<CheckInRecord>>,
    },
    Recent {
        n: usize,
        resp: oneshot::Sender<Vec<CheckInRecord>>,
    },
    Between {
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        resp: oneshot::Sender<Vec<CheckInRecord>>,
    },
    Len {
        resp: oneshot::Sender<usize>,
    },
}

/// Starts the single-writer loop that owns `store`.
///
/// Every write is persisted on a blocking thread and awaited before the
/// caller is answered, so a successful reply means the record is durable.
pub fn spawn_checkin_log(store: DurableStore, config: RuntimeConfig) -> CheckInLogHandle {
    let (cmd_tx, mut cmd_rx) = mpsc::channel::<Command>(config.command_queue_bound.max(1));
    let (events_tx, _) = broadcast::channel::<CheckInEvent>(config.event_capacity.max(1));

    let events_tx_loop = events_tx.clone();

    tokio::spawn(async move {
        let durable = Arc::new(Mutex::new(store));
        info!("check-in runtime started");

        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                Command::Write(write) => handle_write(write, &durable, &events_tx_loop).await,
                Command::Read(read) => handle_read(read, &durable).await,
                Command::Shutdown { resp } => {
                    let _ = resp.send(close_store(durable).await);
                    info!("check-in runtime stopped");
                    return;
                }
            }
        }

        // Every handle was dropped without an explicit shutdown.
        if let Err(err) = close_store(durable).await {
            tracing::warn!(error = %err, "closing check-in store after handles dropped");
        }
    });

    CheckInLogHandle { cmd_tx, events_tx }
}

impl CheckInLogHandle {
    /// Receives an event after each successful write.
    pub fn subscribe(&self) -> broadcast::Receiver<CheckInEvent> {
        self.events_tx.subscribe()
    }

    /// Creates a record; returns once it is durable.
    pub async fn create(&self, draft: CheckInDraft) -> Result<CheckInRecord, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Write(WriteCommand::Create { draft, resp: tx })).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Applies `patch` to an existing record.
    pub async fn update(&self, id: RecordId, patch: CheckInPatch) -> Result<CheckInRecord, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Write(WriteCommand::Update { id, patch, resp: tx })).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Deletes a record. A second delete fails with `NotFound`.
    pub async fn delete(&self, id: RecordId) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Write(WriteCommand::Delete { id, resp: tx })).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// Fetches one live record.
    pub async fn get(&self, id: RecordId) -> Result<CheckInRecord, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Read(ReadCommand::Get { id, resp: tx })).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    /// All records, newest first.
    pub async fn list(&self) -> Result<Vec<CheckInRecord>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Read(ReadCommand::List { resp: tx })).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// The `n` newest records.
    pub async fn recent(&self, n: usize) -> Result<Vec<CheckInRecord>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Read(ReadCommand::Recent { n, resp: tx })).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Records with `from <= timestamp < to`, newest first.
    pub async fn between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Result<Vec<CheckInRecord>, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Read(ReadCommand::Between { from, to, resp: tx })).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Number of live records.
    pub async fn len(&self) -> Result<usize, RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Read(ReadCommand::Len { resp: tx })).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)
    }

    /// Flushes and closes the store. Later calls fail with `ChannelClosed`.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let (tx, rx) = oneshot::channel();
        self.send(Command::Shutdown { resp: tx }).await?;
        rx.await.map_err(|_| RuntimeError::ChannelClosed)?
    }

    async fn send(&self, cmd: Command) -> Result<(), RuntimeError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| RuntimeError::ChannelClosed)
    }
}

async fn handle_write(
    cmd: WriteCommand,
    durable: &Arc<Mutex<DurableStore>>,
    events_tx: &broadcast::Sender<CheckInEvent>,
) {
    match cmd {
        WriteCommand::Create { draft, resp } => {
            let res = run_blocking(durable, move |ds| ds.create(draft)).await;
            if let Ok(rec) = &res {
                let _ = events_tx.send(CheckInEvent::Created { id: rec.id });
            }
            let _ = resp.send(res);
        }
        WriteCommand::Update { id, patch, resp } => {
            let res = run_blocking(durable, move |ds| ds.update(id, patch)).await;
            if res.is_ok() {
                let _ = events_tx.send(CheckInEvent::Updated { id });
            }
            let _ = resp.send(res);
        }
        WriteCommand::Delete { id, resp } => {
            let res = run_blocking(durable, move |ds| ds.delete(id).map(|_| ())).await;
            if res.is_ok() {
                let _ = events_tx.send(CheckInEvent::Deleted { id });
            }
            let _ = resp.send(res);
        }
    }
}

async fn handle_read(cmd: ReadCommand, durable: &Arc<Mutex<DurableStore>>) {
    let store = durable.lock().await;
    match cmd {
        ReadCommand::Get { id, resp } => {
            let _ = resp.send(store.get(id).map_err(RuntimeError::from));
        }
        ReadCommand::List { resp } => {
            let _ = resp.send(store.list());
        }
        ReadCommand::Recent { n, resp } => {
            let _ = resp.send(store.recent(n));
        }
        ReadCommand::Between { from, to, resp } => {
            let _ = resp.send(store.between(from, to));
        }
        ReadCommand::Len { resp } => {
            let _ = resp.send(store.len());
        }
    }
}

async fn run_blocking<T, F>(durable: &Arc<Mutex<DurableStore>>, f: F) -> Result<T, RuntimeError>
where
    T: Send + 'static,
    F: FnOnce(&mut DurableStore) -> Result<T, DurableError> + Send + 'static,
{
    let durable = Arc::clone(durable);
    tokio::task::spawn_blocking(move || {
        let mut store = durable.blocking_lock();
        f(&mut store)
    })
    .await
    .map_err(|e| RuntimeError::Join(e.to_string()))?
    .map_err(RuntimeError::from)
}

async fn close_store(durable: Arc<Mutex<DurableStore>>) -> Result<(), RuntimeError> {
    let store = Arc::try_unwrap(durable)
        .map_err(|_| RuntimeError::StoreBusy)?
        .into_inner();
    debug!(records = store.len(), "closing check-in store");
    tokio::task::spawn_blocking(move || store.close())
        .await
        .map_err(|e| RuntimeError::Join(e.to_string()))?
        .map_err(RuntimeError::from)
}
