//! Store plus sink: every mutation is persisted before it is acknowledged.

use std::path::Path;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    checkin::{CheckInDraft, CheckInPatch, CheckInRecord},
    op::StoredOp,
    persist::{
        OpSink, PersistError,
        sqlite::{SqliteOpSink, Synchronous},
    },
    types::RecordId,
};

use super::store::{CheckInStore, StoreError};

/// Failure of a durable store operation.
#[derive(Debug, Error)]
pub enum DurableError {
    /// Rejected by the in-memory store; nothing was written.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The write failed and the in-memory change was rolled back.
    #[error("persistence failed: {0}")]
    Persist(#[from] PersistError),
}

/// Authoritative check-in collection backed by an optional [`OpSink`].
///
/// Without a sink the store is purely in-memory.
pub struct DurableStore {
    store: CheckInStore,
    sink: Option<Box<dyn OpSink>>,
}

impl DurableStore {
    /// Wraps an existing store and sink.
    pub fn new(store: CheckInStore, sink: Option<Box<dyn OpSink>>) -> Self {
        Self { store, sink }
    }

    /// Volatile store, used in tests and previews.
    pub fn in_memory() -> Self {
        Self::new(CheckInStore::new(), None)
    }

    /// Opens the SQLite database at `path` and loads every persisted record.
    pub fn open(path: impl AsRef<Path>, synchronous: Synchronous) -> Result<Self, PersistError> {
        let sink = SqliteOpSink::open_with(path, synchronous)?;
        let store = sink.load_store()?;
        info!(records = store.len(), "check-in store ready");
        Ok(Self::new(store, Some(Box::new(sink))))
    }

    /// Flushes the sink and releases it.
    pub fn close(mut self) -> Result<(), PersistError> {
        if let Some(sink) = self.sink.as_mut() {
            sink.flush()?;
        }
        info!("check-in store closed");
        Ok(())
    }

    /// Creates a record and persists it before returning.
    pub fn create(&mut self, draft: CheckInDraft) -> Result<CheckInRecord, DurableError> {
        let (record, stored) = self.store.create(draft)?;
        self.commit(stored)?;
        debug!(id = record.id, "check-in created");
        Ok(record)
    }

    /// Patches a record and persists the change.
    pub fn update(&mut self, id: RecordId, patch: CheckInPatch) -> Result<CheckInRecord, DurableError> {
        let (record, stored) = self.store.update(id, patch)?;
        self.commit(stored)?;
        debug!(id, "check-in updated");
        Ok(record)
    }

    /// Deletes a record and persists the removal.
    pub fn delete(&mut self, id: RecordId) -> Result<CheckInRecord, DurableError> {
        let (record, stored) = self.store.delete(id)?;
        self.commit(stored)?;
        debug!(id, "check-in deleted");
        Ok(record)
    }

    /// Fetches one live record.
    pub fn get(&self, id: RecordId) -> Result<CheckInRecord, StoreError> {
        self.store.get_cloned(id).ok_or(StoreError::NotFound(id))
    }

    /// All records, newest first.
    pub fn list(&self) -> Vec<CheckInRecord> {
        self.store.list_cloned()
    }

    /// The `n` newest records.
    pub fn recent(&self, n: usize) -> Vec<CheckInRecord> {
        self.store.recent_cloned(n)
    }

    /// Records with `from <= timestamp < to`, newest first.
    pub fn between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<CheckInRecord> {
        self.store.between_cloned(from, to)
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// True when no records are live.
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Read-only access to the in-memory state.
    pub fn store(&self) -> &CheckInStore {
        &self.store
    }

    fn commit(&mut self, stored: StoredOp) -> Result<(), DurableError> {
        let Some(sink) = self.sink.as_mut() else {
            return Ok(());
        };

        if let Err(err) = sink.append_ops(std::slice::from_ref(&stored)) {
            warn!(seq = stored.seq, error = %err, "write failed, rolling back");
            self.store.revert(&stored)?;
            return Err(err.into());
        }
        Ok(())
    }
}
