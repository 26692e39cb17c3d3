/// SQLite-backed sink.
pub mod sqlite;

use thiserror::Error;

use crate::{op::StoredOp, types::OpSeq};

/// Failure while reading or writing persisted state.
#[derive(Debug, Error)]
pub enum PersistError {
    /// SQLite reported an error.
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Persisted rows disagree with the store.
    #[error("store: {0}")]
    Store(#[from] crate::core::store::StoreError),
    /// The database was written with a format this build cannot read.
    #[error("unsupported {what} version {found}, expected {expected}")]
    UnsupportedFormat {
        /// Meta key that was checked.
        what: &'static str,
        /// Version found on disk.
        found: i64,
        /// Version this build writes.
        expected: i64,
    },
    /// Failure reported by a custom sink.
    #[error("{0}")]
    Message(String),
}

/// Result alias for persistence calls.
pub type PersistResult<T> = Result<T, PersistError>;

/// Durable destination for applied ops.
///
/// `append_ops` must be all-or-nothing: on `Err` none of `ops` may be visible
/// after a reload.
pub trait OpSink: Send {
    /// Persists `ops` in order and returns the last sequence written.
    fn append_ops(&mut self, ops: &[StoredOp]) -> PersistResult<OpSeq>;
    /// Forces buffered writes to stable storage.
    fn flush(&mut self) -> PersistResult<()> {
        Ok(())
    }
}
