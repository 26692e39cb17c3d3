//! SQLite-backed check-in table plus append-only event journal.

use std::path::Path;

use chrono::DateTime;
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params};
use serde::Deserialize;
use tracing::{debug, info};

use crate::{
    checkin::CheckInRecord,
    core::store::{CheckInStore, StoreError, StoreSnapshotV1},
    op::{Op, StoredOp},
    photo::{PHOTO_BLOB_FORMAT, PhotoBlob},
    types::{OpSeq, RecordId},
};

use super::{OpSink, PersistError, PersistResult};

const SCHEMA_VERSION: i64 = 1;

/// SQLite `synchronous` pragma setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Synchronous {
    /// Sync at WAL checkpoints only. Survives process crashes.
    #[default]
    Normal,
    /// Sync on every commit. Also survives power loss.
    Full,
}

impl Synchronous {
    fn as_pragma(self) -> &'static str {
        match self {
            Synchronous::Normal => "NORMAL",
            Synchronous::Full => "FULL",
        }
    }
}

/// SQLite implementation of [`crate::persist::OpSink`].
pub struct SqliteOpSink {
    conn: Connection,
}

impl SqliteOpSink {
    /// Opens or creates a SQLite-backed sink at `path`.
    ///
    /// Enables WAL mode and sets `synchronous=NORMAL`.
    pub fn open(path: impl AsRef<Path>) -> PersistResult<Self> {
        Self::open_with(path, Synchronous::default())
    }

    /// Opens or creates a sink at `path` with an explicit `synchronous` mode.
    pub fn open_with(path: impl AsRef<Path>, synchronous: Synchronous) -> PersistResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        info!(path = %path.display(), ?synchronous, "opened check-in database");
        Self::init_connection(conn, synchronous)
    }

    /// Opens an in-memory SQLite sink.
    pub fn open_in_memory() -> PersistResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_connection(conn, Synchronous::default())
    }

    fn init_connection(conn: Connection, synchronous: Synchronous) -> PersistResult<Self> {
        conn.execute_batch(include_str!("schema.sql"))?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", synchronous.as_pragma())?;

        conn.execute(
            "INSERT OR IGNORE INTO meta(key, value) VALUES ('schema_version', ?1), ('photo_blob_format', ?2), ('next_record_id', 1)",
            params![SCHEMA_VERSION, i64::from(PHOTO_BLOB_FORMAT)],
        )?;

        let sink = Self { conn };
        sink.check_version("schema_version", SCHEMA_VERSION)?;
        sink.check_version("photo_blob_format", i64::from(PHOTO_BLOB_FORMAT))?;
        Ok(sink)
    }

    fn check_version(&self, key: &'static str, expected: i64) -> PersistResult<()> {
        let found = self.meta_value(key)?.unwrap_or(expected);
        if found != expected {
            return Err(PersistError::UnsupportedFormat {
                what: key,
                found,
                expected,
            });
        }
        Ok(())
    }

    fn meta_value(&self, key: &str) -> PersistResult<Option<i64>> {
        let value = self
            .conn
            .query_row("SELECT value FROM meta WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    /// Loads the persisted records into a fresh store.
    pub fn load_store(&self) -> PersistResult<CheckInStore> {
        let snapshot = self.load_snapshot()?;
        debug!(
            records = snapshot.records.len(),
            next_record_id = snapshot.next_record_id,
            "loaded check-in snapshot"
        );
        Ok(CheckInStore::from_snapshot(snapshot)?)
    }

    /// Reads the persisted state without building a store.
    pub fn load_snapshot(&self) -> PersistResult<StoreSnapshotV1> {
        let mut stmt = self.conn.prepare(
            "SELECT id, ts_us, latitude, longitude, location_name, notes, photo_blob FROM checkins ORDER BY id ASC",
        )?;
        let rows = stmt.query_map([], record_from_row)?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }

        let next_record_id = self.meta_value("next_record_id")?.unwrap_or(1) as RecordId;
        let next_op_seq = self.latest_seq()?.saturating_add(1);

        Ok(StoreSnapshotV1 {
            next_record_id,
            next_op_seq,
            records,
        })
    }

    /// Returns the latest sequence persisted in the events table.
    pub fn latest_seq(&self) -> PersistResult<OpSeq> {
        let seq: Option<i64> = self
            .conn
            .query_row("SELECT MAX(seq) FROM events", [], |row| row.get(0))
            .optional()?
            .flatten();
        Ok(seq.unwrap_or(0) as OpSeq)
    }

    /// Number of journal rows recorded for `id`.
    pub fn event_count_for(&self, id: RecordId) -> PersistResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM events WHERE record_id = ?1",
            params![id as i64],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl OpSink for SqliteOpSink {
    fn append_ops(&mut self, ops: &[StoredOp]) -> PersistResult<OpSeq> {
        if ops.is_empty() {
            return self.latest_seq();
        }

        let tx = self.conn.transaction()?;
        for stored in ops {
            apply_op(&tx, &stored.op)?;
            tx.execute(
                "INSERT INTO events(seq, ts_ms, kind, record_id) VALUES (?1, ?2, ?3, ?4)",
                params![
                    stored.seq as i64,
                    stored.ts_ms as i64,
                    stored.op.kind_code(),
                    stored.op.record_id() as i64,
                ],
            )?;
        }
        tx.commit()?;

        let last = ops.last().map(|o| o.seq).unwrap_or(0);
        debug!(count = ops.len(), last_seq = last, "journaled check-in ops");
        Ok(last)
    }

    fn flush(&mut self) -> PersistResult<()> {
        self.conn.execute_batch("PRAGMA wal_checkpoint(PASSIVE);")?;
        Ok(())
    }
}

fn apply_op(tx: &Transaction<'_>, op: &Op) -> PersistResult<()> {
    match op {
        Op::Create { record } => {
            tx.execute(
                "INSERT INTO checkins(id, ts_us, latitude, longitude, location_name, notes, photo_blob) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id as i64,
                    record.timestamp.timestamp_micros(),
                    record.latitude,
                    record.longitude,
                    record.location_name,
                    record.notes,
                    record.photos.as_ref().map(|p| p.bytes.as_slice()),
                ],
            )?;
            tx.execute(
                "INSERT INTO meta(key, value) VALUES ('next_record_id', ?1) ON CONFLICT(key) DO UPDATE SET value = MAX(value, excluded.value)",
                params![record.id.saturating_add(1) as i64],
            )?;
        }
        Op::Update { id, patch, .. } => {
            let changed = tx.execute(
                "UPDATE checkins SET \
                 location_name = CASE WHEN ?2 THEN ?3 ELSE location_name END, \
                 notes = CASE WHEN ?4 THEN ?5 ELSE notes END, \
                 photo_blob = CASE WHEN ?6 THEN ?7 ELSE photo_blob END \
                 WHERE id = ?1",
                params![
                    *id as i64,
                    patch.location_name.is_some(),
                    patch.location_name.clone().flatten(),
                    patch.notes.is_some(),
                    patch.notes.clone().flatten(),
                    patch.photos.is_some(),
                    patch
                        .photos
                        .as_ref()
                        .and_then(|p| p.as_ref())
                        .map(|p| p.bytes.as_slice()),
                ],
            )?;
            if changed == 0 {
                return Err(StoreError::NotFound(*id).into());
            }
        }
        Op::Delete { record } => {
            let changed = tx.execute("DELETE FROM checkins WHERE id = ?1", params![record.id as i64])?;
            if changed == 0 {
                return Err(StoreError::NotFound(record.id).into());
            }
        }
    }
    Ok(())
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<CheckInRecord> {
    let id: i64 = row.get(0)?;
    let ts_us: i64 = row.get(1)?;
    let timestamp = DateTime::from_timestamp_micros(ts_us).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            1,
            rusqlite::types::Type::Integer,
            Box::new(std::io::Error::other(format!("timestamp out of range: {ts_us}"))),
        )
    })?;
    let photos: Option<Vec<u8>> = row.get(6)?;

    Ok(CheckInRecord {
        id: id as RecordId,
        timestamp,
        latitude: row.get(2)?,
        longitude: row.get(3)?,
        location_name: row.get(4)?,
        notes: row.get(5)?,
        photos: photos.map(PhotoBlob::from_bytes),
    })
}
