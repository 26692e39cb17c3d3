use std::{
    ops::Bound,
    time::{SystemTime, UNIX_EPOCH},
};

use chrono::{DateTime, Utc};
use hashbrown::HashMap;
use thiserror::Error;

use crate::{
    checkin::{CheckInDraft, CheckInPatch, CheckInRecord},
    op::{Op, StoredOp},
    types::{Coordinates, OpSeq, RecordId},
};

use super::indices::{TimelineIndex, TimelineKey};

/// Rejection raised by [`CheckInStore`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// No live record has this id.
    #[error("check-in {0} not found")]
    NotFound(RecordId),
    /// A record with this id is already present.
    #[error("check-in {0} already exists")]
    AlreadyExists(RecordId),
    /// Latitude or longitude is out of range or not finite.
    #[error("coordinates out of range: ({latitude}, {longitude})")]
    InvalidCoordinates {
        /// Rejected latitude.
        latitude: f64,
        /// Rejected longitude.
        longitude: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
/// Full store state as loaded from persistence.
pub struct StoreSnapshotV1 {
    /// Next id to allocate.
    pub next_record_id: RecordId,
    /// Next op sequence to stamp.
    pub next_op_seq: OpSeq,
    /// Live records in id order.
    pub records: Vec<CheckInRecord>,
}

/// Authoritative in-memory collection of check-ins.
#[derive(Debug, Default)]
pub struct CheckInStore {
    records: HashMap<RecordId, CheckInRecord>,
    timeline: TimelineIndex,
    next_op_seq: OpSeq,
    next_record_id: RecordId,
}

impl CheckInStore {
    /// Empty store; the first id is 1.
    pub fn new() -> Self {
        Self {
            next_op_seq: 1,
            next_record_id: 1,
            ..Self::default()
        }
    }

    /// Rebuilds a store from persisted state.
    pub fn from_snapshot(snapshot: StoreSnapshotV1) -> Result<Self, StoreError> {
        let mut store = Self {
            next_record_id: snapshot.next_record_id.max(1),
            next_op_seq: snapshot.next_op_seq.max(1),
            ..Self::default()
        };

        for rec in snapshot.records {
            store.insert_record(rec)?;
        }

        Ok(store)
    }

    /// Exports all live records in creation order.
    pub fn export_snapshot(&self) -> StoreSnapshotV1 {
        let mut records: Vec<CheckInRecord> = self.records.values().cloned().collect();
        records.sort_by_key(|r| r.id);

        StoreSnapshotV1 {
            next_record_id: self.next_record_id,
            next_op_seq: self.next_op_seq,
            records,
        }
    }

    /// Validates `draft` and inserts it under a fresh id.
    pub fn create(&mut self, draft: CheckInDraft) -> Result<(CheckInRecord, StoredOp), StoreError> {
        let coords = Coordinates::new(draft.latitude, draft.longitude);
        if !coords.is_valid() {
            return Err(StoreError::InvalidCoordinates {
                latitude: draft.latitude,
                longitude: draft.longitude,
            });
        }

        let id = self.next_record_id;
        self.next_record_id += 1;
        let record = draft.into_record(id);

        self.insert_record(record.clone())?;
        let stored = self.stamp(Op::Create {
            record: record.clone(),
        });
        Ok((record, stored))
    }

    /// Applies `patch`, recording the inverse in the returned op.
    pub fn update(&mut self, id: RecordId, patch: CheckInPatch) -> Result<(CheckInRecord, StoredOp), StoreError> {
        let rec = self.records.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        let prev = patch.capture_inverse_for(rec);
        patch.apply_to(rec);
        let updated = rec.clone();

        let stored = self.stamp(Op::Update { id, patch, prev });
        Ok((updated, stored))
    }

    /// Removes a record. Its id is never reissued.
    pub fn delete(&mut self, id: RecordId) -> Result<(CheckInRecord, StoredOp), StoreError> {
        let record = self.remove_record(id)?;
        let stored = self.stamp(Op::Delete {
            record: record.clone(),
        });
        Ok((record, stored))
    }

    /// Undoes `stored` in memory after its persistence failed.
    ///
    /// Allocated ids and sequence numbers are not handed back, so a failed
    /// create never causes an id to be issued twice.
    pub fn revert(&mut self, stored: &StoredOp) -> Result<(), StoreError> {
        match &stored.op {
            Op::Create { record } => {
                self.remove_record(record.id)?;
            }
            Op::Update { id, prev, .. } => {
                let rec = self.records.get_mut(id).ok_or(StoreError::NotFound(*id))?;
                prev.apply_to(rec);
            }
            Op::Delete { record } => {
                self.insert_record(record.clone())?;
            }
        }
        Ok(())
    }

    /// Borrow one live record.
    pub fn get(&self, id: RecordId) -> Option<&CheckInRecord> {
        self.records.get(&id)
    }

    /// Owned copy of one live record.
    pub fn get_cloned(&self, id: RecordId) -> Option<CheckInRecord> {
        self.get(id).cloned()
    }

    /// All records, newest first.
    pub fn list(&self) -> Vec<&CheckInRecord> {
        self.timeline
            .iter()
            .filter_map(|key| self.records.get(&key.id()))
            .collect()
    }

    /// Owned [`CheckInStore::list`].
    pub fn list_cloned(&self) -> Vec<CheckInRecord> {
        self.list().into_iter().cloned().collect()
    }

    /// The `n` newest records.
    pub fn recent(&self, n: usize) -> Vec<&CheckInRecord> {
        self.timeline
            .iter()
            .take(n)
            .filter_map(|key| self.records.get(&key.id()))
            .collect()
    }

    /// Owned [`CheckInStore::recent`].
    pub fn recent_cloned(&self, n: usize) -> Vec<CheckInRecord> {
        self.recent(n).into_iter().cloned().collect()
    }

    /// Records with `from <= timestamp < to`, newest first.
    pub fn between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<&CheckInRecord> {
        if from >= to {
            return Vec::new();
        }
        // Ids start at 1, so id 0 bounds every key sharing a timestamp.
        let upper = Bound::Excluded(TimelineKey::new(to, 0));
        let lower = Bound::Included(TimelineKey::new(from, 0));
        self.timeline
            .range((upper, lower))
            .filter_map(|key| self.records.get(&key.id()))
            .collect()
    }

    /// Owned [`CheckInStore::between`].
    pub fn between_cloned(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> Vec<CheckInRecord> {
        self.between(from, to).into_iter().cloned().collect()
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// True when no records are live.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Id the next create will receive.
    pub fn next_record_id(&self) -> RecordId {
        self.next_record_id
    }

    /// Sequence of the last stamped op, 0 when none.
    pub fn latest_op_seq(&self) -> OpSeq {
        self.next_op_seq.saturating_sub(1)
    }

    fn insert_record(&mut self, record: CheckInRecord) -> Result<(), StoreError> {
        if self.records.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(record.id));
        }
        self.next_record_id = self.next_record_id.max(record.id.saturating_add(1));
        self.timeline.insert(TimelineKey::new(record.timestamp, record.id));
        self.records.insert(record.id, record);
        Ok(())
    }

    fn remove_record(&mut self, id: RecordId) -> Result<CheckInRecord, StoreError> {
        let record = self.records.remove(&id).ok_or(StoreError::NotFound(id))?;
        self.timeline.remove(&TimelineKey::new(record.timestamp, id));
        Ok(record)
    }

    fn stamp(&mut self, op: Op) -> StoredOp {
        let seq = self.next_op_seq;
        self.next_op_seq += 1;
        StoredOp {
            seq,
            ts_ms: now_ms(),
            op,
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
