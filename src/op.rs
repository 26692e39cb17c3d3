//! Mutation operation model.

use crate::{
    checkin::{CheckInPatch, CheckInRecord},
    types::{OpSeq, RecordId},
};

/// Applied mutation, recorded for persistence and rollback.
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
    /// Create a fully materialized record.
    Create {
        /// Created record.
        record: CheckInRecord,
    },
    /// Patch a record, including precomputed inverse patch.
    Update {
        /// Record id to mutate.
        id: RecordId,
        /// Forward patch.
        patch: CheckInPatch,
        /// Inverse patch that restores prior state.
        prev: CheckInPatch,
    },
    /// Remove a record. Carries the removed record so the op can be reverted.
    Delete {
        /// Removed record.
        record: CheckInRecord,
    },
}

impl Op {
    /// Record the op applies to.
    pub fn record_id(&self) -> RecordId {
        match self {
            Op::Create { record } | Op::Delete { record } => record.id,
            Op::Update { id, .. } => *id,
        }
    }

    /// Journal kind code: 1 create, 2 update, 3 delete.
    pub fn kind_code(&self) -> i64 {
        match self {
            Op::Create { .. } => 1,
            Op::Update { .. } => 2,
            Op::Delete { .. } => 3,
        }
    }
}

/// Journal row metadata plus operation payload.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredOp {
    /// Monotonic operation sequence.
    pub seq: OpSeq,
    /// Operation timestamp in milliseconds.
    pub ts_ms: u64,
    /// Operation body.
    pub op: Op,
}
