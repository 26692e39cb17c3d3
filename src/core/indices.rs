use std::{cmp::Reverse, collections::BTreeSet};

use chrono::{DateTime, Utc};

use crate::types::RecordId;

/// Sort key for the history view: newest timestamp first, then newest id.
///
/// Ids are allocated monotonically, so the id tiebreak is insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimelineKey {
    ts: Reverse<DateTime<Utc>>,
    id: Reverse<RecordId>,
}

impl TimelineKey {
    /// Key for the record `id` taken at `ts`.
    pub fn new(ts: DateTime<Utc>, id: RecordId) -> Self {
        Self {
            ts: Reverse(ts),
            id: Reverse(id),
        }
    }

    /// Record id of this key.
    pub fn id(&self) -> RecordId {
        self.id.0
    }
}

/// Records ordered for the history view.
pub type TimelineIndex = BTreeSet<TimelineKey>;
