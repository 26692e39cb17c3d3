//! Runtime event stream payloads.

use crate::types::RecordId;

/// Events emitted from the single-writer runtime loop after a durable write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckInEvent {
    /// A new check-in was created.
    Created {
        /// Created record id.
        id: RecordId,
    },
    /// An existing check-in was updated.
    Updated {
        /// Updated record id.
        id: RecordId,
    },
    /// A check-in was deleted.
    Deleted {
        /// Deleted record id.
        id: RecordId,
    },
}
