//! The check-in action and detail rendering, as called by the UI.

use std::time::Duration;

use chrono::Utc;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
    checkin::{CheckInDraft, CheckInRecord},
    location::{LocationError, LocationProvider},
    photo::{CodecError, PhotoBlob},
    runtime::handle::{CheckInLogHandle, RuntimeError},
    types::RecordId,
};

/// Failure of a check-in action.
#[derive(Debug, Error)]
pub enum CheckInError {
    /// The log rejected or could not persist the request.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
    /// No usable location fix.
    #[error(transparent)]
    Location(#[from] LocationError),
    /// Stored photo data could not be decoded.
    #[error("corrupt photo data: {0}")]
    CorruptEncoding(#[from] CodecError),
    /// More photos than the policy allows.
    #[error("{count} photos attached, at most {max} allowed")]
    TooManyPhotos {
        /// Photos supplied.
        count: usize,
        /// Configured cap.
        max: usize,
    },
}

impl CheckInError {
    /// True when the record does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, CheckInError::Runtime(err) if err.is_not_found())
    }
}

/// Limits the UI applies when checking in.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckInPolicy {
    #[serde(default = "default_max_photos")]
    /// Most photos one check-in may carry.
    pub max_photos: usize,
    /// How long to wait for a first location fix, in milliseconds.
    #[serde(default = "default_fix_timeout_ms")]
    pub fix_timeout_ms: u64,
}

impl Default for CheckInPolicy {
    fn default() -> Self {
        Self {
            max_photos: default_max_photos(),
            fix_timeout_ms: default_fix_timeout_ms(),
        }
    }
}

impl CheckInPolicy {
    /// [`CheckInPolicy::fix_timeout_ms`] as a duration, for
    /// [`crate::location::SharedLocation::new`].
    pub fn fix_timeout(&self) -> Duration {
        Duration::from_millis(self.fix_timeout_ms)
    }
}

fn default_max_photos() -> usize {
    9
}

fn default_fix_timeout_ms() -> u64 {
    10_000
}

/// A record with its photos decoded, ready for the detail view.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckInDetail {
    /// The stored record.
    pub record: CheckInRecord,
    /// Decoded photos, in attachment order.
    pub photos: Vec<Vec<u8>>,
}

/// Check-in actions over a running log and a location provider.
pub struct CheckInService<L> {
    log: CheckInLogHandle,
    location: L,
    policy: CheckInPolicy,
}

impl<L: LocationProvider> CheckInService<L> {
    /// Service over `log` that locates with `location`.
    pub fn new(log: CheckInLogHandle, location: L, policy: CheckInPolicy) -> Self {
        Self {
            log,
            location,
            policy,
        }
    }

    /// Underlying log handle.
    pub fn log(&self) -> &CheckInLogHandle {
        &self.log
    }

    /// Records a check-in at the current position.
    ///
    /// Blank notes are stored as absent. No photos means no photo data at all.
    pub async fn check_in(
        &self,
        notes: Option<String>,
        photos: Vec<Vec<u8>>,
    ) -> Result<CheckInRecord, CheckInError> {
        if photos.len() > self.policy.max_photos {
            return Err(CheckInError::TooManyPhotos {
                count: photos.len(),
                max: self.policy.max_photos,
            });
        }

        let fix = self.location.request_fix().await?;
        debug!(
            lat = fix.coordinates.latitude,
            lon = fix.coordinates.longitude,
            place = fix.place_name.as_deref(),
            "checking in"
        );

        let mut draft = CheckInDraft::new(Utc::now(), fix.coordinates.latitude, fix.coordinates.longitude);
        draft.location_name = fix.place_name;
        draft.notes = notes.filter(|n| !n.trim().is_empty());
        if !photos.is_empty() {
            draft.photos = Some(PhotoBlob::encode(photos.as_slice())?);
        }

        let record = self.log.create(draft).await?;
        info!(id = record.id, photos = photos.len(), "check-in recorded");
        Ok(record)
    }

    /// History, newest first.
    pub async fn history(&self) -> Result<Vec<CheckInRecord>, CheckInError> {
        Ok(self.log.list().await?)
    }

    /// One record with its photos decoded.
    pub async fn detail(&self, id: RecordId) -> Result<CheckInDetail, CheckInError> {
        let record = self.log.get(id).await?;
        let photos = record.decode_photos()?;
        Ok(CheckInDetail { record, photos })
    }

    /// Deletes a check-in the user confirmed for removal.
    pub async fn remove(&self, id: RecordId) -> Result<(), CheckInError> {
        self.log.delete(id).await?;
        info!(id, "check-in removed");
        Ok(())
    }
}
