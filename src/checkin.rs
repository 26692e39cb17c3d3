//! Check-in domain record, draft, and patch types.

use chrono::{DateTime, SubsecRound, Utc};

use crate::{
    photo::{CodecError, PhotoBlob},
    types::{Coordinates, RecordId, UNKNOWN_LOCATION},
};

/// Fully materialized, authoritative check-in record.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckInRecord {
    /// Stable record identifier.
    pub id: RecordId,
    /// Moment of the check-in, microsecond precision.
    pub timestamp: DateTime<Utc>,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Reverse-geocoded place name, when one was resolved.
    pub location_name: Option<String>,
    /// Free-text notes.
    pub notes: Option<String>,
    /// Encoded photos. `None` means no photo data was attached at all.
    pub photos: Option<PhotoBlob>,
}

impl CheckInRecord {
    /// Coordinate pair of this check-in.
    pub fn coordinates(&self) -> Coordinates {
        Coordinates::new(self.latitude, self.longitude)
    }

    /// Place name, or [`UNKNOWN_LOCATION`] when absent.
    pub fn display_location_name(&self) -> &str {
        self.location_name.as_deref().unwrap_or(UNKNOWN_LOCATION)
    }

    /// Decodes attached photos; absent photo data decodes to an empty list.
    pub fn decode_photos(&self) -> Result<Vec<Vec<u8>>, CodecError> {
        match &self.photos {
            Some(blob) => blob.decode(),
            None => Ok(Vec::new()),
        }
    }
}

/// Insert payload used to create a new [`CheckInRecord`].
#[derive(Debug, Clone, PartialEq)]
pub struct CheckInDraft {
    /// Moment of the check-in.
    pub timestamp: DateTime<Utc>,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Resolved place name.
    pub location_name: Option<String>,
    /// Free-text notes.
    pub notes: Option<String>,
    /// Already encoded photos.
    pub photos: Option<PhotoBlob>,
}

impl CheckInDraft {
    /// Draft with only the required fields set.
    pub fn new(timestamp: DateTime<Utc>, latitude: f64, longitude: f64) -> Self {
        Self {
            timestamp,
            latitude,
            longitude,
            location_name: None,
            notes: None,
            photos: None,
        }
    }

    /// Sets the place name.
    pub fn with_location_name(mut self, name: impl Into<String>) -> Self {
        self.location_name = Some(name.into());
        self
    }

    /// Sets the notes.
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Attaches an encoded photo blob.
    pub fn with_photos(mut self, photos: PhotoBlob) -> Self {
        self.photos = Some(photos);
        self
    }

    pub(crate) fn into_record(self, id: RecordId) -> CheckInRecord {
        CheckInRecord {
            id,
            // Storage keeps microseconds; truncate up front so reloads compare equal.
            timestamp: self.timestamp.trunc_subsecs(6),
            latitude: self.latitude,
            longitude: self.longitude,
            location_name: self.location_name,
            notes: self.notes,
            photos: self.photos,
        }
    }
}

/// Sparse patch where each `Some` field overwrites the record value.
///
/// Identity, timestamp and coordinates are fixed at creation and cannot be
/// patched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CheckInPatch {
    /// Optional replacement for the place name.
    pub location_name: Option<Option<String>>,
    /// Optional replacement for the notes.
    pub notes: Option<Option<String>>,
    /// Optional replacement for the photo blob.
    pub photos: Option<Option<PhotoBlob>>,
}

impl CheckInPatch {
    /// Returns true when no fields are set.
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Captures an inverse patch for all fields present in `self`.
    pub fn capture_inverse_for(&self, rec: &CheckInRecord) -> Self {
        Self {
            location_name: self.location_name.as_ref().map(|_| rec.location_name.clone()),
            notes: self.notes.as_ref().map(|_| rec.notes.clone()),
            photos: self.photos.as_ref().map(|_| rec.photos.clone()),
        }
    }

    /// Applies this patch in place to `rec`.
    pub fn apply_to(&self, rec: &mut CheckInRecord) {
        if let Some(v) = &self.location_name {
            rec.location_name = v.clone();
        }
        if let Some(v) = &self.notes {
            rec.notes = v.clone();
        }
        if let Some(v) = &self.photos {
            rec.photos = v.clone();
        }
    }
}
