//! Shared primitive IDs and coordinate helpers.

/// Monotonic check-in identifier. Never reissued, even after deletion.
pub type RecordId = u64;
/// Monotonic operation sequence number.
pub type OpSeq = u64;

/// Display label used when a record carries no resolved place name.
pub const UNKNOWN_LOCATION: &str = "Unknown location";

/// A WGS84 coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinates {
    /// Latitude in [-90, 90].
    pub latitude: f64,
    /// Longitude in [-180, 180].
    pub longitude: f64,
}

impl Coordinates {
    /// Builds a coordinate pair without validating it.
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Returns true when both components are finite and in range.
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }
}
