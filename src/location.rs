//! Location capability consumed by the check-in action.
//!
//! The platform location service lives outside this crate. It is modeled as a
//! [`LocationProvider`]; [`SharedLocation`] is the bridge a platform layer
//! feeds with fixes and reverse-geocoded names, [`FixedLocation`] answers with
//! a constant.

use std::{future::Future, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{Notify, watch};
use tracing::debug;

use crate::types::Coordinates;

/// One location reading.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationFix {
    /// Reported position.
    pub coordinates: Coordinates,
    /// Reverse-geocoded place name, once resolved.
    pub place_name: Option<String>,
    /// When the platform produced the reading.
    pub captured_at: DateTime<Utc>,
}

impl LocationFix {
    /// Fix captured now without a place name.
    pub fn new(coordinates: Coordinates) -> Self {
        Self {
            coordinates,
            place_name: None,
            captured_at: Utc::now(),
        }
    }

    /// Sets the place name.
    pub fn with_place_name(mut self, name: impl Into<String>) -> Self {
        self.place_name = Some(name.into());
        self
    }
}

/// Why no fix could be produced.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    /// No reading arrived in time.
    #[error("location unavailable")]
    Unavailable,
    /// The user refused location access.
    #[error("location access denied")]
    PermissionDenied,
}

/// Platform authorization state for location access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Authorization {
    /// The user has not answered the prompt yet.
    #[default]
    NotDetermined,
    /// Access granted while the app is in use.
    Authorized,
    /// Access refused or restricted.
    Denied,
}

/// Source of location fixes.
pub trait LocationProvider: Send + Sync {
    /// Resolves the current position or fails with a [`LocationError`].
    fn request_fix(&self) -> impl Future<Output = Result<LocationFix, LocationError>> + Send;

    /// Continuous updates, when the provider supports them.
    fn subscribe(&self) -> Option<watch::Receiver<Option<LocationFix>>> {
        None
    }
}

/// Provider that always answers with the same fix, or never has one.
#[derive(Debug, Clone, Default)]
pub struct FixedLocation {
    fix: Option<LocationFix>,
}

impl FixedLocation {
    /// Always answers with `fix`.
    pub fn new(fix: LocationFix) -> Self {
        Self { fix: Some(fix) }
    }

    /// Never has a fix.
    pub fn unavailable() -> Self {
        Self { fix: None }
    }
}

impl LocationProvider for FixedLocation {
    async fn request_fix(&self) -> Result<LocationFix, LocationError> {
        self.fix.clone().ok_or(LocationError::Unavailable)
    }
}

struct Shared {
    fix: watch::Sender<Option<LocationFix>>,
    authorization: watch::Sender<Authorization>,
    refresh: Notify,
    fix_timeout: Duration,
}

/// Provider fed by the platform layer.
///
/// The platform publishes readings with [`SharedLocation::publish_fix`], fills
/// in the place name when reverse geocoding completes, and restarts location
/// updates whenever [`SharedLocation::refresh_requested`] fires.
#[derive(Clone)]
pub struct SharedLocation {
    inner: Arc<Shared>,
}

impl SharedLocation {
    /// `fix_timeout` bounds how long `request_fix` waits for a first reading.
    pub fn new(fix_timeout: Duration) -> Self {
        let (fix, _) = watch::channel(None);
        let (authorization, _) = watch::channel(Authorization::default());
        Self {
            inner: Arc::new(Shared {
                fix,
                authorization,
                refresh: Notify::new(),
                fix_timeout,
            }),
        }
    }

    /// Records a new reading. Any previously resolved place name is dropped.
    pub fn publish_fix(&self, coordinates: Coordinates) {
        debug!(lat = coordinates.latitude, lon = coordinates.longitude, "location fix published");
        self.inner.fix.send_replace(Some(LocationFix::new(coordinates)));
    }

    /// Attaches a reverse-geocoded name to the current reading.
    pub fn resolve_place_name(&self, name: impl Into<String>) {
        let name = name.into();
        self.inner.fix.send_modify(|fix| {
            if let Some(fix) = fix {
                fix.place_name = Some(name);
            }
        });
    }

    /// Records the platform authorization answer.
    pub fn set_authorization(&self, status: Authorization) {
        self.inner.authorization.send_replace(status);
    }

    /// Current authorization state.
    pub fn authorization(&self) -> Authorization {
        *self.inner.authorization.borrow()
    }

    /// Latest reading, if any.
    pub fn current(&self) -> Option<LocationFix> {
        self.inner.fix.borrow().clone()
    }

    /// Asks the platform for a fresh reading.
    pub fn request_refresh(&self) {
        self.inner.refresh.notify_one();
    }

    /// Completes when a refresh has been requested.
    pub async fn refresh_requested(&self) {
        self.inner.refresh.notified().await;
    }
}

impl LocationProvider for SharedLocation {
    async fn request_fix(&self) -> Result<LocationFix, LocationError> {
        if self.authorization() == Authorization::Denied {
            return Err(LocationError::PermissionDenied);
        }
        if let Some(fix) = self.current() {
            return Ok(fix);
        }

        let mut rx = self.inner.fix.subscribe();
        self.request_refresh();
        let waited = tokio::time::timeout(self.inner.fix_timeout, async {
            rx.wait_for(|fix| fix.is_some())
                .await
                .map(|fix| fix.clone())
                .ok()
                .flatten()
        })
        .await;

        match waited {
            Ok(Some(fix)) => Ok(fix),
            _ => Err(LocationError::Unavailable),
        }
    }

    fn subscribe(&self) -> Option<watch::Receiver<Option<LocationFix>>> {
        Some(self.inner.fix.subscribe())
    }
}
