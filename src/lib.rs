//! Durable check-in log: geolocated, timestamped visit records with notes and
//! packed photos, kept in SQLite behind a single-writer runtime.
//!
//! # Examples
//!
//! In-memory usage with [`core::store::CheckInStore`]:
//! ```
//! use chrono::{TimeZone, Utc};
//! use checkin::{
//!     checkin::CheckInDraft,
//!     core::store::CheckInStore,
//!     photo::PhotoBlob,
//! };
//!
//! let mut store = CheckInStore::new();
//! let ts = Utc.with_ymd_and_hms(2024, 12, 18, 9, 30, 0).unwrap();
//! let photos = PhotoBlob::encode(&[b"jpeg-1".to_vec(), b"jpeg-2".to_vec()]).expect("encode");
//! let (rec, _op) = store
//!     .create(
//!         CheckInDraft::new(ts, 31.23, 121.47)
//!             .with_location_name("Office")
//!             .with_notes("met client")
//!             .with_photos(photos),
//!     )
//!     .expect("create");
//! assert_eq!(rec.id, 1);
//! assert_eq!(rec.decode_photos().expect("decode").len(), 2);
//! ```
//!
//! Runtime usage with the SQLite-backed store:
//! ```no_run
//! use chrono::Utc;
//! use checkin::{
//!     checkin::CheckInDraft,
//!     core::durable::DurableStore,
//!     persist::sqlite::Synchronous,
//!     runtime::handle::{spawn_checkin_log, RuntimeConfig},
//! };
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = DurableStore::open("checkin.db", Synchronous::Normal).expect("open sqlite");
//! let handle = spawn_checkin_log(store, RuntimeConfig::default());
//! let rec = handle
//!     .create(CheckInDraft::new(Utc::now(), 31.23, 121.47).with_notes("met client"))
//!     .await
//!     .expect("create");
//! assert_eq!(handle.list().await.expect("list")[0].id, rec.id);
//! handle.shutdown().await.expect("shutdown");
//! # }
//! ```
#![deny(missing_docs)]

/// Check-in records, drafts, and patches.
pub mod checkin;
/// Configuration loading and logging setup.
pub mod config;
/// Core in-memory store, durable wrapper, and index helpers.
pub mod core;
/// Location capability consumed by the check-in action.
pub mod location;
/// Mutation op model.
pub mod op;
/// Persistence abstraction and SQLite implementation.
pub mod persist;
/// Photo blob codec.
pub mod photo;
/// Single-writer runtime handle and events.
pub mod runtime;
/// Check-in action and detail rendering.
pub mod service;
/// Shared primitive types.
pub mod types;
