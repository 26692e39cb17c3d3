//! In-memory authoritative store, its durable wrapper, and index helpers.

/// Store coupled with a persistence sink.
pub mod durable;
/// Timeline ordering index.
pub mod indices;
/// Authoritative check-in store.
pub mod store;
