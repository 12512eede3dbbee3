//! Status reporting for cynic.
//!
//! This crate provides:
//! - `StatusCache`, the shared latest-result map hooks write into
//! - `StatusServer`, an axum server exposing the map as JSON
//! - `snapshot`, periodic snapshots of the map and their binary file format

pub mod cache;
pub mod error;
pub mod server;
pub mod snapshot;

pub use cache::StatusCache;
pub use error::StatusError;
pub use server::{normalize_root, router, StatusServer, StatusServerHandle};
pub use snapshot::{Snapshot, SnapshotStore, Snapshotter};
