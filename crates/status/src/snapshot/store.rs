//! On-disk snapshot store format.
//!
//! A file is one MessagePack-encoded [`SnapshotStore`]: a magic tag, a format
//! version, and the snapshots in the order they were taken.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::StatusError;

/// `"CYNICSTR"` read as a big-endian integer.
pub const STORE_MAGIC: u64 = 0x4359_4E49_4353_5452;

/// Current store format version. Also the last component of dump file names.
pub const STORE_VERSION: u8 = 1;

/// Extension used for dump files.
pub const STORE_EXTENSION: &str = "cynic";

/// The whole status map serialized at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Unix seconds.
    pub timestamp: i64,
    /// JSON text of the status map.
    pub data: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotStore {
    magic: u64,
    version: u8,
    snapshots: Vec<Snapshot>,
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SnapshotStore {
    pub fn new() -> Self {
        Self {
            magic: STORE_MAGIC,
            version: STORE_VERSION,
            snapshots: Vec::new(),
        }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        self.snapshots.push(snapshot);
    }

    /// Remove the `count` oldest snapshots (all of them if fewer remain).
    pub fn drain_front(&mut self, count: usize) {
        let count = count.min(self.snapshots.len());
        self.snapshots.drain(..count);
    }

    pub fn encode(&self) -> Result<Vec<u8>, StatusError> {
        Ok(rmp_serde::to_vec(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, StatusError> {
        let store: SnapshotStore = rmp_serde::from_slice(bytes)?;
        if store.magic != STORE_MAGIC {
            return Err(StatusError::BadMagic(store.magic));
        }
        if store.version != STORE_VERSION {
            return Err(StatusError::UnsupportedVersion(store.version));
        }
        Ok(store)
    }

    pub fn read_from(path: &Path) -> Result<Self, StatusError> {
        let bytes = std::fs::read(path)?;
        Self::decode(&bytes)
    }
}

impl fmt::Display for SnapshotStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "version: {}", self.version)?;
        for snapshot in &self.snapshots {
            writeln!(f, "{}:{}", snapshot.timestamp, snapshot.data)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SnapshotStore {
        let mut store = SnapshotStore::new();
        store.push(Snapshot {
            timestamp: 1_700_000_000,
            data: r#"{"a":1}"#.to_string(),
        });
        store.push(Snapshot {
            timestamp: 1_700_000_060,
            data: r#"{"a":2}"#.to_string(),
        });
        store
    }

    #[test]
    fn decode_restores_written_store() {
        let store = sample();
        let bytes = store.encode().unwrap();
        let decoded = SnapshotStore::decode(&bytes).unwrap();
        assert_eq!(decoded, store);
        assert_eq!(decoded.version(), STORE_VERSION);
    }

    #[test]
    fn rejects_foreign_magic() {
        let mut store = sample();
        store.magic = 0xDEAD_BEEF;
        let bytes = store.encode().unwrap();
        match SnapshotStore::decode(&bytes) {
            Err(StatusError::BadMagic(magic)) => assert_eq!(magic, 0xDEAD_BEEF),
            other => panic!("expected BadMagic, got {other:?}"),
        }
    }

    #[test]
    fn rejects_unknown_version() {
        let mut store = sample();
        store.version = 9;
        let bytes = store.encode().unwrap();
        assert!(matches!(
            SnapshotStore::decode(&bytes),
            Err(StatusError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            SnapshotStore::decode(b"definitely not msgpack"),
            Err(StatusError::Decode(_))
        ));
    }

    #[test]
    fn drain_front_removes_oldest() {
        let mut store = sample();
        store.push(Snapshot {
            timestamp: 1_700_000_120,
            data: "{}".to_string(),
        });
        store.drain_front(2);
        assert_eq!(store.len(), 1);
        assert_eq!(store.snapshots()[0].timestamp, 1_700_000_120);

        store.drain_front(10);
        assert!(store.is_empty());
    }

    #[test]
    fn display_lists_version_then_snapshots() {
        let text = sample().to_string();
        assert_eq!(
            text,
            "version: 1\n1700000000:{\"a\":1}\n1700000060:{\"a\":2}\n"
        );
    }

    #[test]
    fn read_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.1.cynic");
        std::fs::write(&path, sample().encode().unwrap()).unwrap();

        let store = SnapshotStore::read_from(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert!(matches!(
            SnapshotStore::read_from(&dir.path().join("missing")),
            Err(StatusError::Io(_))
        ));
    }
}
