//! Periodic snapshots of the status cache.
//!
//! Two independent timers drive a [`Snapshotter`]: every snap interval the
//! whole cache is serialized into the in-memory [`SnapshotStore`], and every
//! dump interval the accumulated store is written to a file and the dumped
//! records are dropped.

mod store;

pub use store::{Snapshot, SnapshotStore, STORE_EXTENSION, STORE_MAGIC, STORE_VERSION};

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{Local, SecondsFormat, Utc};
use cynic_core::SnapshotConfig;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::StatusCache;
use crate::error::StatusError;

/// Suffixes tried before a dump gives up on finding an unused file name.
const MAX_NAME_ATTEMPTS: u32 = 100;

pub struct Snapshotter {
    cache: StatusCache,
    store: Mutex<SnapshotStore>,
    dir: PathBuf,
}

impl Snapshotter {
    pub fn new(cache: StatusCache, dir: impl Into<PathBuf>) -> Self {
        Self {
            cache,
            store: Mutex::new(SnapshotStore::new()),
            dir: dir.into(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of snapshots not yet dumped.
    pub fn pending(&self) -> usize {
        self.lock_store().len()
    }

    /// Serialize the current cache contents into the store.
    pub fn snap(&self) -> Result<(), StatusError> {
        let data = self.cache.to_json(None)?;
        self.lock_store().push(Snapshot {
            timestamp: Utc::now().timestamp(),
            data,
        });
        Ok(())
    }

    /// Write the accumulated store to `<dir>/<local RFC 3339>.<version>.cynic`.
    ///
    /// On success exactly the records that were written are removed; snapshots
    /// taken while the write was in flight stay for the next dump. On failure
    /// nothing is removed. Returns `None` when there was nothing to write.
    pub async fn dump(&self) -> Result<Option<PathBuf>, StatusError> {
        let (bytes, count, version) = {
            let store = self.lock_store();
            if store.is_empty() {
                return Ok(None);
            }
            (store.encode()?, store.len(), store.version())
        };

        tokio::fs::create_dir_all(&self.dir).await?;
        let (path, mut file) = self.create_dump_file(version).await?;
        file.write_all(&bytes).await?;
        file.flush().await?;

        self.lock_store().drain_front(count);
        info!(path = %path.display(), snapshots = count, bytes = bytes.len(), "snapshot store dumped");
        Ok(Some(path))
    }

    /// Create a dump file that did not exist before. A dump landing in the
    /// same second as the previous one gets a `.<n>` suffix on its timestamp.
    async fn create_dump_file(&self, version: u8) -> Result<(PathBuf, File), StatusError> {
        let stamp = Local::now().to_rfc3339_opts(SecondsFormat::Secs, false);
        for attempt in 0..MAX_NAME_ATTEMPTS {
            let name = if attempt == 0 {
                format!("{stamp}.{version}.{STORE_EXTENSION}")
            } else {
                format!("{stamp}.{attempt}.{version}.{STORE_EXTENSION}")
            };
            let path = self.dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("no free snapshot file name for {stamp}"),
        )
        .into())
    }

    fn lock_store(&self) -> std::sync::MutexGuard<'_, SnapshotStore> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The snap and dump timers of a running status server.
pub(crate) struct SnapshotTimers {
    snapshotter: Arc<Snapshotter>,
    snap_task: JoinHandle<()>,
    dump_task: JoinHandle<()>,
}

impl SnapshotTimers {
    pub(crate) fn start(cache: StatusCache, config: &SnapshotConfig) -> Self {
        if config.dump_every() < config.interval() {
            warn!(
                interval = ?config.interval(),
                dump_every = ?config.dump_every(),
                "snapshot dump interval is shorter than the snap interval; some dumps will be empty"
            );
        }

        let snapshotter = Arc::new(Snapshotter::new(cache, config.dir.clone()));
        let snap_task = {
            let snapshotter = snapshotter.clone();
            let every = config.interval();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
                loop {
                    ticker.tick().await;
                    match snapshotter.snap() {
                        Ok(()) => debug!(pending = snapshotter.pending(), "status snapshot taken"),
                        Err(e) => warn!(error = %e, "failed to snapshot status cache"),
                    }
                }
            })
        };
        let dump_task = {
            let snapshotter = snapshotter.clone();
            let every = config.dump_every();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + every, every);
                loop {
                    ticker.tick().await;
                    if let Err(e) = snapshotter.dump().await {
                        warn!(error = %e, dir = %snapshotter.dir().display(), "failed to dump snapshot store");
                    }
                }
            })
        };

        info!(
            dir = %config.dir.display(),
            interval = ?config.interval(),
            dump_every = ?config.dump_every(),
            "snapshot timers started"
        );
        Self {
            snapshotter,
            snap_task,
            dump_task,
        }
    }

    /// Cancel both timers, then dump whatever is still pending.
    pub(crate) async fn stop(self) {
        self.snap_task.abort();
        self.dump_task.abort();
        for (timer, task) in [("snap", self.snap_task), ("dump", self.dump_task)] {
            if let Err(e) = task.await {
                if !e.is_cancelled() {
                    warn!(timer, error = %e, "snapshot timer ended abnormally");
                }
            }
        }

        if let Err(e) = self.snapshotter.dump().await {
            warn!(error = %e, "final snapshot dump failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn dump_files(dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        files.sort();
        files
    }

    #[tokio::test]
    async fn dump_writes_store_and_clears_backlog() {
        let dir = tempfile::tempdir().unwrap();
        let cache = StatusCache::new();
        cache.update("web", "up").unwrap();

        let snapshotter = Snapshotter::new(cache.clone(), dir.path());
        snapshotter.snap().unwrap();
        cache.update("web", "down").unwrap();
        snapshotter.snap().unwrap();
        assert_eq!(snapshotter.pending(), 2);

        let path = snapshotter.dump().await.unwrap().unwrap();
        assert_eq!(snapshotter.pending(), 0);

        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.ends_with(".1.cynic"), "unexpected file name {name}");
        let stamp = name.trim_end_matches(".1.cynic");
        assert!(chrono::DateTime::parse_from_rfc3339(stamp).is_ok());

        let store = SnapshotStore::read_from(&path).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.snapshots()[0].data, r#"{"web":"up"}"#);
        assert_eq!(store.snapshots()[1].data, r#"{"web":"down"}"#);
    }

    #[tokio::test]
    async fn empty_store_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let snapshotter = Snapshotter::new(StatusCache::new(), dir.path());
        assert!(snapshotter.dump().await.unwrap().is_none());
        assert!(dump_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn failed_dump_keeps_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the dump directory should be.
        let blocked = dir.path().join("not-a-dir");
        std::fs::write(&blocked, b"x").unwrap();

        let snapshotter = Snapshotter::new(StatusCache::new(), &blocked);
        snapshotter.snap().unwrap();
        assert!(matches!(snapshotter.dump().await, Err(StatusError::Io(_))));
        assert_eq!(snapshotter.pending(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timers_snap_and_dump_periodically() {
        let dir = tempfile::tempdir().unwrap();
        let cache = StatusCache::new();
        cache.update("db", "ok").unwrap();
        let config =
            SnapshotConfig::new(Duration::from_secs(1), Duration::from_secs(3), dir.path()).unwrap();

        let timers = SnapshotTimers::start(cache, &config);
        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(timers.snapshotter.pending(), 2);
        timers.stop().await;

        let files = dump_files(dir.path());
        assert_eq!(files.len(), 1);
        assert_eq!(SnapshotStore::read_from(&files[0]).unwrap().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn subsecond_snap_interval_keeps_running() {
        let dir = tempfile::tempdir().unwrap();
        let cache = StatusCache::new();
        cache.update("api", "ok").unwrap();
        let config =
            SnapshotConfig::new(Duration::from_millis(20), Duration::from_secs(3600), dir.path()).unwrap();

        let timers = SnapshotTimers::start(cache, &config);
        tokio::time::sleep(Duration::from_millis(210)).await;
        assert_eq!(timers.snapshotter.pending(), 10);
        assert!(!timers.snap_task.is_finished());
        timers.stop().await;

        let files = dump_files(dir.path());
        assert_eq!(files.len(), 1);
        assert_eq!(SnapshotStore::read_from(&files[0]).unwrap().len(), 10);
    }

    #[tokio::test]
    async fn dumps_in_the_same_second_get_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let snapshotter = Snapshotter::new(StatusCache::new(), dir.path());

        snapshotter.snap().unwrap();
        let first = snapshotter.dump().await.unwrap().unwrap();
        snapshotter.snap().unwrap();
        let second = snapshotter.dump().await.unwrap().unwrap();
        assert_ne!(first, second);

        let files = dump_files(dir.path());
        assert_eq!(files.len(), 2);
        for file in &files {
            let name = file.file_name().unwrap().to_string_lossy().into_owned();
            assert!(name.ends_with(".1.cynic"), "unexpected file name {name}");
            assert_eq!(SnapshotStore::read_from(file).unwrap().len(), 1);
        }
    }
}
