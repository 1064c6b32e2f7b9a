//! Shared stream store: file allocation and stream id assignment.
//!
//! One store lives for the whole process and is shared by every session.
//! Filename probing is serialised by an async lock so that two sessions
//! opening the same base name never pick the same file; ids come from a
//! process-wide counter that starts at 1 and never repeats.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::fs::OpenOptions;
use tokio::sync::Mutex;

use super::naming::{decode_base_name, FileNaming};
use super::table::StreamSession;
use crate::error::{Result, SdsioError};

/// First stream id handed out.
pub const FIRST_STREAM_ID: u32 = 1;

/// Allocator for output files and stream ids.
#[derive(Debug)]
pub struct StreamStore {
    root: PathBuf,
    naming: FileNaming,
    next_stream_id: AtomicU32,
    allocation: Mutex<()>,
}

impl StreamStore {
    /// Create a store writing into `root`.
    pub fn new(root: impl Into<PathBuf>, naming: FileNaming) -> Self {
        Self {
            root: root.into(),
            naming,
            next_stream_id: AtomicU32::new(FIRST_STREAM_ID),
            allocation: Mutex::new(()),
        }
    }

    /// Output directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Naming scheme in use.
    pub fn naming(&self) -> FileNaming {
        self.naming
    }

    /// Id the next successful open will receive.
    pub fn peek_next_id(&self) -> u32 {
        self.next_stream_id.load(Ordering::Acquire)
    }

    /// Open a new stream for the NUL-terminated base name in `raw_name`.
    ///
    /// Tries `name.0.sds`, `name.1.sds`, ... and creates the first path
    /// that does not exist yet. The id is assigned only after the file was
    /// created. The counter is only advanced while holding the allocation
    /// lock.
    pub async fn open(&self, raw_name: &[u8]) -> Result<StreamSession> {
        let base_name = decode_base_name(raw_name)?;

        let _guard = self.allocation.lock().await;
        let id = self.peek_next_id();
        let next = id.checked_add(1).ok_or(SdsioError::IdsExhausted)?;
        let (path, file) = self.create_next_free(&base_name).await?;
        self.next_stream_id.store(next, Ordering::Release);

        tracing::debug!("Allocated stream {} -> {}", id, path.display());
        Ok(StreamSession::new(id, base_name, path, file))
    }

    async fn create_next_free(&self, base_name: &str) -> Result<(PathBuf, tokio::fs::File)> {
        for index in 0..=u32::MAX {
            let path = self.naming.path(&self.root, base_name, index);

            let exists = tokio::fs::try_exists(&path)
                .await
                .map_err(|source| SdsioError::Filesystem {
                    path: path.clone(),
                    source,
                })?;
            if exists {
                continue;
            }

            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(file) => return Ok((path, file)),
                // Created by someone outside this process since the existence check.
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(source) => return Err(SdsioError::Filesystem { path, source }),
            }
        }

        Err(SdsioError::Filesystem {
            path: self.root.join(base_name),
            source: std::io::Error::other("no free file index"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_sequential_opens_take_next_free_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = StreamStore::new(dir.path(), FileNaming::Indexed);

        for expected in 0..3 {
            let stream = store.open(b"Accel\0").await.unwrap();
            assert_eq!(
                stream.path(),
                dir.path().join(format!("Accel.{expected}.sds"))
            );
        }
        assert!(dir.path().join("Accel.2.sds").exists());
    }

    #[tokio::test]
    async fn test_existing_files_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Gyro.0.sds"), b"old").unwrap();
        std::fs::write(dir.path().join("Gyro.1.sds"), b"old").unwrap();

        let store = StreamStore::new(dir.path(), FileNaming::Indexed);
        let stream = store.open(b"Gyro\0").await.unwrap();

        assert_eq!(stream.path(), dir.path().join("Gyro.2.sds"));
        assert_eq!(std::fs::read(dir.path().join("Gyro.0.sds")).unwrap(), b"old");
    }

    #[tokio::test]
    async fn test_legacy_naming() {
        let dir = tempfile::tempdir().unwrap();
        let store = StreamStore::new(dir.path(), FileNaming::Legacy);

        let first = store.open(b"Mic").await.unwrap();
        let second = store.open(b"Mic").await.unwrap();
        assert_eq!(first.path(), dir.path().join("Mic0.sds"));
        assert_eq!(second.path(), dir.path().join("Mic1.sds"));
    }

    #[tokio::test]
    async fn test_ids_increase_across_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = StreamStore::new(dir.path(), FileNaming::Indexed);

        let a = store.open(b"A\0").await.unwrap();
        let b = store.open(b"B\0").await.unwrap();
        let c = store.open(b"A\0").await.unwrap();
        assert_eq!((a.id(), b.id(), c.id()), (1, 2, 3));
        assert_eq!(store.peek_next_id(), 4);
    }

    #[tokio::test]
    async fn test_failed_open_does_not_consume_id() {
        let dir = tempfile::tempdir().unwrap();
        let store = StreamStore::new(dir.path().join("missing"), FileNaming::Indexed);

        let err = store.open(b"Accel\0").await.unwrap_err();
        assert!(matches!(err, SdsioError::Filesystem { .. }));
        assert_eq!(store.peek_next_id(), FIRST_STREAM_ID);
    }

    #[tokio::test]
    async fn test_invalid_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = StreamStore::new(dir.path(), FileNaming::Indexed);

        assert!(matches!(
            store.open(b"../escape\0").await,
            Err(SdsioError::InvalidName(_))
        ));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_id_counter_exhaustion() {
        let dir = tempfile::tempdir().unwrap();
        let store = StreamStore::new(dir.path(), FileNaming::Indexed);
        store.next_stream_id.store(u32::MAX, Ordering::Release);

        assert!(matches!(store.open(b"X\0").await, Err(SdsioError::IdsExhausted)));
        assert!(!dir.path().join("X.0.sds").exists());
    }

    #[tokio::test]
    async fn test_concurrent_opens_never_collide() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(StreamStore::new(dir.path(), FileNaming::Indexed));

        let mut tasks = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            tasks.push(tokio::spawn(async move {
                let stream = store.open(b"Shared\0").await.unwrap();
                (stream.id(), stream.path().to_path_buf())
            }));
        }

        let mut ids = Vec::new();
        let mut paths = Vec::new();
        for task in tasks {
            let (id, path) = task.await.unwrap();
            ids.push(id);
            paths.push(path);
        }
        ids.sort_unstable();
        paths.sort();
        paths.dedup();

        assert_eq!(ids, (1..=8).collect::<Vec<_>>());
        assert_eq!(paths.len(), 8);
    }
}
