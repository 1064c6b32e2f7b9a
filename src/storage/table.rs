//! Stream sessions and the per-connection stream table.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::{Result, SdsioError};

/// One open output file.
#[derive(Debug)]
pub struct StreamSession {
    id: u32,
    base_name: String,
    path: PathBuf,
    file: File,
    bytes_written: u64,
}

impl StreamSession {
    pub(crate) fn new(id: u32, base_name: String, path: PathBuf, file: File) -> Self {
        Self {
            id,
            base_name,
            path,
            file,
            bytes_written: 0,
        }
    }

    /// Stream identifier assigned on Open.
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// Base name requested by the device.
    pub fn base_name(&self) -> &str {
        &self.base_name
    }

    /// Path of the file backing this stream.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Total bytes appended so far.
    #[inline]
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Append `data` to the file and return the number of bytes written.
    pub async fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.file
            .write_all(data)
            .await
            .map_err(|source| self.fs_error(source))?;
        self.file
            .flush()
            .await
            .map_err(|source| self.fs_error(source))?;
        self.bytes_written += data.len() as u64;
        Ok(data.len())
    }

    /// Flush, sync and release the file handle.
    pub async fn close(mut self) -> Result<()> {
        self.file
            .flush()
            .await
            .map_err(|source| self.fs_error(source))?;
        self.file
            .sync_all()
            .await
            .map_err(|source| self.fs_error(source))?;
        Ok(())
    }

    fn fs_error(&self, source: std::io::Error) -> SdsioError {
        SdsioError::Filesystem {
            path: self.path.clone(),
            source,
        }
    }
}

/// Mapping from stream id to open stream, owned by one session.
#[derive(Debug, Default)]
pub struct StreamTable {
    streams: HashMap<u32, StreamSession>,
}

impl StreamTable {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Track a freshly opened stream.
    pub fn insert(&mut self, stream: StreamSession) {
        self.streams.insert(stream.id(), stream);
    }

    /// Look up an open stream.
    pub fn get_mut(&mut self, id: u32) -> Result<&mut StreamSession> {
        self.streams.get_mut(&id).ok_or(SdsioError::UnknownStream(id))
    }

    /// Remove a stream without closing it.
    pub fn remove(&mut self, id: u32) -> Result<StreamSession> {
        self.streams.remove(&id).ok_or(SdsioError::UnknownStream(id))
    }

    /// Whether `id` is open in this table.
    pub fn contains(&self, id: u32) -> bool {
        self.streams.contains_key(&id)
    }

    /// Ids of all open streams (unordered).
    pub fn ids(&self) -> Vec<u32> {
        self.streams.keys().copied().collect()
    }

    /// Number of open streams.
    pub fn len(&self) -> usize {
        self.streams.len()
    }

    /// Check if no stream is open.
    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Close every remaining stream. Returns how many were closed.
    ///
    /// Failures are logged; teardown always empties the table.
    pub async fn close_all(&mut self) -> usize {
        let mut closed = 0;
        for (id, stream) in self.streams.drain() {
            let path = stream.path().to_path_buf();
            match stream.close().await {
                Ok(()) => {
                    tracing::info!("Closed abandoned stream {} ({})", id, path.display());
                    closed += 1;
                }
                Err(e) => tracing::warn!("Failed to close abandoned stream {}: {}", id, e),
            }
        }
        closed
    }
}
