//! Command dispatcher.
//!
//! Executes a decoded [`Request`] against a [`Session`]:
//!
//! | Request | Effect | Outcome |
//! |---------|--------|---------|
//! | Open (write mode) | allocate `name.N.sds`, assign id | `Opened` / `OpenFailed` |
//! | Close | flush and drop the file, remove entry | `Closed` / `CloseFailed` |
//! | Write | append payload | `Written` / `WriteFailed` |
//! | Read | nothing | `Rejected` |
//!
//! Filesystem failures and unknown stream ids never end the session; they
//! are logged and reported through the outcome.

use std::sync::Arc;

use super::Session;
use crate::error::SdsioError;
use crate::protocol::{OpenMode, Outcome, Request};
use crate::storage::StreamStore;

/// Dispatches requests to the stream store and the session's stream table.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    store: Arc<StreamStore>,
}

impl Dispatcher {
    /// Create a dispatcher backed by `store`.
    pub fn new(store: Arc<StreamStore>) -> Self {
        Self { store }
    }

    /// Shared store.
    pub fn store(&self) -> &Arc<StreamStore> {
        &self.store
    }

    /// Execute one request.
    pub async fn dispatch(&self, session: &mut Session, request: Request) -> Outcome {
        match request {
            Request::Open { mode, name } => self.open(session, mode, &name).await,
            Request::Close { stream_id } => self.close(session, stream_id).await,
            Request::Write { stream_id, data } => self.write(session, stream_id, &data).await,
            Request::Read { stream_id } => {
                tracing::warn!("Read of stream {} is not supported", stream_id);
                Outcome::Rejected
            }
        }
    }

    async fn open(&self, session: &mut Session, mode: u32, name: &[u8]) -> Outcome {
        if OpenMode::from_argument(mode) != Some(OpenMode::Write) {
            tracing::warn!("Open rejected: {}", SdsioError::UnsupportedMode(mode));
            return Outcome::OpenFailed;
        }

        match self.store.open(name).await {
            Ok(stream) => {
                let stream_id = stream.id();
                tracing::info!(
                    "Opened stream {} ({}) for {:?}",
                    stream_id,
                    stream.path().display(),
                    session.peer()
                );
                session.streams_mut().insert(stream);
                Outcome::Opened { stream_id }
            }
            Err(e) => {
                tracing::error!("Could not open stream: {}", e);
                Outcome::OpenFailed
            }
        }
    }

    async fn close(&self, session: &mut Session, stream_id: u32) -> Outcome {
        let stream = match session.streams_mut().remove(stream_id) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!("Could not close stream: {}", e);
                return Outcome::CloseFailed;
            }
        };

        let written = stream.bytes_written();
        match stream.close().await {
            Ok(()) => {
                tracing::info!("Closed stream {} after {} bytes", stream_id, written);
                Outcome::Closed
            }
            Err(e) => {
                tracing::error!("Could not close stream {}: {}", stream_id, e);
                Outcome::CloseFailed
            }
        }
    }

    async fn write(&self, session: &mut Session, stream_id: u32, data: &[u8]) -> Outcome {
        let stream = match session.streams_mut().get_mut(stream_id) {
            Ok(stream) => stream,
            Err(e) => {
                tracing::warn!("Could not write {} bytes: {}", data.len(), e);
                return Outcome::WriteFailed;
            }
        };

        match stream.write(data).await {
            Ok(n) => {
                tracing::trace!("Wrote {} bytes to stream {}", n, stream_id);
                Outcome::Written { bytes: n as u32 }
            }
            Err(e) => {
                tracing::error!("Could not write to stream {}: {}", stream_id, e);
                Outcome::WriteFailed
            }
        }
    }
}
