//! Stream transport connection loop.
//!
//! ```text
//! accept -> read chunk -> StreamCodec::decode -> Dispatcher -> Open response
//!    ^                                                               |
//!    +----------------------- EOF / read error ----------------------+
//! ```
//!
//! In single-session mode connections are served one after the other on the
//! accept task; a new device is only accepted once the previous one is gone.
//! In multi-session mode each connection gets its own task, bounded by a
//! semaphore.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;

use super::{shutdown_requested, LoopOptions, ERROR_BACKOFF};
use crate::codec::{FrameCodec, StreamCodec};
use crate::config::SessionMode;
use crate::error::Result;
use crate::handler::{Dispatcher, Session};

/// Listening stream-transport server.
pub struct TcpBridge {
    listener: TcpListener,
    dispatcher: Dispatcher,
    options: LoopOptions,
}

impl TcpBridge {
    /// Bind the listener.
    pub async fn bind(
        addr: SocketAddr,
        dispatcher: Dispatcher,
        options: LoopOptions,
    ) -> Result<Self> {
        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Stream transport listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            dispatcher,
            options,
        })
    }

    /// Address actually bound (resolves port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept and serve connections until shutdown.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> Result<()> {
        match self.options.session_mode {
            SessionMode::Single => self.run_single(shutdown).await,
            SessionMode::Multi => self.run_multi(shutdown).await,
        }
    }

    async fn run_single(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        loop {
            let (stream, peer) = tokio::select! {
                _ = shutdown_requested(&mut shutdown) => break,
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!("Accept error: {}", e);
                        tokio::time::sleep(ERROR_BACKOFF).await;
                        continue;
                    }
                },
            };

            handle_connection(stream, peer, &self.dispatcher, self.options, shutdown.clone())
                .await;
        }

        tracing::info!("Stream transport stopped");
        Ok(())
    }

    async fn run_multi(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let limit = Arc::new(Semaphore::new(self.options.max_sessions));
        let mut connections = JoinSet::new();

        loop {
            let (stream, peer) = tokio::select! {
                _ = shutdown_requested(&mut shutdown) => break,
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    if let Err(e) = joined {
                        tracing::error!("Connection task failed: {}", e);
                    }
                    continue;
                }
                accepted = self.listener.accept() => match accepted {
                    Ok(conn) => conn,
                    Err(e) => {
                        tracing::warn!("Accept error: {}", e);
                        tokio::time::sleep(ERROR_BACKOFF).await;
                        continue;
                    }
                },
            };

            // Permit is held until the connection task completes
            let permit = match limit.clone().try_acquire_owned() {
                Ok(p) => p,
                Err(_) => {
                    tracing::warn!(
                        "Session limit {} reached, refusing {}",
                        self.options.max_sessions,
                        peer
                    );
                    continue;
                }
            };

            let dispatcher = self.dispatcher.clone();
            let options = self.options;
            let shutdown = shutdown.clone();
            connections.spawn(async move {
                let _permit = permit;
                handle_connection(stream, peer, &dispatcher, options, shutdown).await;
            });
        }

        while let Some(joined) = connections.join_next().await {
            if let Err(e) = joined {
                tracing::error!("Connection task failed: {}", e);
            }
        }

        tracing::info!("Stream transport stopped");
        Ok(())
    }
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    dispatcher: &Dispatcher,
    options: LoopOptions,
    shutdown: watch::Receiver<bool>,
) {
    tracing::info!("Device connected: {}", peer);
    if let Err(e) = stream.set_nodelay(true) {
        tracing::debug!("Could not set TCP_NODELAY for {}: {}", peer, e);
    }

    match serve_connection(stream, Some(peer), dispatcher, options, shutdown).await {
        Ok(()) => tracing::info!("Device disconnected: {}", peer),
        Err(e) => tracing::warn!("Connection {} closed: {}", peer, e),
    }
}

/// Serve one device over any byte stream until EOF, error or shutdown.
///
/// Streams the device left open are closed before returning, on every path.
pub async fn serve_connection<S>(
    mut stream: S,
    peer: Option<SocketAddr>,
    dispatcher: &Dispatcher,
    options: LoopOptions,
    mut shutdown: watch::Receiver<bool>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut session = Session::new(peer);
    let mut codec = StreamCodec::with_max_payload(options.max_payload_size);

    let result = pump(
        &mut stream,
        &mut session,
        &mut codec,
        dispatcher,
        options.read_buffer_size,
        &mut shutdown,
    )
    .await;

    session.teardown().await;
    result
}

async fn pump<S>(
    stream: &mut S,
    session: &mut Session,
    codec: &mut StreamCodec,
    dispatcher: &Dispatcher,
    read_buffer_size: usize,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut buf = vec![0u8; read_buffer_size];

    loop {
        let n = tokio::select! {
            _ = shutdown_requested(shutdown) => return Ok(()),
            read = stream.read(&mut buf) => read?,
        };

        if n == 0 {
            if codec.has_partial_frame() {
                tracing::debug!("Discarding partial frame from {:?}", session.peer());
            }
            codec.reset();
            return Ok(());
        }

        for frame in codec.decode(&buf[..n])? {
            let request = match frame.request(codec.layout()) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("Dropping frame from {:?}: {}", session.peer(), e);
                    continue;
                }
            };

            let outcome = dispatcher.dispatch(session, request).await;
            if let Some(response) = codec.encode(&frame, &outcome) {
                stream.write_all(&response).await?;
            }
        }
    }
}
