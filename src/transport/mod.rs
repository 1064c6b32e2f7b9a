//! Transport module - connection loops.
//!
//! Provides:
//! - [`TcpBridge`] - stream transport, frames reassembled from TCP reads
//! - [`UdpBridge`] - datagram transport, gated by a per-session sequencer
//!
//! Both loops run until the shutdown signal flips to `true` (or its sender is
//! dropped) and close every stream left open on the way out.

mod tcp;
mod udp;

use std::time::Duration;

use tokio::sync::watch;

use crate::config::{
    ServerConfig, SessionMode, DEFAULT_MAX_SESSIONS, DEFAULT_READ_BUFFER_SIZE,
    DEFAULT_SESSION_IDLE_TIMEOUT_SECS,
};
use crate::protocol::DEFAULT_MAX_PAYLOAD_SIZE;

pub use tcp::{serve_connection, TcpBridge};
pub use udp::UdpBridge;

/// Pause after a failed accept or receive so a persistent error does not spin.
pub(crate) const ERROR_BACKOFF: Duration = Duration::from_millis(100);

/// Knobs shared by both connection loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopOptions {
    pub session_mode: SessionMode,
    /// Concurrent sessions allowed in [`SessionMode::Multi`].
    pub max_sessions: usize,
    /// Largest payload a stream frame may announce.
    pub max_payload_size: u32,
    /// Bytes requested per stream read.
    pub read_buffer_size: usize,
    /// Silence after which a datagram session with open streams may be
    /// evicted when the session limit is reached. Sessions without open
    /// streams are evictable at any time.
    pub idle_timeout: Duration,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            session_mode: SessionMode::Single,
            max_sessions: DEFAULT_MAX_SESSIONS,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            idle_timeout: Duration::from_secs(DEFAULT_SESSION_IDLE_TIMEOUT_SECS),
        }
    }
}

impl From<&ServerConfig> for LoopOptions {
    fn from(config: &ServerConfig) -> Self {
        Self {
            session_mode: config.session_mode,
            max_sessions: config.max_sessions.max(1),
            max_payload_size: config.max_payload_size,
            read_buffer_size: config.read_buffer_size.max(1),
            idle_timeout: Duration::from_secs(config.session_idle_timeout_secs),
        }
    }
}

/// Resolves once shutdown is requested or the controlling handle is gone.
pub(crate) async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}
