//! Per-connection session state.

use std::net::SocketAddr;

use crate::storage::StreamTable;

/// State owned by exactly one connection loop.
///
/// Holds the streams this device opened. Dropping a session releases every
/// file handle; [`Session::teardown`] additionally flushes and logs them.
#[derive(Debug)]
pub struct Session {
    peer: Option<SocketAddr>,
    table: StreamTable,
}

impl Session {
    /// Create a session for the given peer.
    pub fn new(peer: Option<SocketAddr>) -> Self {
        Self {
            peer,
            table: StreamTable::new(),
        }
    }

    /// Address of the device, if known.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Update the address responses go to.
    pub fn set_peer(&mut self, peer: SocketAddr) {
        self.peer = Some(peer);
    }

    /// Streams currently open in this session.
    pub fn streams(&self) -> &StreamTable {
        &self.table
    }

    pub(crate) fn streams_mut(&mut self) -> &mut StreamTable {
        &mut self.table
    }

    /// Close every stream the device left open.
    pub async fn teardown(&mut self) {
        if self.table.is_empty() {
            return;
        }
        let open = self.table.len();
        let closed = self.table.close_all().await;
        tracing::info!(
            "Session {:?} ended with {} open stream(s), {} closed cleanly",
            self.peer,
            open,
            closed
        );
    }
}
