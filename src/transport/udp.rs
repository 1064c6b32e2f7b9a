//! Datagram transport connection loop.
//!
//! One socket, one packet at a time. Each packet is decoded, passed through
//! the sender's [`Sequencer`], dispatched if admitted and answered with a
//! 20-byte response (fresh or cached).
//!
//! Session state is keyed by source address in multi-session mode. In
//! single-session mode every packet shares one session, whatever its source,
//! and responses go to whoever sent the packet being answered.
//!
//! A device re-creates its socket whenever its last stream is closed, so in
//! multi-session mode one device leaves a trail of source addresses. When the
//! session limit is reached, the least recently heard session without open
//! streams makes room for the newcomer; failing that, the oldest one silent
//! for longer than the idle timeout does.

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::watch;
use tokio::time::Instant;

use super::{shutdown_requested, LoopOptions, ERROR_BACKOFF};
use crate::codec::{DatagramCodec, FrameCodec};
use crate::config::SessionMode;
use crate::error::Result;
use crate::handler::{Dispatcher, Session};
use crate::protocol::{Frame, MAX_DATAGRAM_SIZE};
use crate::sequencer::{Admission, Sequencer};

type PeerKey = Option<SocketAddr>;

/// Session plus sequencing state of one logical device.
#[derive(Debug)]
struct PeerState {
    session: Session,
    sequencer: Sequencer,
    last_seen: Instant,
}

impl PeerState {
    fn new(peer: SocketAddr) -> Self {
        Self {
            session: Session::new(Some(peer)),
            sequencer: Sequencer::new(),
            last_seen: Instant::now(),
        }
    }
}

/// Bound datagram-transport server.
pub struct UdpBridge {
    socket: UdpSocket,
    dispatcher: Dispatcher,
    codec: DatagramCodec,
    options: LoopOptions,
    peers: HashMap<PeerKey, PeerState>,
}

impl UdpBridge {
    /// Bind the socket.
    pub async fn bind(
        addr: SocketAddr,
        dispatcher: Dispatcher,
        options: LoopOptions,
    ) -> Result<Self> {
        let socket = UdpSocket::bind(addr).await?;
        tracing::info!("Datagram transport listening on {}", socket.local_addr()?);
        Ok(Self {
            socket,
            dispatcher,
            codec: DatagramCodec::new(),
            options,
            peers: HashMap::new(),
        })
    }

    /// Address actually bound (resolves port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Serve packets until shutdown.
    ///
    /// Receive and send failures are logged and the loop keeps going.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        // One byte over the limit so oversized packets are detected, not truncated
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE + 1];

        loop {
            let (n, from) = tokio::select! {
                _ = shutdown_requested(&mut shutdown) => break,
                received = self.socket.recv_from(&mut buf) => match received {
                    Ok(r) => r,
                    Err(e) => {
                        tracing::warn!("Datagram receive error: {}", e);
                        tokio::time::sleep(ERROR_BACKOFF).await;
                        continue;
                    }
                },
            };

            if let Some(response) = self.handle_packet(&buf[..n], from).await {
                if let Err(e) = self.socket.send_to(&response, from).await {
                    tracing::warn!("Could not send response to {}: {}", from, e);
                }
            }
        }

        for (_, mut peer) in self.peers.drain() {
            peer.session.teardown().await;
        }
        tracing::info!("Datagram transport stopped");
        Ok(())
    }

    /// Bytes to send back for one packet, if any.
    async fn handle_packet(&mut self, packet: &[u8], from: SocketAddr) -> Option<Bytes> {
        let frame = match DatagramCodec::decode_packet(packet) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Dropping datagram from {}: {}", from, e);
                return None;
            }
        };

        let key = match self.options.session_mode {
            SessionMode::Single => None,
            SessionMode::Multi => Some(from),
        };
        if !self.peers.contains_key(&key) {
            if self.peers.len() >= self.options.max_sessions && !self.evict_one().await {
                tracing::warn!(
                    "Session limit {} reached, dropping datagram from {}",
                    self.options.max_sessions,
                    from
                );
                return None;
            }
            tracing::info!("Datagram session started by {}", from);
        }

        let peer = self
            .peers
            .entry(key)
            .or_insert_with(|| PeerState::new(from));
        peer.session.set_peer(from);
        peer.last_seen = Instant::now();

        match peer.sequencer.admit(frame.header.stream_or_seq, packet) {
            Admission::Execute => {
                execute(&self.dispatcher, &self.codec, peer, &frame, packet).await
            }
            Admission::Resend(cached) => {
                tracing::debug!(
                    "Resending last response to {} for index {}",
                    from,
                    frame.header.stream_or_seq
                );
                Some(cached)
            }
        }
    }

    /// Drop one session to make room. Returns false if none may go.
    async fn evict_one(&mut self) -> bool {
        let idle_timeout = self.options.idle_timeout;
        let victim = oldest(&self.peers, |peer| peer.session.streams().is_empty())
            .or_else(|| oldest(&self.peers, |peer| peer.last_seen.elapsed() >= idle_timeout));

        let Some(mut peer) = victim.and_then(|key| self.peers.remove(&key)) else {
            return false;
        };
        tracing::info!(
            "Evicting datagram session {:?} (silent for {:?})",
            peer.session.peer(),
            peer.last_seen.elapsed()
        );
        peer.session.teardown().await;
        true
    }
}

/// Least recently heard peer matching `eligible`.
fn oldest<F>(peers: &HashMap<PeerKey, PeerState>, eligible: F) -> Option<PeerKey>
where
    F: Fn(&PeerState) -> bool,
{
    peers
        .iter()
        .filter(|(_, peer)| eligible(peer))
        .min_by_key(|(_, peer)| peer.last_seen)
        .map(|(key, _)| *key)
}

async fn execute(
    dispatcher: &Dispatcher,
    codec: &DatagramCodec,
    peer: &mut PeerState,
    frame: &Frame,
    packet: &[u8],
) -> Option<Bytes> {
    let request = match frame.request(codec.layout()) {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!("Dropping frame from {:?}: {}", peer.session.peer(), e);
            return None;
        }
    };

    let outcome = dispatcher.dispatch(&mut peer.session, request).await;
    let response = codec.encode(frame, &outcome)?;
    peer.sequencer.record(Bytes::copy_from_slice(packet), response.clone());
    Some(response)
}
