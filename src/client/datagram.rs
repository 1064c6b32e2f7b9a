//! UDP device client.
//!
//! Each request carries the client's packet index. A request is sent up to
//! `retries` times; after each send up to `retries` packets are read, each
//! bounded by `timeout`. A response is accepted only if it echoes the
//! request's index, command and argument and its length matches its size
//! field. Responses to older requests are skipped. The index advances only
//! once a valid response arrived, so a lost response makes the next attempt
//! reuse the same index and the bridge answers from its cache.
//!
//! [`DatagramClient::reconnect`] swaps the socket for a fresh one while the
//! index keeps counting, the way device firmware re-creates its socket after
//! closing its last stream.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;

use super::encode_name;
use crate::error::{Result, SdsioError};
use crate::protocol::{
    build_frame, opcode, Header, Layout, OpenMode, HEADER_SIZE, MAX_DATAGRAM_SIZE,
};

/// Per-receive timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

/// Send attempts per request, and receive attempts per send.
pub const DEFAULT_RETRIES: u32 = 3;

/// Client for the datagram transport.
pub struct DatagramClient {
    socket: UdpSocket,
    server: SocketAddr,
    packet_index: u32,
    timeout: Duration,
    retries: u32,
}

impl DatagramClient {
    /// Bind an ephemeral socket and connect it to the bridge.
    pub async fn connect(server: SocketAddr) -> Result<Self> {
        Ok(Self {
            socket: bind_to(server).await?,
            server,
            packet_index: 0,
            timeout: DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
        })
    }

    /// Set the per-receive timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the retry count (at least 1).
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries.max(1);
        self
    }

    /// Index the next request will carry.
    pub fn packet_index(&self) -> u32 {
        self.packet_index
    }

    /// Replace the socket with a new ephemeral one. The packet index is kept.
    pub async fn reconnect(&mut self) -> Result<()> {
        self.socket = bind_to(self.server).await?;
        Ok(())
    }

    /// Local address of the client socket.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    /// Open a stream and return its id.
    pub async fn open(&mut self, name: &str, mode: OpenMode) -> Result<u32> {
        let payload = encode_name(name)?;
        let id = self
            .request_word(opcode::OPEN, mode.argument(), &payload)
            .await?;
        if id == 0 {
            return Err(SdsioError::Rejected {
                command: opcode::OPEN,
                result: id,
            });
        }
        Ok(id)
    }

    /// Close stream `id`.
    pub async fn close(&mut self, id: u32) -> Result<()> {
        let result = self.request_word(opcode::CLOSE, id, &[]).await?;
        if result != 0 {
            return Err(SdsioError::Rejected {
                command: opcode::CLOSE,
                result,
            });
        }
        Ok(())
    }

    /// Append `data` to stream `id`, returning the byte count the bridge wrote.
    ///
    /// `data` must fit in a single datagram.
    pub async fn write(&mut self, id: u32, data: &[u8]) -> Result<u32> {
        let limit = MAX_DATAGRAM_SIZE - HEADER_SIZE;
        if data.len() > limit {
            return Err(SdsioError::Protocol(format!(
                "Write of {} bytes exceeds datagram payload limit {}",
                data.len(),
                limit
            )));
        }
        self.request_word(opcode::WRITE, id, data).await
    }

    async fn request_word(&mut self, command: u32, argument: u32, payload: &[u8]) -> Result<u32> {
        let data = self.transfer(command, argument, payload).await?;
        let word: [u8; 4] = data[..].try_into().map_err(|_| {
            SdsioError::Protocol(format!("Expected 4-byte result, got {}", data.len()))
        })?;
        Ok(u32::from_le_bytes(word))
    }

    /// Send one request and return the data of its valid response.
    async fn transfer(&mut self, command: u32, argument: u32, payload: &[u8]) -> Result<Bytes> {
        let header = Header::new(command, self.packet_index, argument, payload.len() as u32);
        let request = build_frame(&header, payload, Layout::Datagram);
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        for attempt in 0..self.retries {
            if let Err(e) = self.socket.send(&request).await {
                tracing::debug!("Send attempt {} failed: {}", attempt + 1, e);
                continue;
            }

            for _ in 0..self.retries {
                let n = match tokio::time::timeout(self.timeout, self.socket.recv(&mut buf)).await
                {
                    Ok(Ok(n)) => n,
                    Ok(Err(e)) => {
                        tracing::debug!("Receive failed: {}", e);
                        break;
                    }
                    Err(_) => break,
                };

                let Some(response) = Header::decode(&buf[..n], Layout::Datagram) else {
                    continue;
                };
                if response.stream_or_seq < self.packet_index {
                    // Answer to an older request
                    continue;
                }
                if buf[..12] == request[..12] && n == response.frame_len() {
                    self.packet_index = self.packet_index.wrapping_add(1);
                    return Ok(Bytes::copy_from_slice(&buf[HEADER_SIZE..n]));
                }
                break;
            }
        }

        Err(SdsioError::NoResponse(self.retries))
    }
}

async fn bind_to(server: SocketAddr) -> Result<UdpSocket> {
    let local: SocketAddr = match server {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = UdpSocket::bind(local).await?;
    socket.connect(server).await?;
    Ok(socket)
}
