//! TCP device client.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::encode_name;
use crate::error::{Result, SdsioError};
use crate::protocol::{build_frame, opcode, Header, Layout, OpenMode, HEADER_SIZE};

/// Client for the stream transport.
///
/// Close and Write are fire-and-forget on this transport; only Open waits
/// for the bridge's answer.
pub struct StreamClient {
    stream: TcpStream,
}

impl StreamClient {
    /// Connect to a bridge.
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        Ok(Self { stream })
    }

    /// Open a stream for writing and return its id.
    pub async fn open(&mut self, name: &str) -> Result<u32> {
        let payload = encode_name(name)?;
        let header = Header::new(
            opcode::OPEN,
            0,
            OpenMode::Write.argument(),
            payload.len() as u32,
        );
        self.send(&header, &payload).await?;

        let mut response = [0u8; HEADER_SIZE];
        self.stream
            .read_exact(&mut response)
            .await
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::UnexpectedEof => SdsioError::ConnectionClosed,
                _ => SdsioError::Transport(e),
            })?;

        let header = Header::decode(&response, Layout::Stream)
            .ok_or_else(|| SdsioError::Protocol("Short Open response".into()))?;
        if header.command != opcode::OPEN {
            return Err(SdsioError::Protocol(format!(
                "Expected Open response, got command {}",
                header.command
            )));
        }

        match header.stream_or_seq {
            0 => Err(SdsioError::Rejected {
                command: opcode::OPEN,
                result: 0,
            }),
            id => Ok(id),
        }
    }

    /// Append `data` to stream `id`.
    pub async fn write(&mut self, id: u32, data: &[u8]) -> Result<()> {
        let header = Header::new(opcode::WRITE, id, 0, data.len() as u32);
        self.send(&header, data).await
    }

    /// Close stream `id`.
    pub async fn close(&mut self, id: u32) -> Result<()> {
        let header = Header::new(opcode::CLOSE, id, 0, 0);
        self.send(&header, &[]).await
    }

    /// Send raw bytes, bypassing framing.
    pub async fn send_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.stream.write_all(bytes).await?;
        Ok(())
    }

    /// Flush and close the connection.
    pub async fn shutdown(mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }

    async fn send(&mut self, header: &Header, payload: &[u8]) -> Result<()> {
        let frame = build_frame(header, payload, Layout::Stream);
        self.stream.write_all(&frame).await?;
        Ok(())
    }
}
