//! Datagram transport codec.
//!
//! Every packet is one complete frame, so no reassembly state is kept. Every
//! executed command is answered with:
//!
//! ```text
//! seq idx | command | argument | 4 | result
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::FrameCodec;
use crate::error::{Result, SdsioError};
use crate::protocol::{
    size_mismatch, Frame, Header, Layout, Outcome, DATAGRAM_RESPONSE_SIZE, HEADER_SIZE,
    MAX_DATAGRAM_SIZE,
};

/// Codec for the sequenced datagram transport.
#[derive(Debug, Default, Clone, Copy)]
pub struct DatagramCodec;

impl DatagramCodec {
    /// Create a new datagram codec.
    pub fn new() -> Self {
        Self
    }

    /// Decode exactly one frame from one packet.
    pub fn decode_packet(packet: &[u8]) -> Result<Frame> {
        if packet.len() > MAX_DATAGRAM_SIZE {
            return Err(SdsioError::Protocol(format!(
                "Datagram of {} bytes exceeds maximum {}",
                packet.len(),
                MAX_DATAGRAM_SIZE
            )));
        }
        let header = Header::decode(packet, Layout::Datagram).ok_or_else(|| {
            SdsioError::Protocol(format!(
                "Datagram of {} bytes is shorter than the {}-byte header",
                packet.len(),
                HEADER_SIZE
            ))
        })?;

        let body = &packet[HEADER_SIZE..];
        if header.payload_size as usize != body.len() {
            return Err(size_mismatch(header.payload_size, body.len()));
        }

        Ok(Frame::from_parts(header, body))
    }

    /// Build the 20-byte response for a request header and result code.
    pub fn response(request: &Header, result: u32) -> Bytes {
        let mut buf = BytesMut::with_capacity(DATAGRAM_RESPONSE_SIZE);
        let header = Header::new(request.command, request.stream_or_seq, request.argument, 4);
        buf.put_slice(&header.encode(Layout::Datagram));
        buf.put_u32_le(result);
        buf.freeze()
    }
}

impl FrameCodec for DatagramCodec {
    fn layout(&self) -> Layout {
        Layout::Datagram
    }

    fn decode(&mut self, bytes: &[u8]) -> Result<Vec<Frame>> {
        Self::decode_packet(bytes).map(|frame| vec![frame])
    }

    fn encode(&self, frame: &Frame, outcome: &Outcome) -> Option<Bytes> {
        outcome
            .result_code()
            .map(|result| Self::response(&frame.header, result))
    }

    fn reset(&mut self) {}
}
