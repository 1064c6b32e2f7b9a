//! Stream transport codec.
//!
//! Wraps [`FrameBuffer`] for decoding. Responses are only produced for Open:
//! `1 | new stream id (0 on failure) | argument echo | 0`. Close and Write are
//! silent on this transport; the device infers their status from file state.

use bytes::Bytes;

use super::FrameCodec;
use crate::error::Result;
use crate::protocol::{
    opcode, Frame, FrameBuffer, Header, Layout, Outcome, DEFAULT_MAX_PAYLOAD_SIZE,
};

/// Codec for the reliable byte-stream transport.
pub struct StreamCodec {
    buffer: FrameBuffer,
}

impl StreamCodec {
    /// Create a codec with the default payload limit.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a codec that rejects frames announcing more than
    /// `max_payload_size` payload bytes.
    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self {
            buffer: FrameBuffer::with_max_payload(max_payload_size),
        }
    }

    /// Whether a frame is partially received.
    pub fn has_partial_frame(&self) -> bool {
        self.buffer.has_partial_frame()
    }
}

impl Default for StreamCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameCodec for StreamCodec {
    fn layout(&self) -> Layout {
        Layout::Stream
    }

    fn decode(&mut self, bytes: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.push(bytes)
    }

    fn encode(&self, frame: &Frame, outcome: &Outcome) -> Option<Bytes> {
        let stream_id = match outcome {
            Outcome::Opened { stream_id } => *stream_id,
            Outcome::OpenFailed => 0,
            _ => return None,
        };
        let header = Header::new(opcode::OPEN, stream_id, frame.header.argument, 0);
        Some(Bytes::copy_from_slice(&header.encode(Layout::Stream)))
    }

    fn reset(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{build_frame, HEADER_SIZE};

    fn open_frame() -> Frame {
        Frame::from_parts(Header::new(opcode::OPEN, 0, 1, 6), b"Accel\0")
    }

    #[test]
    fn test_open_response_layout() {
        let codec = StreamCodec::new();
        let response = codec
            .encode(&open_frame(), &Outcome::Opened { stream_id: 5 })
            .unwrap();

        assert_eq!(response.len(), HEADER_SIZE);
        let header = Header::decode(&response, Layout::Stream).unwrap();
        assert_eq!(header, Header::new(opcode::OPEN, 5, 1, 0));
    }

    #[test]
    fn test_failed_open_reports_zero_id() {
        let codec = StreamCodec::new();
        let response = codec.encode(&open_frame(), &Outcome::OpenFailed).unwrap();
        let header = Header::decode(&response, Layout::Stream).unwrap();
        assert_eq!(header.stream_or_seq, 0);
    }

    #[test]
    fn test_close_and_write_are_silent() {
        let codec = StreamCodec::new();
        let close = Frame::new(Header::new(opcode::CLOSE, 1, 0, 0), Bytes::new());
        let write = Frame::from_parts(Header::new(opcode::WRITE, 1, 0, 1), b"x");

        assert!(codec.encode(&close, &Outcome::Closed).is_none());
        assert!(codec.encode(&close, &Outcome::CloseFailed).is_none());
        assert!(codec.encode(&write, &Outcome::Written { bytes: 1 }).is_none());
        assert!(codec.encode(&write, &Outcome::WriteFailed).is_none());
        assert!(codec.encode(&write, &Outcome::Rejected).is_none());
    }

    #[test]
    fn test_reset_discards_partial_frame() {
        let mut codec = StreamCodec::new();
        let bytes = build_frame(&Header::new(opcode::WRITE, 1, 0, 4), b"data", Layout::Stream);

        assert!(codec.decode(&bytes[..10]).unwrap().is_empty());
        assert!(codec.has_partial_frame());

        codec.reset();
        assert!(!codec.has_partial_frame());

        let frames = codec.decode(&bytes).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), b"data");
    }
}
