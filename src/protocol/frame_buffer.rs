//! Frame buffer for accumulating partial reads on the stream transport.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine for handling fragmented frames:
//! - `WaitingForHeader`: Need at least 16 bytes
//! - `WaitingForPayload`: Header parsed, need N more payload bytes
//!
//! A single `push` may complete zero, one or many frames; whatever trails the
//! last complete frame is kept for the next call, byte for byte.
//!
//! # Example
//!
//! ```
//! use sdsio_bridge::protocol::{build_frame, FrameBuffer, Header, Layout, opcode};
//!
//! let bytes = build_frame(&Header::new(opcode::WRITE, 1, 0, 3), b"abc", Layout::Stream);
//! let mut buffer = FrameBuffer::new();
//!
//! assert!(buffer.push(&bytes[..5]).unwrap().is_empty());
//! let frames = buffer.push(&bytes[5..]).unwrap();
//! assert_eq!(frames.len(), 1);
//! ```

use bytes::{Bytes, BytesMut};

use super::wire_format::{Header, Layout, DEFAULT_MAX_PAYLOAD_SIZE, HEADER_SIZE};
use super::Frame;
use crate::error::Result;

/// State machine for frame parsing.
#[derive(Debug, Clone)]
enum State {
    /// Waiting for complete header (need 16 bytes).
    WaitingForHeader,
    /// Header parsed, waiting for payload bytes.
    WaitingForPayload { header: Header },
}

/// Buffer for accumulating incoming bytes and extracting complete frames.
pub struct FrameBuffer {
    /// Accumulated bytes from socket reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Maximum allowed payload size.
    max_payload_size: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    ///
    /// Default capacity: 8KB, max payload: 16MB.
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a new frame buffer with custom max payload size.
    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(8 * 1024),
            state: State::WaitingForHeader,
            max_payload_size,
        }
    }

    /// Push data into the buffer and extract all complete frames.
    ///
    /// Returns the complete frames in arrival order (possibly none).
    ///
    /// # Errors
    ///
    /// Returns error if a header announces more than `max_payload_size`
    /// bytes. The stream cannot be resynchronised after that, so the caller
    /// should drop the connection.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.try_extract_one()? {
            frames.push(frame);
        }

        Ok(frames)
    }

    /// Try to extract a single frame from the buffer.
    fn try_extract_one(&mut self) -> Result<Option<Frame>> {
        if let State::WaitingForHeader = self.state {
            let Some(header) = Header::decode(&self.buffer, Layout::Stream) else {
                return Ok(None);
            };
            header.validate(self.max_payload_size)?;

            let _ = self.buffer.split_to(HEADER_SIZE);
            self.state = State::WaitingForPayload { header };
        }

        let State::WaitingForPayload { header } = self.state else {
            return Ok(None);
        };

        let remaining = header.payload_size as usize;
        if self.buffer.len() < remaining {
            return Ok(None);
        }

        let payload = if remaining == 0 {
            Bytes::new()
        } else {
            self.buffer.split_to(remaining).freeze()
        };
        self.state = State::WaitingForHeader;

        Ok(Some(Frame::new(header, payload)))
    }

    /// Get the number of buffered bytes not yet part of a complete frame.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Whether a frame is partially received.
    pub fn has_partial_frame(&self) -> bool {
        !self.buffer.is_empty() || matches!(self.state, State::WaitingForPayload { .. })
    }

    /// Clear the buffer and reset state.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForHeader;
    }

    /// Get the current state for debugging.
    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::WaitingForHeader => "WaitingForHeader",
            State::WaitingForPayload { .. } => "WaitingForPayload",
        }
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{build_frame, opcode};

    /// Helper to create a valid stream-layout frame as bytes.
    fn make_frame_bytes(command: u32, stream_id: u32, payload: &[u8]) -> Vec<u8> {
        let header = Header::new(command, stream_id, 0, payload.len() as u32);
        build_frame(&header, payload, Layout::Stream)
    }

    #[test]
    fn test_single_complete_frame() {
        let mut buffer = FrameBuffer::new();
        let frame_bytes = make_frame_bytes(opcode::WRITE, 1, b"hello");

        let frames = buffer.push(&frame_bytes).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].command(), opcode::WRITE);
        assert_eq!(frames[0].header.stream_or_seq, 1);
        assert_eq!(&frames[0].payload[..], b"hello");
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_two_frames_in_one_push() {
        let mut buffer = FrameBuffer::new();

        let mut combined = make_frame_bytes(opcode::WRITE, 1, b"first");
        combined.extend(make_frame_bytes(opcode::CLOSE, 1, b""));

        let frames = buffer.push(&combined).unwrap();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].command(), opcode::WRITE);
        assert_eq!(frames[0].payload(), b"first");
        assert_eq!(frames[1].command(), opcode::CLOSE);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_header_split_then_payload_in_three_chunks() {
        let mut buffer = FrameBuffer::new();
        let payload = b"0123456789abcdefghij";
        let bytes = make_frame_bytes(opcode::WRITE, 7, payload);

        assert!(buffer.push(&bytes[..5]).unwrap().is_empty());
        assert_eq!(buffer.state_name(), "WaitingForHeader");
        assert_eq!(buffer.len(), 5);

        assert!(buffer.push(&bytes[5..16]).unwrap().is_empty());
        assert_eq!(buffer.state_name(), "WaitingForPayload");

        assert!(buffer.push(&bytes[16..22]).unwrap().is_empty());
        assert!(buffer.push(&bytes[22..30]).unwrap().is_empty());
        let frames = buffer.push(&bytes[30..]).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header.stream_or_seq, 7);
        assert_eq!(frames[0].header.payload_size, payload.len() as u32);
        assert_eq!(frames[0].payload(), payload);
        assert!(!buffer.has_partial_frame());
    }

    #[test]
    fn test_empty_payload() {
        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&make_frame_bytes(opcode::CLOSE, 3, b"")).unwrap();

        assert_eq!(frames.len(), 1);
        assert!(frames[0].payload.is_empty());
        assert_eq!(frames[0].header.payload_size, 0);
    }

    #[test]
    fn test_max_payload_validation() {
        let mut buffer = FrameBuffer::with_max_payload(100);
        let header = Header::new(opcode::WRITE, 1, 0, 1000);

        let result = buffer.push(&header.encode(Layout::Stream));

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_complete_frame_plus_trailing_partial() {
        let mut buffer = FrameBuffer::new();

        let frame1 = make_frame_bytes(opcode::WRITE, 1, b"first");
        let frame2 = make_frame_bytes(opcode::WRITE, 2, b"second");

        let mut data = frame1.clone();
        data.extend_from_slice(&frame2[..5]);

        let frames = buffer.push(&data).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header.stream_or_seq, 1);
        assert_eq!(buffer.len(), 5);

        let frames = buffer.push(&frame2[5..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header.stream_or_seq, 2);
        assert_eq!(frames[0].payload(), b"second");
    }

    #[test]
    fn test_byte_at_a_time() {
        let mut buffer = FrameBuffer::new();
        let frame_bytes = make_frame_bytes(opcode::OPEN, 0, b"Gyro\0");

        let mut all_frames = Vec::new();
        for byte in &frame_bytes {
            all_frames.extend(buffer.push(&[*byte]).unwrap());
        }

        assert_eq!(all_frames.len(), 1);
        assert_eq!(all_frames[0].command(), opcode::OPEN);
        assert_eq!(all_frames[0].payload(), b"Gyro\0");
    }

    #[test]
    fn test_clear_resets_state() {
        let mut buffer = FrameBuffer::new();
        let frame_bytes = make_frame_bytes(opcode::WRITE, 1, b"test");

        buffer.push(&frame_bytes[..HEADER_SIZE + 1]).unwrap();
        assert_eq!(buffer.state_name(), "WaitingForPayload");
        assert!(buffer.has_partial_frame());

        buffer.clear();

        assert_eq!(buffer.state_name(), "WaitingForHeader");
        assert!(buffer.is_empty());
        assert!(!buffer.has_partial_frame());

        let frames = buffer.push(&frame_bytes).unwrap();
        assert_eq!(frames.len(), 1);
    }
}
