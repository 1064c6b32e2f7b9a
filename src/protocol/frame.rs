//! Frame struct, typed requests and dispatch outcomes.
//!
//! A [`Frame`] is what the codecs produce: a header plus its payload, exactly
//! as received. [`Frame::request`] lifts it into a [`Request`], resolving where
//! the stream id lives for the given [`Layout`]. The dispatcher answers with an
//! [`Outcome`], which each codec turns into response bytes (or none).
//!
//! # Example
//!
//! ```
//! use sdsio_bridge::protocol::{Frame, Header, Layout, Request, opcode};
//! use bytes::Bytes;
//!
//! let header = Header::new(opcode::WRITE, 2, 0, 5);
//! let frame = Frame::new(header, Bytes::from_static(b"hello"));
//!
//! match frame.request(Layout::Stream).unwrap() {
//!     Request::Write { stream_id, data } => {
//!         assert_eq!(stream_id, 2);
//!         assert_eq!(&data[..], b"hello");
//!     }
//!     other => panic!("unexpected {other:?}"),
//! }
//! ```

use bytes::Bytes;

use super::wire_format::{Command, Header, Layout, CLOSE_FAILED, HEADER_SIZE};
use crate::error::{Result, SdsioError};

/// A complete protocol frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from header and payload.
    pub fn new(header: Header, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Create a frame from header and raw bytes (copies data).
    pub fn from_parts(header: Header, payload: &[u8]) -> Self {
        Self {
            header,
            payload: Bytes::copy_from_slice(payload),
        }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the raw command opcode.
    #[inline]
    pub fn command(&self) -> u32 {
        self.header.command
    }

    /// Interpret this frame as a typed request.
    ///
    /// Open carries its mode in the argument word on both layouts. The stream
    /// id of Close/Write/Read sits in the second header word on the stream
    /// layout and in the argument word on the datagram layout.
    pub fn request(&self, layout: Layout) -> Result<Request> {
        let command = self.header.command()?;
        let stream_id = match layout {
            Layout::Stream => self.header.stream_or_seq,
            Layout::Datagram => self.header.argument,
        };

        Ok(match command {
            Command::Open => Request::Open {
                mode: self.header.argument,
                name: self.payload.clone(),
            },
            Command::Close => Request::Close { stream_id },
            Command::Write => Request::Write {
                stream_id,
                data: self.payload.clone(),
            },
            Command::Read => Request::Read { stream_id },
        })
    }
}

/// A request the dispatcher can execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Create a new output file. `name` is the raw, NUL-terminated base name.
    Open { mode: u32, name: Bytes },
    /// Close an open stream.
    Close { stream_id: u32 },
    /// Append bytes to an open stream.
    Write { stream_id: u32, data: Bytes },
    /// Read back from a stream. Never served.
    Read { stream_id: u32 },
}

impl Request {
    /// Command this request was decoded from.
    pub fn command(&self) -> Command {
        match self {
            Request::Open { .. } => Command::Open,
            Request::Close { .. } => Command::Close,
            Request::Write { .. } => Command::Write,
            Request::Read { .. } => Command::Read,
        }
    }
}

/// Result of dispatching one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Opened { stream_id: u32 },
    OpenFailed,
    Closed,
    CloseFailed,
    Written { bytes: u32 },
    WriteFailed,
    /// Request refused without touching any file; produces no response.
    Rejected,
}

impl Outcome {
    /// Result word reported to the device, `None` if nothing is sent back.
    pub fn result_code(&self) -> Option<u32> {
        match *self {
            Outcome::Opened { stream_id } => Some(stream_id),
            Outcome::OpenFailed => Some(0),
            Outcome::Closed => Some(0),
            Outcome::CloseFailed => Some(CLOSE_FAILED),
            Outcome::Written { bytes } => Some(bytes),
            Outcome::WriteFailed => Some(0),
            Outcome::Rejected => None,
        }
    }

    /// Whether the operation succeeded.
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Outcome::Opened { .. } | Outcome::Closed | Outcome::Written { .. }
        )
    }
}

/// Build a complete frame as a single byte vector.
///
/// # Example
///
/// ```
/// use sdsio_bridge::protocol::{build_frame, Header, Layout, opcode};
///
/// let header = Header::new(opcode::WRITE, 1, 0, 5);
/// let bytes = build_frame(&header, b"hello", Layout::Stream);
/// assert_eq!(bytes.len(), 16 + 5);
/// ```
pub fn build_frame(header: &Header, payload: &[u8], layout: Layout) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode(layout));
    buf.extend_from_slice(payload);
    buf
}

/// Error returned for frames whose payload length disagrees with the header.
pub(crate) fn size_mismatch(announced: u32, actual: usize) -> SdsioError {
    SdsioError::Protocol(format!(
        "Payload size {} does not match {} received bytes",
        announced, actual
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::opcode;

    #[test]
    fn test_frame_creation() {
        let header = Header::new(opcode::WRITE, 1, 0, 5);
        let frame = Frame::new(header, Bytes::from_static(b"hello"));

        assert_eq!(frame.command(), opcode::WRITE);
        assert_eq!(frame.payload(), b"hello");
    }

    #[test]
    fn test_open_request_keeps_raw_name() {
        let header = Header::new(opcode::OPEN, 0, 1, 6);
        let frame = Frame::from_parts(header, b"Accel\0");

        let request = frame.request(Layout::Stream).unwrap();
        assert_eq!(
            request,
            Request::Open {
                mode: 1,
                name: Bytes::from_static(b"Accel\0"),
            }
        );
    }

    #[test]
    fn test_stream_layout_takes_id_from_second_word() {
        let frame = Frame::new(Header::new(opcode::CLOSE, 5, 77, 0), Bytes::new());
        assert_eq!(
            frame.request(Layout::Stream).unwrap(),
            Request::Close { stream_id: 5 }
        );
    }

    #[test]
    fn test_datagram_layout_takes_id_from_argument() {
        let frame = Frame::from_parts(Header::new(opcode::WRITE, 12, 3, 2), b"ab");
        assert_eq!(
            frame.request(Layout::Datagram).unwrap(),
            Request::Write {
                stream_id: 3,
                data: Bytes::from_static(b"ab"),
            }
        );
    }

    #[test]
    fn test_unknown_opcode_is_rejected() {
        let frame = Frame::new(Header::new(42, 1, 0, 0), Bytes::new());
        assert!(matches!(
            frame.request(Layout::Stream),
            Err(SdsioError::UnknownCommand(42))
        ));
    }

    #[test]
    fn test_read_request_decodes() {
        let frame = Frame::new(Header::new(opcode::READ, 0, 4, 0), Bytes::new());
        let request = frame.request(Layout::Datagram).unwrap();
        assert_eq!(request, Request::Read { stream_id: 4 });
        assert_eq!(request.command(), Command::Read);
    }

    #[test]
    fn test_outcome_result_codes() {
        assert_eq!(Outcome::Opened { stream_id: 3 }.result_code(), Some(3));
        assert_eq!(Outcome::OpenFailed.result_code(), Some(0));
        assert_eq!(Outcome::Closed.result_code(), Some(0));
        assert_eq!(Outcome::CloseFailed.result_code(), Some(0xFFFF_FFFF));
        assert_eq!(Outcome::Written { bytes: 10 }.result_code(), Some(10));
        assert_eq!(Outcome::WriteFailed.result_code(), Some(0));
        assert_eq!(Outcome::Rejected.result_code(), None);
    }

    #[test]
    fn test_outcome_success() {
        assert!(Outcome::Closed.is_success());
        assert!(!Outcome::CloseFailed.is_success());
        assert!(!Outcome::Rejected.is_success());
    }

    #[test]
    fn test_build_frame_roundtrip() {
        use super::super::FrameBuffer;

        let header = Header::new(opcode::WRITE, 9, 0, 10);
        let bytes = build_frame(&header, b"0123456789", Layout::Stream);

        let mut buffer = FrameBuffer::new();
        let frames = buffer.push(&bytes).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header, header);
        assert_eq!(frames[0].payload(), b"0123456789");
    }
}
