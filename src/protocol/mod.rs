//! Protocol module - wire format, framing, and frame types.
//!
//! This module implements the binary command protocol spoken by the device:
//! - 16-byte header encoding/decoding in stream and datagram layouts
//! - Frame buffer for reassembling frames split across stream reads
//! - Frame struct, typed requests and dispatch outcomes

mod frame;
mod frame_buffer;
mod wire_format;

pub(crate) use frame::size_mismatch;
pub use frame::{build_frame, Frame, Outcome, Request};
pub use frame_buffer::FrameBuffer;
pub use wire_format::{
    opcode, Command, Header, Layout, OpenMode, CLOSE_FAILED, DATAGRAM_RESPONSE_SIZE,
    DEFAULT_DATAGRAM_PORT, DEFAULT_MAX_PAYLOAD_SIZE, DEFAULT_STREAM_PORT, HEADER_SIZE,
    MAX_DATAGRAM_SIZE,
};
