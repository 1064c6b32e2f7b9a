//! Codec module - turning transport bytes into frames and outcomes into bytes.
//!
//! Both transports share the [`FrameCodec`] contract:
//!
//! - [`StreamCodec`] - reassembles frames split or coalesced across TCP reads;
//!   only Open produces response bytes.
//! - [`DatagramCodec`] - one UDP packet is exactly one frame; every executed
//!   command gets a 20-byte response carrying its result code.
//!
//! # Example
//!
//! ```
//! use sdsio_bridge::codec::{DatagramCodec, FrameCodec};
//! use sdsio_bridge::protocol::{build_frame, Header, Layout, Outcome, opcode};
//!
//! let mut codec = DatagramCodec::new();
//! let packet = build_frame(&Header::new(opcode::CLOSE, 4, 2, 0), &[], Layout::Datagram);
//!
//! let frames = codec.decode(&packet).unwrap();
//! let response = codec.encode(&frames[0], &Outcome::Closed).unwrap();
//! assert_eq!(response.len(), 20);
//! ```

mod datagram;
mod stream;

use bytes::Bytes;

use crate::error::Result;
use crate::protocol::{Frame, Layout, Outcome};

pub use datagram::DatagramCodec;
pub use stream::StreamCodec;

/// Decode transport bytes into frames and encode dispatch outcomes.
pub trait FrameCodec: Send {
    /// Header layout this codec reads and writes.
    fn layout(&self) -> Layout;

    /// Consume received bytes and return every frame they complete.
    fn decode(&mut self, bytes: &[u8]) -> Result<Vec<Frame>>;

    /// Response bytes for `frame` given its outcome, or `None` if the
    /// transport sends nothing back.
    fn encode(&self, frame: &Frame, outcome: &Outcome) -> Option<Bytes>;

    /// Drop any partially received state (on disconnect).
    fn reset(&mut self);
}
