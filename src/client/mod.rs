//! Device-side clients.
//!
//! Speak the same protocol an embedded recorder does, so the bridge can be
//! driven from tests or from a host-side simulated device.
//!
//! - [`StreamClient`] - TCP; only Open is answered
//! - [`DatagramClient`] - UDP; every request is retried until a matching
//!   response arrives

mod datagram;
mod stream;

pub use datagram::{DatagramClient, DEFAULT_RETRIES, DEFAULT_TIMEOUT};
pub use stream::StreamClient;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Result, SdsioError};

/// Longest stream name a device may send, excluding the terminating NUL.
pub const MAX_NAME_LEN: usize = 15;

/// Validate `name` and append the NUL terminator the bridge expects.
fn encode_name(name: &str) -> Result<Bytes> {
    if name.is_empty() || name.len() > MAX_NAME_LEN || name.contains('\0') {
        return Err(SdsioError::InvalidName(name.to_string()));
    }
    let mut buf = BytesMut::with_capacity(name.len() + 1);
    buf.put_slice(name.as_bytes());
    buf.put_u8(0);
    Ok(buf.freeze())
}
