//! Wire format encoding and decoding.
//!
//! Both transports use a 16-byte header of four little-endian `u32` words.
//! Only the position of the command word differs:
//!
//! ```text
//! Stream (TCP):
//! ┌──────────┬───────────┬──────────┬──────────────┐
//! │ Command  │ Stream ID │ Argument │ Payload size │
//! └──────────┴───────────┴──────────┴──────────────┘
//!
//! Datagram (UDP):
//! ┌──────────┬──────────┬──────────┬──────────────┐
//! │ Seq idx  │ Command  │ Argument │ Payload size │
//! └──────────┴──────────┴──────────┴──────────────┘
//! ```
//!
//! Datagram responses append a 4-byte result code (response size is always 4).

use crate::error::{Result, SdsioError};

/// Header size in bytes (fixed, exactly 16).
pub const HEADER_SIZE: usize = 16;

/// Size of every datagram response: header plus one result word.
pub const DATAGRAM_RESPONSE_SIZE: usize = HEADER_SIZE + 4;

/// Upper bound for a single datagram (one Ethernet MTU).
pub const MAX_DATAGRAM_SIZE: usize = 1500;

/// Default maximum payload accepted on the stream transport (16 MiB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 16 * 1024 * 1024;

/// Result code returned by a failed Close.
pub const CLOSE_FAILED: u32 = u32::MAX;

/// Default TCP port of the stream transport.
pub const DEFAULT_STREAM_PORT: u16 = 5050;

/// Default UDP port of the datagram transport.
pub const DEFAULT_DATAGRAM_PORT: u16 = 5000;

/// Raw opcode values.
pub mod opcode {
    /// Open a stream.
    pub const OPEN: u32 = 1;
    /// Close a stream.
    pub const CLOSE: u32 = 2;
    /// Append payload to a stream.
    pub const WRITE: u32 = 3;
    /// Read from a stream (never served by the bridge).
    pub const READ: u32 = 4;
}

/// Decoded command opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Open,
    Close,
    Write,
    Read,
}

impl Command {
    /// Wire value of this command.
    #[inline]
    pub fn code(self) -> u32 {
        match self {
            Command::Open => opcode::OPEN,
            Command::Close => opcode::CLOSE,
            Command::Write => opcode::WRITE,
            Command::Read => opcode::READ,
        }
    }
}

impl TryFrom<u32> for Command {
    type Error = SdsioError;

    fn try_from(value: u32) -> Result<Self> {
        match value {
            opcode::OPEN => Ok(Command::Open),
            opcode::CLOSE => Ok(Command::Close),
            opcode::WRITE => Ok(Command::Write),
            opcode::READ => Ok(Command::Read),
            other => Err(SdsioError::UnknownCommand(other)),
        }
    }
}

/// Mode carried in the argument word of an Open request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

impl OpenMode {
    /// Decode the argument word; `None` for values outside the enum.
    pub fn from_argument(argument: u32) -> Option<Self> {
        match argument {
            0 => Some(OpenMode::Read),
            1 => Some(OpenMode::Write),
            _ => None,
        }
    }

    /// Wire value of this mode.
    #[inline]
    pub fn argument(self) -> u32 {
        match self {
            OpenMode::Read => 0,
            OpenMode::Write => 1,
        }
    }
}

/// Field order of the header, one per transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// `command | stream_id | argument | payload_size`
    Stream,
    /// `sequence_index | command | argument | payload_size`
    Datagram,
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Raw command opcode.
    pub command: u32,
    /// Stream id (stream layout) or sequence index (datagram layout).
    pub stream_or_seq: u32,
    /// Command argument (open mode, or stream id on the datagram layout).
    pub argument: u32,
    /// Number of payload bytes following the header.
    pub payload_size: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(command: u32, stream_or_seq: u32, argument: u32, payload_size: u32) -> Self {
        Self {
            command,
            stream_or_seq,
            argument,
            payload_size,
        }
    }

    /// Encode header to bytes (little endian) in the given layout.
    ///
    /// # Example
    ///
    /// ```
    /// use sdsio_bridge::protocol::{Header, Layout, opcode};
    ///
    /// let header = Header::new(opcode::WRITE, 3, 0, 100);
    /// let bytes = header.encode(Layout::Stream);
    /// assert_eq!(bytes.len(), 16);
    /// assert_eq!(bytes[0], 3);
    /// ```
    pub fn encode(&self, layout: Layout) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf, layout);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (16 bytes).
    pub fn encode_into(&self, buf: &mut [u8], layout: Layout) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        let (first, second) = match layout {
            Layout::Stream => (self.command, self.stream_or_seq),
            Layout::Datagram => (self.stream_or_seq, self.command),
        };
        buf[0..4].copy_from_slice(&first.to_le_bytes());
        buf[4..8].copy_from_slice(&second.to_le_bytes());
        buf[8..12].copy_from_slice(&self.argument.to_le_bytes());
        buf[12..16].copy_from_slice(&self.payload_size.to_le_bytes());
    }

    /// Decode header from bytes (little endian).
    ///
    /// Returns `None` if buffer is too short.
    pub fn decode(buf: &[u8], layout: Layout) -> Option<Self> {
        if buf.len() < HEADER_SIZE {
            return None;
        }
        let word = |i: usize| u32::from_le_bytes([buf[i], buf[i + 1], buf[i + 2], buf[i + 3]]);
        let (command, stream_or_seq) = match layout {
            Layout::Stream => (word(0), word(4)),
            Layout::Datagram => (word(4), word(0)),
        };
        Some(Self {
            command,
            stream_or_seq,
            argument: word(8),
            payload_size: word(12),
        })
    }

    /// Validate the announced payload size against a limit.
    pub fn validate(&self, max_payload_size: u32) -> Result<()> {
        if self.payload_size > max_payload_size {
            return Err(SdsioError::Protocol(format!(
                "Payload size {} exceeds maximum {}",
                self.payload_size, max_payload_size
            )));
        }
        Ok(())
    }

    /// Decode the opcode.
    #[inline]
    pub fn command(&self) -> Result<Command> {
        Command::try_from(self.command)
    }

    /// Full frame length (header + payload).
    #[inline]
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.payload_size as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_layout_byte_order() {
        let header = Header::new(0x01020304, 0x05060708, 0x090A0B0C, 0x0D0E0F10);
        let bytes = header.encode(Layout::Stream);

        assert_eq!(&bytes[0..4], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&bytes[4..8], &[0x08, 0x07, 0x06, 0x05]);
        assert_eq!(&bytes[8..12], &[0x0C, 0x0B, 0x0A, 0x09]);
        assert_eq!(&bytes[12..16], &[0x10, 0x0F, 0x0E, 0x0D]);
    }

    #[test]
    fn test_datagram_layout_puts_sequence_first() {
        let header = Header::new(opcode::WRITE, 42, 7, 8);
        let bytes = header.encode(Layout::Datagram);

        assert_eq!(u32::from_le_bytes(bytes[0..4].try_into().unwrap()), 42);
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), opcode::WRITE);

        let decoded = Header::decode(&bytes, Layout::Datagram).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_layouts_disagree_on_same_bytes() {
        let header = Header::new(opcode::CLOSE, 9, 0, 0);
        let bytes = header.encode(Layout::Stream);
        let misread = Header::decode(&bytes, Layout::Datagram).unwrap();
        assert_eq!(misread.command, 9);
        assert_eq!(misread.stream_or_seq, opcode::CLOSE);
    }

    #[test]
    fn test_decode_too_short_buffer() {
        let buf = [0u8; 15];
        assert!(Header::decode(&buf, Layout::Stream).is_none());
        assert!(Header::decode(&buf, Layout::Datagram).is_none());
    }

    #[test]
    fn test_command_try_from() {
        assert_eq!(Command::try_from(1).unwrap(), Command::Open);
        assert_eq!(Command::try_from(2).unwrap(), Command::Close);
        assert_eq!(Command::try_from(3).unwrap(), Command::Write);
        assert_eq!(Command::try_from(4).unwrap(), Command::Read);
        assert!(matches!(
            Command::try_from(0),
            Err(SdsioError::UnknownCommand(0))
        ));
        assert!(matches!(
            Command::try_from(99),
            Err(SdsioError::UnknownCommand(99))
        ));
    }

    #[test]
    fn test_command_code_matches_opcode() {
        for cmd in [Command::Open, Command::Close, Command::Write, Command::Read] {
            assert_eq!(Command::try_from(cmd.code()).unwrap(), cmd);
        }
    }

    #[test]
    fn test_open_mode_from_argument() {
        assert_eq!(OpenMode::from_argument(0), Some(OpenMode::Read));
        assert_eq!(OpenMode::from_argument(1), Some(OpenMode::Write));
        assert_eq!(OpenMode::from_argument(2), None);
    }

    #[test]
    fn test_validate_payload_too_large() {
        let header = Header::new(opcode::WRITE, 1, 0, 1_000_000);
        let result = header.validate(100);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("exceeds maximum"));
        assert!(header.validate(u32::MAX).is_ok());
    }

    #[test]
    fn test_frame_len() {
        assert_eq!(Header::new(3, 1, 0, 0).frame_len(), HEADER_SIZE);
        assert_eq!(Header::new(3, 1, 0, 24).frame_len(), HEADER_SIZE + 24);
    }
}
