//! Error types for sdsio-bridge.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for all bridge operations.
#[derive(Debug, Error)]
pub enum SdsioError {
    /// Socket receive/send/accept failure.
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Malformed frame or protocol violation.
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Opcode outside the known command set.
    #[error("Unknown command opcode: {0}")]
    UnknownCommand(u32),

    /// File could not be created, written or closed.
    #[error("Filesystem error on {}: {source}", path.display())]
    Filesystem {
        /// File the operation was applied to.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Close/Write referenced a stream that is not open in this session.
    #[error("Unknown stream id: {0}")]
    UnknownStream(u32),

    /// Stream base name rejected before touching the filesystem.
    #[error("Invalid stream name: {0:?}")]
    InvalidName(String),

    /// Open requested a mode other than write.
    #[error("Unsupported open mode: {0}")]
    UnsupportedMode(u32),

    /// The process-wide stream id counter ran out.
    #[error("Stream identifiers exhausted")]
    IdsExhausted,

    /// Invalid or unreadable configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parsing error (configuration files only).
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Peer closed the connection.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Datagram request got no valid response after all retries.
    #[error("No valid response after {0} attempts")]
    NoResponse(u32),

    /// The server answered with a failure result code.
    #[error("Request rejected by server: command {command}, result {result:#010x}")]
    Rejected {
        /// Command opcode of the rejected request.
        command: u32,
        /// Result code returned by the server.
        result: u32,
    },
}

/// Coarse error classes used to decide how a loop reacts to a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Fatal for a stream connection, logged and skipped for datagrams.
    Transport,
    /// Frame is dropped, processing continues.
    Protocol,
    /// Reported to the device through the result code only.
    Filesystem,
    /// Startup configuration problem.
    Config,
}

impl SdsioError {
    /// Classify this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            SdsioError::Transport(_)
            | SdsioError::ConnectionClosed
            | SdsioError::NoResponse(_)
            | SdsioError::Rejected { .. } => ErrorClass::Transport,
            SdsioError::Protocol(_) | SdsioError::UnknownCommand(_) => ErrorClass::Protocol,
            SdsioError::Filesystem { .. }
            | SdsioError::UnknownStream(_)
            | SdsioError::InvalidName(_)
            | SdsioError::UnsupportedMode(_)
            | SdsioError::IdsExhausted => ErrorClass::Filesystem,
            SdsioError::Config(_) | SdsioError::Toml(_) => ErrorClass::Config,
        }
    }
}

/// Result type alias using SdsioError.
pub type Result<T> = std::result::Result<T, SdsioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_stream_is_filesystem_class() {
        assert_eq!(SdsioError::UnknownStream(7).class(), ErrorClass::Filesystem);
    }

    #[test]
    fn test_io_error_converts_to_transport() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        let err: SdsioError = io.into();
        assert_eq!(err.class(), ErrorClass::Transport);
        assert!(err.to_string().contains("reset"));
    }

    #[test]
    fn test_filesystem_error_mentions_path() {
        let err = SdsioError::Filesystem {
            path: PathBuf::from("out/Accel.0.sds"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert!(err.to_string().contains("out/Accel.0.sds"));
        assert_eq!(err.class(), ErrorClass::Filesystem);
    }

    #[test]
    fn test_unknown_command_is_protocol_class() {
        let err = SdsioError::UnknownCommand(9);
        assert_eq!(err.class(), ErrorClass::Protocol);
        assert_eq!(err.to_string(), "Unknown command opcode: 9");
    }
}
