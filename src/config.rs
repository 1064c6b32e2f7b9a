//! Bridge configuration.
//!
//! Loaded from a TOML file; every field has a default so a partial (or empty)
//! file is valid. Command-line flags are applied on top by the binary.
//!
//! ```toml
//! [server]
//! transport = "udp"
//! bind_address = "0.0.0.0"
//! session_mode = "multi"
//!
//! [storage]
//! output_dir = "captures"
//! naming = "legacy"
//!
//! [logging]
//! level = "debug"
//! ```

use std::fs;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, SdsioError};
use crate::protocol::{DEFAULT_DATAGRAM_PORT, DEFAULT_MAX_PAYLOAD_SIZE, DEFAULT_STREAM_PORT};
use crate::storage::FileNaming;

/// Default number of concurrent sessions in multi-session mode.
pub const DEFAULT_MAX_SESSIONS: usize = 8;

/// Default socket read buffer for the stream transport.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Default seconds of silence after which a datagram session holding open
/// streams may be evicted to make room for a new device.
pub const DEFAULT_SESSION_IDLE_TIMEOUT_SECS: u64 = 60;

/// Which network transport the bridge listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// Reliable byte stream, frames reassembled from arbitrary chunks.
    #[default]
    Tcp,
    /// Sequenced datagrams, one frame per packet.
    Udp,
}

impl Transport {
    /// Well-known port of this transport.
    pub fn default_port(self) -> u16 {
        match self {
            Transport::Tcp => DEFAULT_STREAM_PORT,
            Transport::Udp => DEFAULT_DATAGRAM_PORT,
        }
    }
}

/// How many devices may be connected at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionMode {
    /// One connection at a time; the next one is accepted after it ends.
    #[default]
    Single,
    /// Concurrent connections, each with its own streams and sequencing.
    Multi,
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: Transport,
    /// Interface to bind.
    pub bind_address: IpAddr,
    /// Port to bind; defaults to 5050 (tcp) or 5000 (udp).
    pub port: Option<u16>,
    pub session_mode: SessionMode,
    /// Upper bound on concurrent sessions in multi-session mode.
    pub max_sessions: usize,
    /// Largest payload a stream frame may announce.
    pub max_payload_size: u32,
    /// Bytes requested per socket read on the stream transport.
    pub read_buffer_size: usize,
    /// Seconds before a silent datagram session with open streams can be
    /// evicted when the session limit is reached.
    pub session_idle_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: Transport::default(),
            bind_address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: None,
            session_mode: SessionMode::default(),
            max_sessions: DEFAULT_MAX_SESSIONS,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            session_idle_timeout_secs: DEFAULT_SESSION_IDLE_TIMEOUT_SECS,
        }
    }
}

impl ServerConfig {
    /// Configured port, or the transport's default.
    pub fn port(&self) -> u16 {
        self.port.unwrap_or_else(|| self.transport.default_port())
    }

    /// Address to bind.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_address, self.port())
    }
}

/// Where stream files go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub output_dir: PathBuf,
    pub naming: FileNaming,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            naming: FileNaming::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error); `RUST_LOG` wins if set.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Example
    /// ```no_run
    /// use sdsio_bridge::config::BridgeConfig;
    ///
    /// let config = BridgeConfig::from_file("sdsio.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            SdsioError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        let config: BridgeConfig = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.max_sessions == 0 {
            return Err(SdsioError::Config("max_sessions must be at least 1".into()));
        }
        if self.server.read_buffer_size == 0 {
            return Err(SdsioError::Config(
                "read_buffer_size must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.server.transport, Transport::Tcp);
        assert_eq!(config.server.port(), 5050);
        assert_eq!(config.server.session_mode, SessionMode::Single);
        assert_eq!(config.storage.naming, FileNaming::Indexed);
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.server.socket_addr().to_string(), "0.0.0.0:5050");
    }

    #[test]
    fn test_udp_default_port() {
        let config: BridgeConfig = toml::from_str("[server]\ntransport = \"udp\"\n").unwrap();
        assert_eq!(config.server.port(), 5000);
    }

    #[test]
    fn test_empty_file_is_valid() {
        let config: BridgeConfig = toml::from_str("").unwrap();
        assert_eq!(config, BridgeConfig::default());
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_content = r#"
[server]
transport = "udp"
bind_address = "127.0.0.1"
port = 6000
session_mode = "multi"
max_sessions = 2

[storage]
output_dir = "captures"
naming = "legacy"

[logging]
level = "debug"
"#;

        let config: BridgeConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.server.transport, Transport::Udp);
        assert_eq!(config.server.socket_addr().to_string(), "127.0.0.1:6000");
        assert_eq!(config.server.session_mode, SessionMode::Multi);
        assert_eq!(config.server.max_sessions, 2);
        assert_eq!(config.server.read_buffer_size, DEFAULT_READ_BUFFER_SIZE);
        assert_eq!(
            config.server.session_idle_timeout_secs,
            DEFAULT_SESSION_IDLE_TIMEOUT_SECS
        );
        assert_eq!(config.storage.output_dir, PathBuf::from("captures"));
        assert_eq!(config.storage.naming, FileNaming::Legacy);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_unknown_transport_rejected() {
        let result: std::result::Result<BridgeConfig, _> =
            toml::from_str("[server]\ntransport = \"serial\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sdsio.toml");
        fs::write(&path, "[storage]\noutput_dir = \"out\"\n").unwrap();

        let config = BridgeConfig::from_file(&path).unwrap();
        assert_eq!(config.storage.output_dir, PathBuf::from("out"));
        assert_eq!(config.server.transport, Transport::Tcp);
    }

    #[test]
    fn test_from_missing_file() {
        let err = BridgeConfig::from_file("/nonexistent/sdsio.toml").unwrap_err();
        assert!(matches!(err, SdsioError::Config(_)));
    }

    #[test]
    fn test_zero_sessions_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sdsio.toml");
        fs::write(&path, "[server]\nmax_sessions = 0\n").unwrap();

        let err = BridgeConfig::from_file(&path).unwrap_err();
        assert!(err.to_string().contains("max_sessions"));
    }
}
