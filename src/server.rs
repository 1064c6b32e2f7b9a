//! Server builder and runtime handle.
//!
//! The [`ServerBuilder`] provides a fluent API for configuring the bridge.
//! [`ServerBuilder::start`] manages the startup sequence:
//! 1. Create the output directory
//! 2. Build the shared stream store and dispatcher
//! 3. Bind the TCP listener or UDP socket
//! 4. Spawn the connection loop
//!
//! # Example
//!
//! ```no_run
//! use sdsio_bridge::{ServerBuilder, Transport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = ServerBuilder::new()
//!         .transport(Transport::Udp)
//!         .output_dir("captures")
//!         .start()
//!         .await?;
//!
//!     println!("listening on {}", server.local_addr());
//!     tokio::signal::ctrl_c().await?;
//!     server.shutdown().await?;
//!     Ok(())
//! }
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{BridgeConfig, SessionMode, Transport};
use crate::error::{Result, SdsioError};
use crate::handler::Dispatcher;
use crate::storage::{FileNaming, StreamStore};
use crate::transport::{LoopOptions, TcpBridge, UdpBridge};

/// Builder for configuring and starting a bridge server.
#[derive(Debug, Clone)]
pub struct ServerBuilder {
    config: BridgeConfig,
}

impl ServerBuilder {
    /// Builder with every setting at its default.
    pub fn new() -> Self {
        Self {
            config: BridgeConfig::default(),
        }
    }

    /// Builder seeded from a loaded configuration.
    pub fn from_config(config: BridgeConfig) -> Self {
        Self { config }
    }

    /// Select the transport. Default: TCP.
    pub fn transport(mut self, transport: Transport) -> Self {
        self.config.server.transport = transport;
        self
    }

    /// Interface to bind. Default: `0.0.0.0`.
    pub fn bind_address(mut self, address: IpAddr) -> Self {
        self.config.server.bind_address = address;
        self
    }

    /// Port to bind; 0 picks a free port. Default: the transport's port.
    pub fn port(mut self, port: u16) -> Self {
        self.config.server.port = Some(port);
        self
    }

    /// Directory stream files are created in. Default: current directory.
    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.storage.output_dir = dir.into();
        self
    }

    /// File naming scheme. Default: `<name>.<N>.sds`.
    pub fn naming(mut self, naming: FileNaming) -> Self {
        self.config.storage.naming = naming;
        self
    }

    /// Single or concurrent sessions. Default: single.
    pub fn session_mode(mut self, mode: SessionMode) -> Self {
        self.config.server.session_mode = mode;
        self
    }

    /// Maximum concurrent sessions in multi-session mode.
    pub fn max_sessions(mut self, limit: usize) -> Self {
        self.config.server.max_sessions = limit;
        self
    }

    /// Largest payload a stream frame may announce.
    pub fn max_payload_size(mut self, limit: u32) -> Self {
        self.config.server.max_payload_size = limit;
        self
    }

    /// Bytes requested per stream read.
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.config.server.read_buffer_size = size;
        self
    }

    /// Silence after which a datagram session with open streams may be
    /// evicted to admit a new device. Default: 60 seconds.
    pub fn session_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.server.session_idle_timeout_secs = timeout.as_secs();
        self
    }

    /// Configuration the server will start with.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    /// Bind and start serving.
    pub async fn start(self) -> Result<Server> {
        Server::start(self.config).await
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A running bridge.
pub struct Server {
    local_addr: SocketAddr,
    transport: Transport,
    store: Arc<StreamStore>,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<Result<()>>,
}

impl Server {
    /// Create a new server builder.
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }

    async fn start(config: BridgeConfig) -> Result<Self> {
        config.validate()?;

        let output_dir = &config.storage.output_dir;
        tokio::fs::create_dir_all(output_dir)
            .await
            .map_err(|source| SdsioError::Filesystem {
                path: output_dir.clone(),
                source,
            })?;

        let store = Arc::new(StreamStore::new(output_dir, config.storage.naming));
        let dispatcher = Dispatcher::new(store.clone());
        let options = LoopOptions::from(&config.server);
        let addr = config.server.socket_addr();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let transport = config.server.transport;
        let (local_addr, task) = match transport {
            Transport::Tcp => {
                let bridge = TcpBridge::bind(addr, dispatcher, options).await?;
                let local_addr = bridge.local_addr()?;
                (local_addr, tokio::spawn(bridge.run(shutdown_rx)))
            }
            Transport::Udp => {
                let bridge = UdpBridge::bind(addr, dispatcher, options).await?;
                let local_addr = bridge.local_addr()?;
                (local_addr, tokio::spawn(bridge.run(shutdown_rx)))
            }
        };

        tracing::info!(
            "SDS I/O bridge ({:?}, {:?} session) writing to {}",
            transport,
            options.session_mode,
            output_dir.display()
        );

        Ok(Server {
            local_addr,
            transport,
            store,
            shutdown_tx,
            task,
        })
    }

    /// Address the server is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Transport being served.
    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Shared stream store (output directory and id counter).
    pub fn store(&self) -> &Arc<StreamStore> {
        &self.store
    }

    /// Stop accepting, close every open stream and wait for the loop to end.
    pub async fn shutdown(self) -> Result<()> {
        let _ = self.shutdown_tx.send(true);
        Self::join(self.task).await
    }

    /// Wait until the loop ends on its own (or is shut down elsewhere).
    ///
    /// The server keeps its shutdown handle while waiting, so this only
    /// returns early if the loop fails.
    pub async fn wait(self) -> Result<()> {
        let Server {
            shutdown_tx, task, ..
        } = self;
        let result = Self::join(task).await;
        drop(shutdown_tx);
        result
    }

    async fn join(task: JoinHandle<Result<()>>) -> Result<()> {
        match task.await {
            Ok(result) => result,
            Err(e) => Err(SdsioError::Transport(std::io::Error::other(e))),
        }
    }
}
