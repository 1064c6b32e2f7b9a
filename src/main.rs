//! sdsio-server - host side of the SDS I/O bridge.
//!
//! Listens for a recording device over TCP (port 5050) or UDP (port 5000)
//! and writes every stream it opens to `<name>.<N>.sds` in the output
//! directory.
//!
//! ```text
//! sdsio-server --transport udp --output-dir captures
//! sdsio-server --config sdsio.toml --multi-session
//! ```

use std::error::Error;
use std::net::IpAddr;
use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sdsio_bridge::config::{BridgeConfig, SessionMode, Transport};
use sdsio_bridge::storage::FileNaming;
use sdsio_bridge::ServerBuilder;

#[derive(Parser, Debug)]
#[command(name = "sdsio-server", version, about = "SDS I/O stream recording bridge")]
struct Args {
    /// TOML configuration file; flags below override it
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Network transport
    #[arg(short, long, value_enum)]
    transport: Option<Transport>,

    /// Interface to bind
    #[arg(short, long)]
    bind: Option<IpAddr>,

    /// Port to bind (default 5050 for tcp, 5000 for udp)
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory stream files are written to
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output file naming scheme
    #[arg(long, value_enum)]
    naming: Option<FileNaming>,

    /// Serve several devices concurrently
    #[arg(long)]
    multi_session: bool,

    /// Concurrent session limit with --multi-session
    #[arg(long)]
    max_sessions: Option<usize>,
}

impl Args {
    fn into_config(self) -> Result<BridgeConfig, Box<dyn Error>> {
        let mut config = match &self.config {
            Some(path) => BridgeConfig::from_file(path)?,
            None => BridgeConfig::default(),
        };

        if let Some(transport) = self.transport {
            config.server.transport = transport;
        }
        if let Some(bind) = self.bind {
            config.server.bind_address = bind;
        }
        if let Some(port) = self.port {
            config.server.port = Some(port);
        }
        if let Some(dir) = self.output_dir {
            config.storage.output_dir = dir;
        }
        if let Some(naming) = self.naming {
            config.storage.naming = naming;
        }
        if self.multi_session {
            config.server.session_mode = SessionMode::Multi;
        }
        if let Some(limit) = self.max_sessions {
            config.server.max_sessions = limit;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = Args::parse().into_config()?;

    // RUST_LOG wins over the configured level
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.level))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let server = ServerBuilder::from_config(config).start().await?;
    tracing::info!(
        "Listening on {} ({:?}). Press Ctrl-C to stop.",
        server.local_addr(),
        server.transport()
    );

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down...");
    server.shutdown().await?;
    Ok(())
}
