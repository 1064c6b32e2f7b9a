//! Simulated Device - records synthetic sensor data through a running bridge.
//!
//! This example demonstrates:
//! - Driving the stream transport with [`StreamClient`]
//! - Driving the datagram transport with [`DatagramClient`], including the
//!   socket re-creation a device performs after closing its last stream
//! - Open -> Write x N -> Close cycles, one recording per cycle
//!
//! # Running
//!
//! ```text
//! cargo run --bin sdsio-server -- --transport udp --output-dir captures
//! cargo run --example simulated_device -- --transport udp --recordings 3
//! ```
//!
//! Each recording lands in `captures/<name>.<N>.sds`.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sdsio_bridge::client::{DatagramClient, StreamClient};
use sdsio_bridge::protocol::OpenMode;
use sdsio_bridge::Transport;

#[derive(Parser, Debug)]
#[command(name = "simulated_device", about = "Stream synthetic samples to an SDS I/O bridge")]
struct Args {
    /// Transport the bridge listens on
    #[arg(short, long, value_enum, default_value = "tcp")]
    transport: Transport,

    /// Bridge host
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::LOCALHOST))]
    host: IpAddr,

    /// Bridge port (default 5050 for tcp, 5000 for udp)
    #[arg(short, long)]
    port: Option<u16>,

    /// Stream name
    #[arg(short, long, default_value = "Accelerometer")]
    name: String,

    /// Recordings to make
    #[arg(short, long, default_value_t = 1)]
    recordings: u32,

    /// Samples per recording
    #[arg(short, long, default_value_t = 100)]
    samples: u32,

    /// Pause between samples in milliseconds
    #[arg(long, default_value_t = 10)]
    interval_ms: u64,
}

/// One 3-axis sample: timestamp followed by x, y, z as little-endian i16.
fn sample(tick: u32) -> Vec<u8> {
    let phase = tick as f32 / 16.0;
    let mut record = tick.to_le_bytes().to_vec();
    for axis in [phase.sin(), phase.cos(), (phase * 0.5).sin()] {
        record.extend_from_slice(&((axis * 1000.0) as i16).to_le_bytes());
    }
    record
}

async fn record_tcp(args: &Args, server: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = StreamClient::connect(server).await?;
    for recording in 0..args.recordings {
        let id = client.open(&args.name).await?;
        tracing::info!("Recording {} opened as stream {}", recording, id);
        for tick in 0..args.samples {
            client.write(id, &sample(tick)).await?;
            tokio::time::sleep(Duration::from_millis(args.interval_ms)).await;
        }
        client.close(id).await?;
        tracing::info!("Recording {} closed", recording);
    }
    client.shutdown().await?;
    Ok(())
}

async fn record_udp(args: &Args, server: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let mut client = DatagramClient::connect(server).await?;
    for recording in 0..args.recordings {
        let id = client.open(&args.name, OpenMode::Write).await?;
        tracing::info!("Recording {} opened as stream {}", recording, id);
        for tick in 0..args.samples {
            client.write(id, &sample(tick)).await?;
            tokio::time::sleep(Duration::from_millis(args.interval_ms)).await;
        }
        client.close(id).await?;
        // Last stream closed: a device drops its socket here
        client.reconnect().await?;
        tracing::info!(
            "Recording {} closed, next packet index {}",
            recording,
            client.packet_index()
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let port = args.port.unwrap_or(args.transport.default_port());
    let server = SocketAddr::new(args.host, port);
    tracing::info!("Recording to {} over {:?}", server, args.transport);

    match args.transport {
        Transport::Tcp => record_tcp(&args, server).await,
        Transport::Udp => record_udp(&args, server).await,
    }
}
