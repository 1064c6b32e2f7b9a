//! # sdsio-bridge
//!
//! Host side of the SDS I/O streaming protocol.
//!
//! An embedded recorder opens named streams, appends opaque bytes to them and
//! closes them again. This crate accepts those commands over the network and
//! persists every stream as a file on the host.
//!
//! ## Architecture
//!
//! ```text
//! socket bytes -> codec -> (sequencer, UDP only) -> dispatcher -> stream table / files
//!                   ^                                                   |
//!                   +----------------- response bytes <-----------------+
//! ```
//!
//! - **Stream transport** (TCP, port 5050): frames are reassembled from
//!   arbitrary read boundaries; only Open is answered.
//! - **Datagram transport** (UDP, port 5000): one frame per packet, every
//!   command answered, retransmissions never re-executed.
//!
//! ## Example
//!
//! ```no_run
//! use sdsio_bridge::{ServerBuilder, Transport};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let server = ServerBuilder::new()
//!         .transport(Transport::Tcp)
//!         .output_dir("captures")
//!         .start()
//!         .await?;
//!
//!     server.wait().await?;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod sequencer;
pub mod storage;
pub mod transport;

mod server;

pub use config::{BridgeConfig, SessionMode, Transport};
pub use error::{Result, SdsioError};
pub use server::{Server, ServerBuilder};
