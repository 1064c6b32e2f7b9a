//! Handler module - request execution.
//!
//! Provides:
//! - [`Session`] - per-connection state owning the stream table
//! - [`Dispatcher`] - executes requests against a session
//!
//! # Example
//!
//! ```ignore
//! use sdsio_bridge::handler::{Dispatcher, Session};
//!
//! let mut session = Session::new(Some(peer));
//! let outcome = dispatcher.dispatch(&mut session, frame.request(layout)?).await;
//! ```

mod dispatcher;
mod session;

pub use dispatcher::Dispatcher;
pub use session::Session;
