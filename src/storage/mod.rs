//! Storage module - stream files on the host.
//!
//! - [`StreamStore`] - process-wide file allocation and id counter
//! - [`StreamTable`] - per-session map of open streams
//! - [`FileNaming`] - `<name>.<N>.sds` or legacy `<name><N>.sds`

mod naming;
mod store;
mod table;

pub use naming::{decode_base_name, FileNaming, SDS_EXTENSION};
pub use store::{StreamStore, FIRST_STREAM_ID};
pub use table::{StreamSession, StreamTable};
