//! SQLite metadata catalog.
//!
//! Every logical file a user sees is one row here: who owns it, what it's
//! called, which virtual folder it sits in, and which blob holds its bytes.
//! The catalog is the source of truth for ownership and for how many rows
//! still reference a blob. The blob store only knows about bytes.

mod db;
pub mod error;
mod models;
mod record;
mod repo;

pub use crate::db::Database;
pub use crate::record::{DIRECTORY_MIME, FileRecord, Usage, timestamp_now};
pub use crate::repo::{Purged, Repository};
