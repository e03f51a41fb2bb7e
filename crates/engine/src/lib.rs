//! The rules that turn a blob store and a catalog into a per-user virtual
//! filesystem: uploads with deduplication and quotas, folder views over flat
//! rows, a trash with reference-counted purges, and zip export.
//!
//! Operations are free functions taking the handles they need
//! ([`BlobStore`](hoard_storage::BlobStore),
//! [`Repository`](hoard_catalog::Repository), [`Context`]) so a caller can
//! share one set of handles across tasks. None of them hold locks.

pub mod error;
pub mod lifecycle;
pub mod path;
pub mod quota;
pub mod stats;
pub mod transfer;
pub mod vfs;

#[cfg(test)]
mod testing;

pub use crate::stats::{StorageStats, storage_stats};
pub use crate::transfer::{Upload, download, upload};

const GIB: u64 = 1 << 30;

/// Size ceilings applied to every user.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Limits {
    /// Per-user quota over active (non-trashed) plaintext bytes.
    pub storage_limit: u64,
    /// Largest single upload.
    pub max_upload_size: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self { storage_limit: 10 * GIB, max_upload_size: GIB }
    }
}

/// Settings shared by every operation.
#[derive(Clone, Debug)]
pub struct Context {
    pub limits: Limits,
}

impl Context {
    pub fn new(limits: Limits) -> Self {
        Self { limits }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new(Limits::default())
    }
}
