//! Engine Error Types
//!
//! These are the kinds callers branch on: a client error (bad path, too big,
//! not yours) versus something broken underneath (I/O, catalog). Lower-level
//! errors stay attached as children of the tree.

use derive_more::{Display, Error};
use hoard_storage::error::{Error as StorageError, ErrorKind as StorageErrorKind};

/// An engine error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Malformed virtual path or display name.
    #[display("invalid path: {_0}")]
    InvalidPath(#[error(not(source))] String),
    /// A blob path resolved outside of the storage root.
    #[display("path escapes storage root")]
    PathTraversal,
    #[display("file of {size} bytes exceeds the {max} byte upload limit")]
    TooLarge { size: u64, max: u64 },
    #[display("storage quota exceeded: {used} used + {incoming} incoming > {limit}")]
    QuotaExceeded { used: u64, incoming: u64, limit: u64 },
    #[display("not found")]
    NotFound,
    /// The record exists but belongs to somebody else. Deliberately says
    /// nothing more than that.
    #[display("access denied")]
    AccessDenied,
    #[display("already exists: {_0}")]
    AlreadyExists(#[error(not(source))] String),
    /// Stored ciphertext failed authentication.
    #[display("stored data is corrupt or has been tampered with")]
    CorruptOrTampered,
    #[display("storage I/O error")]
    Io,
    #[display("catalog error")]
    Catalog,
    /// A multi-step operation stopped part way; `step` names where.
    #[display("operation incomplete at step: {step}")]
    Incomplete { step: String },
}

impl ErrorKind {
    /// Wrap a storage error, keeping it as a child and picking the engine
    /// kind that matches it.
    #[track_caller]
    pub fn storage(err: StorageError) -> Error {
        let kind = match &*err {
            StorageErrorKind::PathTraversal(_) => ErrorKind::PathTraversal,
            StorageErrorKind::CorruptOrTampered => ErrorKind::CorruptOrTampered,
            _ => ErrorKind::Io,
        };
        err.raise(kind)
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io | Self::Catalog | Self::Incomplete { .. })
    }

    /// The caller sent something unacceptable, as opposed to the server
    /// failing.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidPath(_)
                | Self::TooLarge { .. }
                | Self::QuotaExceeded { .. }
                | Self::NotFound
                | Self::AccessDenied
                | Self::AlreadyExists(_)
        )
    }
}
