//! Storage Error Types
//!
//! Same shape as everywhere else in hoard: an `exn` tree over a small enum of
//! actionable kinds. Cryptographic failures deliberately collapse into a
//! single [`ErrorKind::CorruptOrTampered`]; nobody downstream can do anything
//! useful with "which byte of the tag was wrong".

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Blob does not exist
    #[display("blob not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// Access denied by the operating system
    #[display("permission denied: {}", _0.display())]
    PermissionDenied(#[error(not(source))] PathBuf),
    /// Path would resolve outside of the storage root
    #[display("path escapes storage root: {}", _0.display())]
    PathTraversal(#[error(not(source))] PathBuf),
    /// Path is empty or otherwise unusable (but not an escape attempt)
    #[display("invalid path: {}", _0.display())]
    InvalidPath(#[error(not(source))] PathBuf),
    /// Authentication failed while decrypting, or the blob is truncated/garbled
    #[display("blob is corrupt or has been tampered with")]
    CorruptOrTampered,
    /// Not a lowercase, 64 character, hex-encoded SHA-256 digest
    #[display("invalid digest: {_0}")]
    InvalidDigest(#[error(not(source))] String),
    /// Key material has the wrong length or encoding
    #[display("invalid encryption key: {_0}")]
    InvalidKey(#[error(not(source))] &'static str),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
    /// Random number generator or cipher initialisation failure
    #[display("cipher failure")]
    Cipher,
    /// A blocking worker thread panicked or was cancelled
    #[display("blocking task failed")]
    Task,
    /// Backend-specific error
    #[display("backend error: {_0}")]
    BackendError(#[error(not(source))] String),
}
impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io(_) | Self::Task | Self::BackendError(_))
    }
}
