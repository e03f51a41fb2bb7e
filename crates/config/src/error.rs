//! Config Error Types

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration loading.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Reading or merging one of the configuration sources failed.
    #[display("failed to load configuration")]
    Load,
    #[display("storage.encryption_key is not set")]
    MissingKey,
    #[display("invalid storage.encryption_key: {_0}")]
    InvalidKey(#[error(not(source))] &'static str),
    #[display("invalid configuration value for {_0}")]
    InvalidValue(#[error(not(source))] &'static str),
}
