//! Raw byte storage underneath the blob store.
//!
//! A [`BlobBackend`] knows nothing about encryption or hashing: it moves
//! opaque bytes to and from relative paths. [`BlobStore`](crate::BlobStore)
//! layers the cipher and the sharded layout on top.

mod local;
#[cfg(feature = "mock")]
mod mock;

pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
use crate::error::Result;
use async_trait::async_trait;
use std::io::{Read, Write};
use std::path::Path;

pub type BoxSyncRead = Box<dyn Read + Send + 'static>;
pub type BoxBlobWriter = Box<dyn BlobWriter>;

/// Staged, all-or-nothing write.
///
/// Bytes written are invisible at the destination until [`commit`] returns
/// successfully. Dropping the writer without committing discards them, so a
/// crash or an error halfway through never leaves a partial blob behind.
///
/// [`commit`]: BlobWriter::commit
pub trait BlobWriter: Write + Send + 'static {
    /// Flush, sync and atomically publish the staged bytes.
    fn commit(self: Box<Self>) -> Result<()>;
}

/// Total and available bytes on the volume behind a backend.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Capacity {
    pub total: u64,
    pub free: u64,
}

/// Unified interface over where blob bytes physically live.
///
/// # Path Handling
/// Paths are relative to the backend root and implementations must run them
/// through [`validate_path`](crate::validate_path) before use. A path that
/// would escape the root is a
/// [`PathTraversal`](crate::error::ErrorKind::PathTraversal) error, never a
/// silent clamp.
///
/// # Streaming
/// Readers and writers are `'static` and blocking so they can be handed to
/// [`spawn_blocking`](tokio::task::spawn_blocking) with the cipher:
///
/// ```no_run
/// use std::path::Path;
/// use hoard_storage::backend::BlobBackend;
/// use hoard_storage::error::{ErrorKind, Result};
///
/// async fn copy_blob(backend: &dyn BlobBackend, from: &Path, to: &Path) -> Result<u64> {
///     let mut reader = backend.reader(from).await?;
///     let mut writer = backend.writer(to).await?;
///     tokio::task::spawn_blocking(move || -> Result<u64> {
///         let copied = std::io::copy(&mut reader, &mut writer).map_err(ErrorKind::Io)?;
///         writer.commit()?;
///         Ok(copied)
///     })
///     .await
///     .map_err(|_| ErrorKind::Task)?
/// }
/// ```
#[async_trait]
pub trait BlobBackend: Send + Sync {
    /// Name of the configured backend, used for logging only.
    fn name(&self) -> &str;

    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Size in bytes of the stored (encrypted) blob.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the blob
    /// does not exist.
    async fn size(&self, path: &Path) -> Result<u64>;

    /// Open a blob for streaming reads.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the blob
    /// does not exist.
    async fn reader(&self, path: &Path) -> Result<BoxSyncRead>;

    /// Start a staged write to `path`. Parent directories are created as
    /// needed. An existing blob at `path` is replaced on commit.
    async fn writer(&self, path: &Path) -> Result<BoxBlobWriter>;

    /// Delete a blob.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the blob
    /// does not exist.
    async fn delete(&self, path: &Path) -> Result<()>;

    /// Capacity of the underlying volume.
    async fn capacity(&self) -> Result<Capacity>;
}
