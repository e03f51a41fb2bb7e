//! Local filesystem backend.
//!
//! Blobs are plain files under a root directory. Writes are staged in a
//! temporary file next to their destination and renamed into place, so a
//! blob is either fully present or not present at all.

use crate::backend::{BlobBackend, BlobWriter, BoxBlobWriter, BoxSyncRead, Capacity};
use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_path;
use async_trait::async_trait;
use exn::ResultExt;
use std::fs::{canonicalize as sync_canonicalize, create_dir_all as sync_create_dir};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;

/// Local filesystem storage backend.
///
/// # Examples
///
/// ```no_run
/// use hoard_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("local", "/var/lib/hoard/blobs")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct LocalBackend {
    name: String,
    /// Canonical root directory; every resolved path must stay under it.
    root: PathBuf,
}

impl LocalBackend {
    /// Create a new local filesystem backend, creating `root` if missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists but isn't a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidPath(root));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidPath(root));
            }
        } else {
            // Only happens once at startup; not worth an async constructor.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root))?;
        }
        let root = sync_canonicalize(&root).map_err(|e| Self::map_io_error(e, &root))?;
        Ok(Self { name: name.into(), root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Validate a relative path, join it onto the root, and make sure no
    /// symlink along the way points somewhere else.
    async fn absolute_path(&self, path: &Path) -> Result<PathBuf> {
        let validated = validate_path(path)?;
        let absolute = self.root.join(&validated);
        self.ensure_contained(&absolute, path).await?;
        Ok(absolute)
    }

    /// The deepest ancestor that exists must canonicalize to somewhere under
    /// the root. Everything below it will be created by us, as real
    /// directories.
    async fn ensure_contained(&self, absolute: &Path, requested: &Path) -> Result<()> {
        for ancestor in absolute.ancestors() {
            match fs::canonicalize(ancestor).await {
                Ok(resolved) if resolved.starts_with(&self.root) => return Ok(()),
                Ok(_) => exn::bail!(ErrorKind::PathTraversal(requested.to_path_buf())),
                Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                Err(e) => exn::bail!(Self::map_io_error(e, requested)),
            }
        }
        exn::bail!(ErrorKind::PathTraversal(requested.to_path_buf()))
    }

    fn map_io_error(e: io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            io::ErrorKind::NotFound => ErrorKind::NotFound(path.to_path_buf()),
            io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }
}

#[async_trait]
impl BlobBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let absolute = self.absolute_path(path).await?;
        fs::try_exists(&absolute).await.map_err(|e| Self::map_io_error(e, path).into())
    }

    async fn size(&self, path: &Path) -> Result<u64> {
        let absolute = self.absolute_path(path).await?;
        let metadata = fs::metadata(&absolute).await.map_err(|e| Self::map_io_error(e, path))?;
        Ok(metadata.len())
    }

    async fn reader(&self, path: &Path) -> Result<BoxSyncRead> {
        let absolute = self.absolute_path(path).await?;
        let file = fs::File::open(&absolute).await.map_err(|e| Self::map_io_error(e, path))?;
        Ok(Box::new(file.into_std().await))
    }

    async fn writer(&self, path: &Path) -> Result<BoxBlobWriter> {
        let absolute = self.absolute_path(path).await?;
        let parent = absolute
            .parent()
            .ok_or_else(|| ErrorKind::InvalidPath(path.to_path_buf()))?
            .to_path_buf();
        fs::create_dir_all(&parent).await.map_err(|e| Self::map_io_error(e, path))?;
        let staged = tokio::task::spawn_blocking(move || NamedTempFile::new_in(parent))
            .await
            .or_raise(|| ErrorKind::Task)?
            .map_err(|e| Self::map_io_error(e, path))?;
        tracing::trace!(
            backend = %self.name,
            path = %path.display(),
            staged = %staged.path().display(),
            "Staging blob write",
        );
        Ok(Box::new(StagedWriter { file: staged, destination: absolute }))
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let absolute = self.absolute_path(path).await?;
        fs::remove_file(&absolute).await.map_err(|e| Self::map_io_error(e, path))?;
        Ok(())
    }

    #[cfg(unix)]
    async fn capacity(&self) -> Result<Capacity> {
        let root = self.root.clone();
        let stats = tokio::task::spawn_blocking(move || nix::sys::statvfs::statvfs(&root))
            .await
            .or_raise(|| ErrorKind::Task)?
            .or_raise(|| ErrorKind::BackendError("statvfs failed".to_string()))?;
        let unit = stats.fragment_size() as u64;
        Ok(Capacity {
            total: (stats.blocks() as u64).saturating_mul(unit),
            free: (stats.blocks_available() as u64).saturating_mul(unit),
        })
    }

    #[cfg(not(unix))]
    async fn capacity(&self) -> Result<Capacity> {
        exn::bail!(ErrorKind::BackendError("capacity is only available on unix".to_string()))
    }
}

/// Temp file in the destination directory, renamed over the destination on
/// commit. Same directory means same filesystem, so the rename is atomic.
struct StagedWriter {
    file: NamedTempFile,
    destination: PathBuf,
}

impl Write for StagedWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

impl BlobWriter for StagedWriter {
    fn commit(self: Box<Self>) -> Result<()> {
        let StagedWriter { mut file, destination } = *self;
        file.flush().map_err(ErrorKind::Io)?;
        file.as_file().sync_all().map_err(ErrorKind::Io)?;
        file.persist(&destination).map_err(|e| ErrorKind::Io(e.error))?;
        Ok(())
    }
}
