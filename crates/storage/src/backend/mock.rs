//! In-memory storage backend for testing.

use crate::backend::{BlobBackend, BlobWriter, BoxBlobWriter, BoxSyncRead, Capacity};
use crate::error::{ErrorKind, Result};
use crate::path::validate as validate_path;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::{self, Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

type Storage = Arc<RwLock<HashMap<PathBuf, Vec<u8>>>>;

/// In-memory storage backend for testing.
///
/// Blobs live in a `HashMap` behind a std [`RwLock`]: writers commit from
/// inside `spawn_blocking`, where an async lock isn't an option.
///
/// # Examples
///
/// ```
/// use hoard_storage::backend::{BlobBackend, MockBackend};
/// use std::path::Path;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_blobs([("ab/cd/abcd", b"opaque")]);
/// assert!(backend.exists(Path::new("ab/cd/abcd")).await?);
/// assert_eq!(backend.blob_count(), 1);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: Storage,
    capacity: Capacity,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::with_blobs(std::iter::empty::<(PathBuf, Vec<u8>)>())
    }
}

impl MockBackend {
    /// Create a mock backend pre-populated with blobs.
    ///
    /// Panics if any path fails validation. Broken test setup should not
    /// produce a passing test.
    pub fn with_blobs(blobs: impl IntoIterator<Item = (impl Into<PathBuf>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = HashMap::new();
        for (path, data) in blobs {
            let path = path.into();
            let Ok(validated) = validate_path(&path) else {
                panic!("MockBackend::with_blobs: invalid path {}", path.display());
            };
            map.insert(validated, data.into());
        }
        Self {
            name: "mock".to_string(),
            storage: Arc::new(RwLock::new(map)),
            capacity: Capacity { total: 100 << 30, free: 40 << 30 },
        }
    }

    pub fn with_capacity(mut self, capacity: Capacity) -> Self {
        self.capacity = capacity;
        self
    }

    pub fn blob_count(&self) -> usize {
        self.storage.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Raw stored bytes, for asserting on ciphertext.
    pub fn raw(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.storage.read().unwrap_or_else(PoisonError::into_inner).get(path.as_ref()).cloned()
    }

    /// XOR one stored byte with `0x01`. Panics if the blob or offset doesn't
    /// exist.
    pub fn flip_byte(&self, path: impl AsRef<Path>, offset: usize) {
        let mut storage = self.storage.write().unwrap_or_else(PoisonError::into_inner);
        let Some(blob) = storage.get_mut(path.as_ref()) else {
            panic!("MockBackend::flip_byte: no blob at {}", path.as_ref().display());
        };
        blob[offset] ^= 0x01;
    }

    fn validated(path: &Path) -> Result<PathBuf> {
        let validated = validate_path(path)?;
        Ok(validated)
    }
}

#[async_trait]
impl BlobBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        let path = Self::validated(path)?;
        Ok(self.storage.read().unwrap_or_else(PoisonError::into_inner).contains_key(&path))
    }

    async fn size(&self, path: &Path) -> Result<u64> {
        let path = Self::validated(path)?;
        let storage = self.storage.read().unwrap_or_else(PoisonError::into_inner);
        match storage.get(&path) {
            Some(data) => Ok(data.len() as u64),
            None => exn::bail!(ErrorKind::NotFound(path)),
        }
    }

    async fn reader(&self, path: &Path) -> Result<BoxSyncRead> {
        let path = Self::validated(path)?;
        let storage = self.storage.read().unwrap_or_else(PoisonError::into_inner);
        match storage.get(&path) {
            Some(data) => Ok(Box::new(Cursor::new(data.clone()))),
            None => exn::bail!(ErrorKind::NotFound(path)),
        }
    }

    async fn writer(&self, path: &Path) -> Result<BoxBlobWriter> {
        let path = Self::validated(path)?;
        Ok(Box::new(MockWriter { path, buffer: Vec::new(), storage: Arc::clone(&self.storage) }))
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        let path = Self::validated(path)?;
        let mut storage = self.storage.write().unwrap_or_else(PoisonError::into_inner);
        match storage.remove(&path) {
            Some(_) => Ok(()),
            None => exn::bail!(ErrorKind::NotFound(path)),
        }
    }

    async fn capacity(&self) -> Result<Capacity> {
        Ok(self.capacity)
    }
}

struct MockWriter {
    path: PathBuf,
    buffer: Vec<u8>,
    storage: Storage,
}

impl Write for MockWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl BlobWriter for MockWriter {
    fn commit(self: Box<Self>) -> Result<()> {
        let MockWriter { path, buffer, storage } = *self;
        storage.write().unwrap_or_else(PoisonError::into_inner).insert(path, buffer);
        Ok(())
    }
}
