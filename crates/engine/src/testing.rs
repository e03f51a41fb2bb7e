//! Shared fixtures for engine tests.

use crate::error::Result;
use crate::{Context, Limits, Upload, upload};
use hoard_catalog::{Database, FileRecord, Repository};
use hoard_storage::backend::MockBackend;
use hoard_storage::{BlobStore, EncryptionKey};
use std::io::{self, Cursor, Write};
use std::sync::{Arc, Mutex};

pub(crate) struct Harness {
    pub(crate) backend: Arc<MockBackend>,
    pub(crate) blobs: BlobStore,
    pub(crate) catalog: Repository,
    pub(crate) ctx: Context,
}

impl Harness {
    pub(crate) async fn new() -> Self {
        Self::with_limits(Limits::default()).await
    }

    pub(crate) async fn with_limits(limits: Limits) -> Self {
        let backend = Arc::new(MockBackend::default());
        let blobs = BlobStore::new(backend.clone(), &EncryptionKey::from([9u8; 32]));
        let db = Database::connect_in_memory().await.unwrap();
        Self { backend, blobs, catalog: Repository::from(&db), ctx: Context::new(limits) }
    }
}

pub(crate) async fn upload_bytes(h: &Harness, user: u64, name: &str, path: &str, content: &[u8]) -> Result<FileRecord> {
    let request = Upload::new(name, content.len() as u64, Cursor::new(content.to_vec())).into_folder(path);
    upload(&h.blobs, &h.catalog, &h.ctx, user, request).await
}

/// Writer whose contents stay observable after it has been moved into an
/// operation that failed.
#[derive(Clone, Debug, Default)]
pub(crate) struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl SharedSink {
    pub(crate) fn contents(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
