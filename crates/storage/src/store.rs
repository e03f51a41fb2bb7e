//! Encrypted, content-addressed blob store.

use crate::BackendHandle;
use crate::backend::Capacity;
use crate::cipher::{ChunkCipher, EncryptionKey};
use crate::error::{ErrorKind, Result};
use crate::hash::Digest;
use exn::ResultExt;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::instrument;

/// Outcome of [`BlobStore::put`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredBlob {
    /// Relative path of the blob within the store.
    pub path: PathBuf,
    /// Size of the ciphertext on disk.
    pub size: u64,
    /// `true` when the blob already existed and nothing was written.
    pub deduplicated: bool,
}

/// Encrypts on the way in, decrypts on the way out, and never writes the same
/// content twice.
///
/// Cloning is cheap; clones share the backend and cipher.
#[derive(Clone)]
pub struct BlobStore {
    backend: BackendHandle,
    cipher: Arc<ChunkCipher>,
}

impl BlobStore {
    pub fn new(backend: BackendHandle, key: &EncryptionKey) -> Self {
        Self { backend, cipher: Arc::new(ChunkCipher::new(key)) }
    }

    pub fn backend(&self) -> &BackendHandle {
        &self.backend
    }

    pub async fn exists(&self, path: &Path) -> Result<bool> {
        self.backend.exists(path).await
    }

    /// Store `content`, whose plaintext hashes to `digest`.
    ///
    /// If a blob for `digest` is already present nothing is encrypted or
    /// written and the existing blob's size is reported. Otherwise the
    /// content is encrypted into a staged write that only becomes visible
    /// once complete.
    ///
    /// The caller is trusted to have hashed `content` itself.
    #[instrument(level = "debug", skip(self, content), fields(backend = self.backend.name(), %digest))]
    pub async fn put<R: Read + Send + 'static>(&self, digest: &Digest, content: R) -> Result<StoredBlob> {
        let path = digest.blob_path();
        if self.backend.exists(&path).await? {
            let size = self.backend.size(&path).await?;
            tracing::debug!(path = %path.display(), size, "Blob already stored; skipping encryption");
            return Ok(StoredBlob { path, size, deduplicated: true });
        }

        let mut writer = self.backend.writer(&path).await?;
        let cipher = Arc::clone(&self.cipher);
        let size = tokio::task::spawn_blocking(move || -> Result<u64> {
            let size = cipher.encrypt(content, &mut writer)?;
            writer.commit()?;
            Ok(size)
        })
        .await
        .or_raise(|| ErrorKind::Task)??;

        tracing::debug!(path = %path.display(), size, "Stored new blob");
        Ok(StoredBlob { path, size, deduplicated: false })
    }

    /// The encrypted empty blob shared by all folder markers.
    pub async fn ensure_placeholder(&self) -> Result<StoredBlob> {
        self.put(&Digest::empty(), io::empty()).await
    }

    /// Decrypt the blob at `path` into `sink`, handing the sink back along
    /// with the number of plaintext bytes written.
    ///
    /// Chunks are written as they authenticate. If the blob turns out to be
    /// corrupt the sink has already seen a prefix of the plaintext, so call
    /// [`verify`](Self::verify) first when that matters.
    #[instrument(level = "debug", skip(self, sink), fields(backend = self.backend.name(), path = %path.display()))]
    pub async fn decrypt_into<W: Write + Send + 'static>(&self, path: &Path, sink: W) -> Result<(u64, W)> {
        let reader = self.backend.reader(path).await?;
        let cipher = Arc::clone(&self.cipher);
        tokio::task::spawn_blocking(move || -> Result<(u64, W)> {
            let mut sink = sink;
            let written = cipher.decrypt(reader, &mut sink)?;
            Ok((written, sink))
        })
        .await
        .or_raise(|| ErrorKind::Task)?
    }

    /// Authenticate every chunk of a blob without emitting plaintext.
    #[instrument(level = "debug", skip(self), fields(backend = self.backend.name(), path = %path.display()))]
    pub async fn verify(&self, path: &Path) -> Result<u64> {
        let reader = self.backend.reader(path).await?;
        let cipher = Arc::clone(&self.cipher);
        tokio::task::spawn_blocking(move || cipher.verify(reader))
            .await
            .or_raise(|| ErrorKind::Task)?
    }

    /// Unlink a blob. Reference counting is the caller's problem.
    pub async fn remove(&self, path: &Path) -> Result<()> {
        self.backend.delete(path).await?;
        tracing::info!(backend = self.backend.name(), path = %path.display(), "Removed blob");
        Ok(())
    }

    pub async fn capacity(&self) -> Result<Capacity> {
        self.backend.capacity().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::LocalBackend;
    use crate::cipher::{CHUNK_SIZE, NONCE_LEN, encrypted_len};
    use crate::hash::EMPTY_DIGEST;
    use std::io::Cursor;
    use tempfile::TempDir;

    fn store() -> (TempDir, BlobStore) {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::new("test", dir.path()).unwrap();
        let store = BlobStore::new(Arc::new(backend), &EncryptionKey::from([3u8; 32]));
        (dir, store)
    }

    #[tokio::test]
    async fn put_then_decrypt() {
        let (dir, store) = store();
        let plain: Vec<u8> = (0..CHUNK_SIZE * 2 + 5).map(|i| i as u8).collect();
        let digest = Digest::of(&plain);

        let stored = store.put(&digest, Cursor::new(plain.clone())).await.unwrap();
        assert!(!stored.deduplicated);
        assert_eq!(stored.path, digest.blob_path());
        assert_eq!(stored.size, encrypted_len(plain.len() as u64));
        assert!(dir.path().join(&stored.path).is_file());

        let (written, out) = store.decrypt_into(&stored.path, Vec::new()).await.unwrap();
        assert_eq!(written, plain.len() as u64);
        assert_eq!(out, plain);
    }

    #[tokio::test]
    async fn ciphertext_does_not_contain_plaintext() {
        let (dir, store) = store();
        let plain = b"a very recognisable secret string".repeat(10);
        let stored = store.put(&Digest::of(&plain), Cursor::new(plain.clone())).await.unwrap();

        let raw = std::fs::read(dir.path().join(&stored.path)).unwrap();
        assert!(!raw.windows(plain.len()).any(|window| window == plain.as_slice()));
    }

    #[tokio::test]
    async fn second_put_is_deduplicated() {
        let (dir, store) = store();
        let digest = Digest::of(b"same");
        let first = store.put(&digest, Cursor::new(b"same".to_vec())).await.unwrap();
        let before = std::fs::read(dir.path().join(&first.path)).unwrap();

        let second = store.put(&digest, Cursor::new(b"same".to_vec())).await.unwrap();
        assert!(second.deduplicated);
        assert_eq!(second.size, first.size);
        // Re-encrypting would have produced a new nonce.
        assert_eq!(std::fs::read(dir.path().join(&second.path)).unwrap(), before);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_puts_of_one_digest_agree() {
        let (dir, store) = store();
        let plain: Vec<u8> = (0..300_000u32).map(|i| (i % 253) as u8).collect();
        let digest = Digest::of(&plain);

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let store = store.clone();
                let plain = plain.clone();
                let digest = digest.clone();
                tokio::spawn(async move { store.put(&digest, Cursor::new(plain)).await })
            })
            .collect();
        for task in tasks {
            let stored = task.await.unwrap().unwrap();
            assert_eq!(stored.size, encrypted_len(plain.len() as u64));
        }

        let (_, out) = store.decrypt_into(&digest.blob_path(), Vec::new()).await.unwrap();
        assert_eq!(out, plain);
        // Nothing staged is left lying next to the blob.
        let shard = dir.path().join(digest.blob_path()).parent().unwrap().to_path_buf();
        assert_eq!(std::fs::read_dir(shard).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn placeholder_is_an_encrypted_empty_blob() {
        let (_dir, store) = store();
        let stored = store.ensure_placeholder().await.unwrap();
        assert_eq!(stored.size, NONCE_LEN as u64);
        assert!(stored.path.ends_with(EMPTY_DIGEST));
        assert!(store.ensure_placeholder().await.unwrap().deduplicated);
    }

    #[tokio::test]
    async fn verify_catches_tampering() {
        let (dir, store) = store();
        let plain = b"tamper with me".to_vec();
        let stored = store.put(&Digest::of(&plain), Cursor::new(plain)).await.unwrap();
        assert_eq!(store.verify(&stored.path).await.unwrap(), 14);

        let absolute = dir.path().join(&stored.path);
        let mut raw = std::fs::read(&absolute).unwrap();
        raw[NONCE_LEN + 2] ^= 0x80;
        std::fs::write(&absolute, raw).unwrap();

        let err = store.verify(&stored.path).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::CorruptOrTampered));
    }

    #[tokio::test]
    async fn remove_unlinks_blob() {
        let (_dir, store) = store();
        let stored = store.put(&Digest::of(b"bye"), Cursor::new(b"bye".to_vec())).await.unwrap();
        store.remove(&stored.path).await.unwrap();
        assert!(!store.backend().exists(&stored.path).await.unwrap());

        let err = store.remove(&stored.path).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }

    #[tokio::test]
    async fn missing_blob_is_not_found() {
        let (_dir, store) = store();
        let err = store.decrypt_into(&Digest::of(b"nope").blob_path(), Vec::new()).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotFound(_)));
    }
}
