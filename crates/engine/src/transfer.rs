//! Getting bytes in and out.

use crate::error::{ErrorKind, Result};
use crate::lifecycle::owned_record;
use crate::{Context, path, quota};
use exn::ResultExt;
use hoard_catalog::{DIRECTORY_MIME, FileRecord, Repository};
use hoard_storage::{BlobStore, hash};
use std::io::{Read, Seek, Write};
use tracing::instrument;
use uuid::Uuid;

const DEFAULT_MIME: &str = "application/octet-stream";

/// Everything needed to store one file.
pub struct Upload<R> {
    pub name: String,
    pub mime_type: String,
    /// Size as declared by the client. Checked up front, then checked again
    /// against what was actually read.
    pub size: u64,
    pub content: R,
    /// Target folder; normalized before use.
    pub folder: String,
    pub batch_name: Option<String>,
}

impl<R> Upload<R> {
    pub fn new(name: impl Into<String>, size: u64, content: R) -> Self {
        Self {
            name: name.into(),
            mime_type: DEFAULT_MIME.to_string(),
            size,
            content,
            folder: "/".to_string(),
            batch_name: None,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn into_folder(mut self, folder: impl Into<String>) -> Self {
        self.folder = folder.into();
        self
    }

    pub fn with_batch_name(mut self, batch_name: impl Into<String>) -> Self {
        self.batch_name = Some(batch_name.into());
        self
    }
}

/// Store a file for `user`.
///
/// Cheap checks (path, name, size, quota) come before any hashing. If the
/// user already has an active file with identical content, that record is
/// returned unchanged and nothing new is stored, whatever name or folder
/// this upload asked for. Otherwise the content is encrypted into the blob
/// store (or reuses another user's identical blob) and a new record is
/// inserted.
#[instrument(skip_all, fields(user = user, name = %upload.name, declared_size = upload.size))]
pub async fn upload<R>(
    blobs: &BlobStore,
    catalog: &Repository,
    ctx: &Context,
    user: u64,
    upload: Upload<R>,
) -> Result<FileRecord>
where
    R: Read + Seek + Send + 'static,
{
    let Upload { name, mime_type, size, content, folder, batch_name } = upload;
    let folder = path::normalize_directory(&folder)?;
    let name = path::validate_name(&name)?.to_string();
    if mime_type.trim().eq_ignore_ascii_case(DIRECTORY_MIME) {
        exn::bail!(ErrorKind::InvalidPath(format!("{name}: {DIRECTORY_MIME} is reserved for folders")));
    }
    quota::check_upload_size(ctx, size)?;
    quota::check_headroom(catalog, ctx, user, size).await?;

    let (content, digest, measured) = tokio::task::spawn_blocking(move || -> hoard_storage::error::Result<_> {
        let mut content = content;
        let (digest, measured) = hash::digest(&mut content)?;
        Ok((content, digest, measured))
    })
    .await
    .or_raise(|| ErrorKind::Io)?
    .map_err(ErrorKind::storage)?;

    if measured != size {
        tracing::debug!(measured, "Declared size was wrong; re-checking limits");
        quota::check_upload_size(ctx, measured)?;
        quota::check_headroom(catalog, ctx, user, measured).await?;
    }

    if let Some(existing) = catalog.find_by_user_digest(user, &digest).await.or_raise(|| ErrorKind::Catalog)? {
        tracing::info!(id = %existing.id, %digest, "User already has this content; returning existing record");
        return Ok(existing);
    }

    let stored = blobs.put(&digest, content).await.map_err(ErrorKind::storage)?;
    let record = FileRecord::new(user, name, digest, folder)
        .with_mime_type(mime_type)
        .with_sizes(measured, stored.size)
        .with_batch_name(batch_name);
    catalog.insert(&record).await.or_raise(|| ErrorKind::Catalog)?;
    tracing::info!(
        id = %record.id,
        digest = %record.digest,
        path = %record.virtual_path,
        size = record.size,
        deduplicated = stored.deduplicated,
        "Stored upload",
    );
    Ok(record)
}

/// Decrypt one of `user`'s files into `sink`.
///
/// The blob is authenticated end to end before the first plaintext byte
/// reaches `sink`, so a tampered file writes nothing at all.
#[instrument(skip(blobs, catalog, _ctx, sink))]
pub async fn download<W>(
    blobs: &BlobStore,
    catalog: &Repository,
    _ctx: &Context,
    user: u64,
    id: Uuid,
    sink: W,
) -> Result<(FileRecord, W)>
where
    W: Write + Send + 'static,
{
    let record = owned_record(catalog, user, id, false).await?;
    blobs.verify(&record.blob_path).await.map_err(ErrorKind::storage)?;
    let (written, sink) = blobs.decrypt_into(&record.blob_path, sink).await.map_err(ErrorKind::storage)?;
    tracing::debug!(written, "Streamed download");
    Ok((record, sink))
}
