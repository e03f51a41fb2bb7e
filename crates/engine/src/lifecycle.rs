//! Trash, restore and purge.
//!
//! Deleting only stamps `deleted_at`; the blob stays put and the record can
//! come back. Purging removes the record for good and unlinks the blob once
//! nothing else references it. The reference count and the delete share one
//! catalog transaction; the unlink happens after it commits, so a crash in
//! between leaves an orphaned blob rather than a record pointing at nothing.

use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use hoard_catalog::{FileRecord, Repository};
use hoard_storage::BlobStore;
use hoard_storage::error::ErrorKind as StorageErrorKind;
use tracing::instrument;
use uuid::Uuid;

/// What happened to the blob behind a purged record.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlobFate {
    /// Last reference gone; the blob was unlinked (or was already missing).
    Removed,
    /// Other records still point at the blob.
    Shared { remaining: u64 },
    /// Last reference gone but the unlink failed. The record is still gone;
    /// the blob is an orphan.
    UnlinkFailed,
}

#[derive(Clone, Debug)]
pub struct Purge {
    pub record: FileRecord,
    pub blob: BlobFate,
}

/// Fetch a record and make sure `user` owns it.
pub(crate) async fn owned_record(
    catalog: &Repository,
    user: u64,
    id: Uuid,
    include_deleted: bool,
) -> Result<FileRecord> {
    let record = match include_deleted {
        true => catalog.get_including_deleted(id).await,
        false => catalog.get(id).await,
    }
    .or_raise(|| ErrorKind::Catalog)?;
    let Some(record) = record else {
        exn::bail!(ErrorKind::NotFound);
    };
    if record.user_id != user {
        tracing::debug!(user, %id, "Refused access to another user's record");
        exn::bail!(ErrorKind::AccessDenied);
    }
    Ok(record)
}

/// Move a file (or folder marker) to the trash.
#[instrument(skip(catalog))]
pub async fn delete_file(catalog: &Repository, user: u64, id: Uuid) -> Result<()> {
    owned_record(catalog, user, id, false).await?;
    if !catalog.soft_delete(id).await.or_raise(|| ErrorKind::Catalog)? {
        // Trashed by someone else between the lookup and the update.
        exn::bail!(ErrorKind::NotFound);
    }
    tracing::info!("Moved to trash");
    Ok(())
}

/// Take a record back out of the trash. Restoring an active record is a
/// no-op. The record comes back at its old location even if that folder
/// has since been deleted; listings synthesize the folder again.
#[instrument(skip(catalog))]
pub async fn restore_file(catalog: &Repository, user: u64, id: Uuid) -> Result<FileRecord> {
    let record = owned_record(catalog, user, id, true).await?;
    if record.is_deleted() {
        catalog.restore(id).await.or_raise(|| ErrorKind::Catalog)?;
        tracing::info!("Restored from trash");
    }
    catalog.get(id).await.or_raise(|| ErrorKind::Catalog)?.ok_or_raise(|| ErrorKind::NotFound)
}

/// Permanently remove a record, trashed or not, and its blob if this was
/// the last reference to it.
#[instrument(skip(blobs, catalog))]
pub async fn purge_file(blobs: &BlobStore, catalog: &Repository, user: u64, id: Uuid) -> Result<Purge> {
    owned_record(catalog, user, id, true).await?;
    let Some(purged) = catalog.purge(id).await.or_raise(|| ErrorKind::Catalog)? else {
        exn::bail!(ErrorKind::NotFound);
    };
    let blob = match purged.remaining {
        0 => unlink(blobs, &purged.record).await,
        remaining => {
            tracing::debug!(remaining, "Blob still referenced; keeping it");
            BlobFate::Shared { remaining }
        },
    };
    tracing::info!(digest = %purged.record.digest, ?blob, "Purged record");
    Ok(Purge { record: purged.record, blob })
}

async fn unlink(blobs: &BlobStore, record: &FileRecord) -> BlobFate {
    match blobs.remove(&record.blob_path).await {
        Ok(()) => BlobFate::Removed,
        Err(err) if matches!(&*err, StorageErrorKind::NotFound(_)) => {
            tracing::debug!(path = %record.blob_path.display(), "Blob was already gone");
            BlobFate::Removed
        },
        Err(err) => {
            tracing::warn!(path = %record.blob_path.display(), error = ?err, "Failed to unlink unreferenced blob");
            BlobFate::UnlinkFailed
        },
    }
}

/// Everything `user` has in the trash, most recently deleted first.
pub async fn list_trash(catalog: &Repository, user: u64) -> Result<Vec<FileRecord>> {
    catalog.list_trash(user).await.or_raise(|| ErrorKind::Catalog)
}

/// Purge every trashed record of `user`.
///
/// Keeps going past failures; if any record could not be purged the first
/// one is reported as [`ErrorKind::Incomplete`] once everything else has
/// been attempted.
#[instrument(skip(blobs, catalog))]
pub async fn empty_trash(blobs: &BlobStore, catalog: &Repository, user: u64) -> Result<Vec<Purge>> {
    let trashed = list_trash(catalog, user).await?;
    let mut purged = Vec::with_capacity(trashed.len());
    let mut first_failure = None;
    for record in trashed {
        match purge_file(blobs, catalog, user, record.id).await {
            Ok(purge) => purged.push(purge),
            Err(err) => {
                tracing::warn!(id = %record.id, error = ?err, "Failed to purge trashed record");
                first_failure.get_or_insert((record.id, err));
            },
        }
    }
    if let Some((id, err)) = first_failure {
        return Err(err.raise(ErrorKind::Incomplete { step: format!("purge {id}") }));
    }
    tracing::info!(count = purged.len(), "Emptied trash");
    Ok(purged)
}
