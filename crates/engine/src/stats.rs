use crate::Context;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use hoard_catalog::Repository;
use hoard_storage::BlobStore;
use hoard_storage::backend::Capacity;
use tracing::instrument;

/// Per-user usage alongside the quota and the disk it lives on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StorageStats {
    /// Plaintext bytes in active records.
    pub total_used: u64,
    pub images: u64,
    pub videos: u64,
    pub documents: u64,
    pub other: u64,
    /// Plaintext bytes waiting in the trash. Not part of `total_used`.
    pub trash: u64,
    pub limit: u64,
    /// Whole backend, shared by every user. Zero when unknown.
    pub physical_total: u64,
    pub physical_free: u64,
}

impl StorageStats {
    /// Quota left before uploads start failing.
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.total_used)
    }
}

/// Usage report for `user`. A backend that can't report its capacity
/// doesn't fail the call; the physical figures come back as zero.
#[instrument(skip(blobs, catalog, ctx))]
pub async fn storage_stats(blobs: &BlobStore, catalog: &Repository, ctx: &Context, user: u64) -> Result<StorageStats> {
    let usage = catalog.usage(user).await.or_raise(|| ErrorKind::Catalog)?;
    let capacity = blobs.capacity().await.unwrap_or_else(|err| {
        tracing::warn!(error = ?err, "Could not read backend capacity");
        Capacity::default()
    });
    Ok(StorageStats {
        total_used: usage.total_used,
        images: usage.images,
        videos: usage.videos,
        documents: usage.documents,
        other: usage.other,
        trash: usage.trash,
        limit: ctx.limits.storage_limit,
        physical_total: capacity.total,
        physical_free: capacity.free,
    })
}
