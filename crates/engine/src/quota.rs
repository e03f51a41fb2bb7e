//! Upload size and per-user quota checks.
//!
//! Both run before any bytes are hashed or encrypted. The headroom check is
//! advisory under concurrency: two uploads racing for the last few bytes can
//! both pass, and the user ends up slightly over.

use crate::Context;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use hoard_catalog::{Repository, Usage};

/// Reject single files above the configured ceiling.
pub fn check_upload_size(ctx: &Context, size: u64) -> Result<()> {
    let max = ctx.limits.max_upload_size;
    if size > max {
        exn::bail!(ErrorKind::TooLarge { size, max });
    }
    Ok(())
}

/// Make sure `incoming` more bytes fit in the user's quota. Trash doesn't
/// count against it.
pub async fn check_headroom(catalog: &Repository, ctx: &Context, user: u64, incoming: u64) -> Result<Usage> {
    let usage = catalog.usage(user).await.or_raise(|| ErrorKind::Catalog)?;
    let limit = ctx.limits.storage_limit;
    if usage.total_used.saturating_add(incoming) > limit {
        tracing::info!(user, used = usage.total_used, incoming, limit, "Upload rejected: quota exceeded");
        exn::bail!(ErrorKind::QuotaExceeded { used: usage.total_used, incoming, limit });
    }
    Ok(usage)
}
