use crate::error::{ErrorKind, Result};
use crate::lifecycle::owned_record;
use crate::path::{normalize_directory, parent_and_name, validate_name};
use exn::{OptionExt, ResultExt};
use hoard_catalog::{FileRecord, Repository};
use hoard_storage::BlobStore;
use tracing::instrument;
use uuid::Uuid;

/// Create an empty folder `name` inside `path`.
///
/// Only explicit markers count as collisions: a folder that merely exists
/// because files live below it can still be given a marker.
#[instrument(skip(blobs, catalog))]
pub async fn create_folder(
    blobs: &BlobStore,
    catalog: &Repository,
    user: u64,
    path: &str,
    name: &str,
) -> Result<FileRecord> {
    let parent = normalize_directory(path)?;
    let name = validate_name(name)?;
    ensure_no_marker(catalog, user, &parent, name, None).await?;

    let placeholder = blobs.ensure_placeholder().await.map_err(ErrorKind::storage)?;
    let marker = FileRecord::directory_marker(user, name, parent).with_sizes(0, placeholder.size);
    catalog.insert(&marker).await.or_raise(|| ErrorKind::Catalog)?;
    tracing::info!(id = %marker.id, "Created folder");
    Ok(marker)
}

/// Put a record into another folder, keeping its name.
///
/// Moving a folder marker moves the marker only; rows below the old folder
/// stay where they are.
#[instrument(skip(catalog))]
pub async fn move_file(catalog: &Repository, user: u64, id: Uuid, new_path: &str) -> Result<FileRecord> {
    let record = owned_record(catalog, user, id, false).await?;
    let target = normalize_directory(new_path)?;
    if record.folder_path().is_some_and(|own| target.starts_with(&own)) {
        exn::bail!(ErrorKind::InvalidPath(format!("cannot move {:?} into itself", record.name)));
    }
    relocate(catalog, &record, &target, &record.name).await
}

/// Give a record a new display name in the same folder.
#[instrument(skip(catalog))]
pub async fn rename_file(catalog: &Repository, user: u64, id: Uuid, new_name: &str) -> Result<FileRecord> {
    let record = owned_record(catalog, user, id, false).await?;
    let name = validate_name(new_name)?;
    relocate(catalog, &record, &record.virtual_path, name).await
}

/// Fails with `AlreadyExists` if `parent` already holds a marker called
/// `name`, other than `except` itself.
async fn ensure_no_marker(
    catalog: &Repository,
    user: u64,
    parent: &str,
    name: &str,
    except: Option<Uuid>,
) -> Result<()> {
    let siblings = catalog.list_directory(user, parent).await.or_raise(|| ErrorKind::Catalog)?;
    if siblings.iter().any(|r| r.is_directory() && r.name == name && Some(r.id) != except) {
        exn::bail!(ErrorKind::AlreadyExists(format!("{parent}{name}/")));
    }
    Ok(())
}

async fn relocate(catalog: &Repository, record: &FileRecord, virtual_path: &str, name: &str) -> Result<FileRecord> {
    if record.is_directory() {
        ensure_no_marker(catalog, record.user_id, virtual_path, name, Some(record.id)).await?;
    }
    let id = record.id;
    if !catalog.update_location(id, virtual_path, name).await.or_raise(|| ErrorKind::Catalog)? {
        exn::bail!(ErrorKind::NotFound);
    }
    let record = catalog.get(id).await.or_raise(|| ErrorKind::Catalog)?.ok_or_raise(|| ErrorKind::NotFound)?;
    tracing::info!(path = %record.virtual_path, name = %record.name, "Relocated record");
    Ok(record)
}

/// Trash a folder: every active row at or below it, plus its own marker.
///
/// All rows move to the trash in one catalog transaction, so a failure part
/// way leaves the folder untouched. Returns how many rows were trashed.
#[instrument(skip(catalog))]
pub async fn delete_folder(catalog: &Repository, user: u64, path: &str) -> Result<usize> {
    let directory = normalize_directory(path)?;
    let Some((parent, name)) = parent_and_name(&directory) else {
        exn::bail!(ErrorKind::InvalidPath("the root folder cannot be deleted".to_string()));
    };

    let mut ids: Vec<Uuid> = catalog
        .list_recursive(user, &directory)
        .await
        .or_raise(|| ErrorKind::Catalog)?
        .iter()
        .map(|r| r.id)
        .collect();
    let markers = catalog.list_directory(user, parent).await.or_raise(|| ErrorKind::Catalog)?;
    ids.extend(markers.iter().filter(|r| r.is_directory() && r.name == name).map(|r| r.id));
    if ids.is_empty() {
        exn::bail!(ErrorKind::NotFound);
    }

    let trashed = catalog.soft_delete_many(&ids).await.or_raise(|| ErrorKind::Catalog)?;
    tracing::info!(trashed, "Moved folder to trash");
    usize::try_from(trashed).or_raise(|| ErrorKind::Catalog)
}
