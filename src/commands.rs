use crate::error::{ErrorKind, Result};
use crate::output::{Output, guess_mime_type};
use clap::Subcommand;
use exn::{OptionExt, ResultExt};
use hoard_catalog::Repository;
use hoard_engine::path::{normalize_directory, parent_and_name};
use hoard_engine::{Context, Upload, lifecycle, vfs};
use hoard_storage::BlobStore;
use std::fs::File;
use std::io::{self, Write};
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store a local file
    Upload {
        file: PathBuf,
        /// Folder to put it in
        #[arg(long, default_value = "/")]
        to: String,
        /// Display name, instead of the local file name
        #[arg(long)]
        name: Option<String>,
        /// MIME type, instead of guessing from the extension
        #[arg(long)]
        mime_type: Option<String>,
        /// Group this file with others uploaded together
        #[arg(long)]
        batch: Option<String>,
    },
    /// Decrypt a file to a local path, or stdout
    Download {
        id: Uuid,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List a folder
    Ls {
        #[arg(default_value = "/")]
        path: String,
    },
    /// Create an empty folder
    Mkdir { path: String },
    /// Move a file into another folder
    Mv { id: Uuid, to: String },
    /// Give a file a new name
    Rename { id: Uuid, name: String },
    /// Move a file to the trash
    Rm { id: Uuid },
    /// Move a folder and everything in it to the trash
    Rmdir { path: String },
    /// List the trash
    Trash,
    /// Take a file back out of the trash
    Restore { id: Uuid },
    /// Delete a file for good
    Purge { id: Uuid },
    /// Delete everything in the trash for good
    EmptyTrash,
    /// Write a folder to a zip archive, or stream it to stdout
    Export {
        path: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show usage against the quota
    Stats,
    /// Find files by name
    Search {
        query: String,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Most recent uploads
    Recent {
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Images from every folder
    Images {
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
}

/// Handles every command needs.
pub struct App {
    pub blobs: BlobStore,
    pub catalog: Repository,
    pub ctx: Context,
    pub user: u64,
    pub output: Output,
}

impl App {
    pub async fn run(&self, command: Command) -> Result<()> {
        let Self { blobs, catalog, ctx, user, output } = self;
        let user = *user;
        match command {
            Command::Upload { file, to, name, mime_type, batch } => {
                let name = match name {
                    Some(name) => name,
                    None => file
                        .file_name()
                        .and_then(|name| name.to_str())
                        .ok_or_raise(|| {
                            ErrorKind::InvalidArgument(format!("{} has no usable file name", file.display()))
                        })?
                        .to_string(),
                };
                let mime_type = mime_type.unwrap_or_else(|| guess_mime_type(&name).to_string());
                let local = File::open(&file).or_raise(|| ErrorKind::Local(file.display().to_string()))?;
                let size = local.metadata().or_raise(|| ErrorKind::Local(file.display().to_string()))?.len();
                let mut request = Upload::new(name, size, local).into_folder(to).with_mime_type(mime_type);
                if let Some(batch) = batch {
                    request = request.with_batch_name(batch);
                }
                let record = hoard_engine::upload(blobs, catalog, ctx, user, request).await.map_err(ErrorKind::engine)?;
                output.file(&record)
            },
            Command::Download { id, output: None } => {
                let (_, mut stdout) = hoard_engine::download(blobs, catalog, ctx, user, id, io::stdout())
                    .await
                    .map_err(ErrorKind::engine)?;
                stdout.flush().or_raise(|| ErrorKind::Output)
            },
            Command::Download { id, output: Some(path) } => {
                let local = File::create(&path).or_raise(|| ErrorKind::Local(path.display().to_string()))?;
                let (record, local) =
                    hoard_engine::download(blobs, catalog, ctx, user, id, local).await.map_err(ErrorKind::engine)?;
                local.sync_all().or_raise(|| ErrorKind::Local(path.display().to_string()))?;
                tracing::info!(id = %record.id, path = %path.display(), "Downloaded file");
                Ok(())
            },
            Command::Ls { path } => {
                let entries = vfs::list_directory(catalog, user, &path).await.map_err(ErrorKind::engine)?;
                output.entries(&entries)
            },
            Command::Mkdir { path } => {
                let directory = normalize_directory(&path).map_err(ErrorKind::engine)?;
                let (parent, name) = parent_and_name(&directory)
                    .ok_or_raise(|| ErrorKind::InvalidArgument("the root folder already exists".to_string()))?;
                let marker = vfs::create_folder(blobs, catalog, user, parent, name).await.map_err(ErrorKind::engine)?;
                output.file(&marker)
            },
            Command::Mv { id, to } => {
                let record = vfs::move_file(catalog, user, id, &to).await.map_err(ErrorKind::engine)?;
                output.file(&record)
            },
            Command::Rename { id, name } => {
                let record = vfs::rename_file(catalog, user, id, &name).await.map_err(ErrorKind::engine)?;
                output.file(&record)
            },
            Command::Rm { id } => {
                lifecycle::delete_file(catalog, user, id).await.map_err(ErrorKind::engine)?;
                output.count("trashed", 1)
            },
            Command::Rmdir { path } => {
                let trashed = vfs::delete_folder(catalog, user, &path).await.map_err(ErrorKind::engine)?;
                output.count("trashed", trashed)
            },
            Command::Trash => {
                let records = lifecycle::list_trash(catalog, user).await.map_err(ErrorKind::engine)?;
                output.files(&records)
            },
            Command::Restore { id } => {
                let record = lifecycle::restore_file(catalog, user, id).await.map_err(ErrorKind::engine)?;
                output.file(&record)
            },
            Command::Purge { id } => {
                let purge = lifecycle::purge_file(blobs, catalog, user, id).await.map_err(ErrorKind::engine)?;
                output.purged(&[purge])
            },
            Command::EmptyTrash => {
                let purged = lifecycle::empty_trash(blobs, catalog, user).await.map_err(ErrorKind::engine)?;
                output.purged(&purged)
            },
            Command::Export { path, output: None } => {
                let (exported, mut stdout) = vfs::export_folder_as_zip(blobs, catalog, ctx, user, &path, io::stdout())
                    .await
                    .map_err(ErrorKind::engine)?;
                stdout.flush().or_raise(|| ErrorKind::Output)?;
                tracing::info!(files = exported.files, bytes = exported.bytes, "Exported to stdout");
                Ok(())
            },
            Command::Export { path, output: Some(target) } => {
                let local = File::create(&target).or_raise(|| ErrorKind::Local(target.display().to_string()))?;
                let (exported, local) = vfs::export_folder_as_zip(blobs, catalog, ctx, user, &path, local)
                    .await
                    .map_err(ErrorKind::engine)?;
                local.sync_all().or_raise(|| ErrorKind::Local(target.display().to_string()))?;
                output.exported(&exported)
            },
            Command::Stats => {
                let stats = hoard_engine::storage_stats(blobs, catalog, ctx, user).await.map_err(ErrorKind::engine)?;
                output.stats(&stats)
            },
            Command::Search { query, limit } => {
                let records = vfs::search(catalog, user, &query, limit).await.map_err(ErrorKind::engine)?;
                output.files(&records)
            },
            Command::Recent { limit } => {
                let records = vfs::recent(catalog, user, limit).await.map_err(ErrorKind::engine)?;
                output.files(&records)
            },
            Command::Images { limit } => {
                let records = vfs::images(catalog, user, limit).await.map_err(ErrorKind::engine)?;
                output.files(&records)
            },
        }
    }
}
