//! Rendering results for people or for scripts.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use hoard_catalog::FileRecord;
use hoard_engine::StorageStats;
use hoard_engine::lifecycle::{BlobFate, Purge};
use hoard_engine::vfs::{Entry, Exported};
use serde::Serialize;
use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcDateTime};

/// MIME types by lowercase file extension, for uploads that don't name one.
const MIME_TYPES: &[(&str, &str)] = &[
    ("avi", "video/x-msvideo"),
    ("csv", "text/csv"),
    ("doc", "application/msword"),
    ("docx", "application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
    ("gif", "image/gif"),
    ("heic", "image/heic"),
    ("htm", "text/html"),
    ("html", "text/html"),
    ("jpeg", "image/jpeg"),
    ("jpg", "image/jpeg"),
    ("json", "application/json"),
    ("md", "text/markdown"),
    ("mkv", "video/x-matroska"),
    ("mov", "video/quicktime"),
    ("mp3", "audio/mpeg"),
    ("mp4", "video/mp4"),
    ("odt", "application/vnd.oasis.opendocument.text"),
    ("pdf", "application/pdf"),
    ("png", "image/png"),
    ("ppt", "application/vnd.ms-powerpoint"),
    ("pptx", "application/vnd.openxmlformats-officedocument.presentationml.presentation"),
    ("rtf", "application/rtf"),
    ("svg", "image/svg+xml"),
    ("txt", "text/plain"),
    ("wav", "audio/wav"),
    ("webm", "video/webm"),
    ("webp", "image/webp"),
    ("xls", "application/vnd.ms-excel"),
    ("xlsx", "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"),
    ("zip", "application/zip"),
];

pub fn guess_mime_type(name: &str) -> &'static str {
    let Some((_, extension)) = name.rsplit_once('.') else {
        return "application/octet-stream";
    };
    let extension = extension.to_ascii_lowercase();
    MIME_TYPES
        .binary_search_by(|(known, _)| known.cmp(&extension.as_str()))
        .map_or("application/octet-stream", |i| MIME_TYPES[i].1)
}

fn rfc3339(at: UtcDateTime) -> String {
    OffsetDateTime::from(at).format(&Rfc3339).unwrap_or_else(|_| at.unix_timestamp().to_string())
}

#[derive(Serialize)]
pub struct FileView {
    id: String,
    name: String,
    path: String,
    kind: &'static str,
    mime_type: String,
    size: u64,
    encrypted_size: u64,
    digest: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    batch_name: Option<String>,
    created_at: String,
    updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    deleted_at: Option<String>,
}

impl From<&FileRecord> for FileView {
    fn from(record: &FileRecord) -> Self {
        Self {
            id: record.id.to_string(),
            name: record.name.clone(),
            path: record.virtual_path.clone(),
            kind: if record.is_directory() { "folder" } else { "file" },
            mime_type: record.mime_type.clone(),
            size: record.size,
            encrypted_size: record.encrypted_size,
            digest: record.digest.to_string(),
            batch_name: record.batch_name.clone(),
            created_at: rfc3339(record.created_at),
            updated_at: rfc3339(record.updated_at),
            deleted_at: record.deleted_at.map(rfc3339),
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum EntryView {
    Record(FileView),
    Folder { name: String, path: String },
}

#[derive(Serialize)]
struct PurgeView {
    #[serde(flatten)]
    file: FileView,
    blob: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    remaining_references: Option<u64>,
}

impl From<&Purge> for PurgeView {
    fn from(purge: &Purge) -> Self {
        let (blob, remaining_references) = match purge.blob {
            BlobFate::Removed => ("removed", None),
            BlobFate::Shared { remaining } => ("shared", Some(remaining)),
            BlobFate::UnlinkFailed => ("unlink_failed", None),
        };
        Self { file: FileView::from(&purge.record), blob, remaining_references }
    }
}

#[derive(Serialize)]
struct StatsView {
    total_used: u64,
    images: u64,
    videos: u64,
    documents: u64,
    other: u64,
    trash: u64,
    limit: u64,
    remaining: u64,
    physical_total: u64,
    physical_free: u64,
}

/// Where command results go.
#[derive(Clone, Copy, Debug)]
pub struct Output {
    pub json: bool,
}

impl Output {
    fn emit_json<T: Serialize>(&self, value: &T) -> Result<()> {
        let text = serde_json::to_string_pretty(value).or_raise(|| ErrorKind::Output)?;
        println!("{text}");
        Ok(())
    }

    pub fn file(&self, record: &FileRecord) -> Result<()> {
        if self.json {
            return self.emit_json(&FileView::from(record));
        }
        println!("{}", file_line(record));
        Ok(())
    }

    pub fn files(&self, records: &[FileRecord]) -> Result<()> {
        if self.json {
            return self.emit_json(&records.iter().map(FileView::from).collect::<Vec<_>>());
        }
        for record in records {
            println!("{}", file_line(record));
        }
        Ok(())
    }

    pub fn entries(&self, entries: &[Entry]) -> Result<()> {
        if self.json {
            let views: Vec<EntryView> = entries
                .iter()
                .map(|entry| match entry {
                    Entry::Record(record) => EntryView::Record(FileView::from(record)),
                    Entry::Folder { name, path } => EntryView::Folder { name: name.clone(), path: path.clone() },
                })
                .collect();
            return self.emit_json(&views);
        }
        for entry in entries {
            match entry {
                Entry::Record(record) => println!("{}", file_line(record)),
                Entry::Folder { name, .. } => println!("{:<36}  {:>12}  {name}/", "", "-"),
            }
        }
        Ok(())
    }

    pub fn purged(&self, purges: &[Purge]) -> Result<()> {
        if self.json {
            return self.emit_json(&purges.iter().map(PurgeView::from).collect::<Vec<_>>());
        }
        for purge in purges {
            let blob = match purge.blob {
                BlobFate::Removed => "blob removed".to_string(),
                BlobFate::Shared { remaining } => format!("blob kept, {remaining} other reference(s)"),
                BlobFate::UnlinkFailed => "blob could not be removed".to_string(),
            };
            println!("purged {} ({blob})", purge.record.id);
        }
        Ok(())
    }

    pub fn stats(&self, stats: &StorageStats) -> Result<()> {
        if self.json {
            return self.emit_json(&StatsView {
                total_used: stats.total_used,
                images: stats.images,
                videos: stats.videos,
                documents: stats.documents,
                other: stats.other,
                trash: stats.trash,
                limit: stats.limit,
                remaining: stats.remaining(),
                physical_total: stats.physical_total,
                physical_free: stats.physical_free,
            });
        }
        println!("used       {:>16} of {}", stats.total_used, stats.limit);
        println!("  images   {:>16}", stats.images);
        println!("  videos   {:>16}", stats.videos);
        println!("  docs     {:>16}", stats.documents);
        println!("  other    {:>16}", stats.other);
        println!("trash      {:>16}", stats.trash);
        println!("disk free  {:>16} of {}", stats.physical_free, stats.physical_total);
        Ok(())
    }

    pub fn exported(&self, exported: &Exported) -> Result<()> {
        if self.json {
            return self.emit_json(&serde_json::json!({ "files": exported.files, "bytes": exported.bytes }));
        }
        println!("exported {} file(s), {} bytes", exported.files, exported.bytes);
        Ok(())
    }

    pub fn count(&self, what: &str, count: usize) -> Result<()> {
        if self.json {
            let mut object = serde_json::Map::new();
            object.insert(what.to_string(), count.into());
            return self.emit_json(&object);
        }
        println!("{what}: {count}");
        Ok(())
    }
}

fn file_line(record: &FileRecord) -> String {
    let size = match record.is_directory() {
        true => "-".to_string(),
        false => record.size.to_string(),
    };
    let suffix = if record.is_directory() { "/" } else { "" };
    format!("{}  {size:>12}  {}{}{suffix}", record.id, record.virtual_path, record.name)
}
