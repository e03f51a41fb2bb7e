use hoard_storage::Digest;
use std::path::PathBuf;
use time::UtcDateTime;
use uuid::Uuid;

/// MIME type carried by folder markers.
pub const DIRECTORY_MIME: &str = "inode/directory";
const DEFAULT_MIME: &str = "application/octet-stream";

/// Current time at the precision the catalog stores (whole seconds), so a
/// freshly built record compares equal to itself after a round trip.
pub fn timestamp_now() -> UtcDateTime {
    let now = UtcDateTime::now();
    now.replace_nanosecond(0).unwrap_or(now)
}

/// One logical file (or folder marker) owned by one user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileRecord {
    pub id: Uuid,
    pub user_id: u64,
    /// Display name, unique-ish within a folder but never enforced.
    pub name: String,
    pub digest: Digest,
    /// Ciphertext location relative to the storage root.
    pub blob_path: PathBuf,
    /// Folder the record appears in; always `/`-prefixed and `/`-terminated.
    pub virtual_path: String,
    /// Label grouping files uploaded together.
    pub batch_name: Option<String>,
    pub mime_type: String,
    /// Plaintext bytes.
    pub size: u64,
    /// Ciphertext bytes on disk.
    pub encrypted_size: u64,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
    pub deleted_at: Option<UtcDateTime>,
}

impl FileRecord {
    /// A new, active record for content with the given digest.
    ///
    /// `virtual_path` must already be normalized.
    pub fn new(user_id: u64, name: impl Into<String>, digest: Digest, virtual_path: impl Into<String>) -> Self {
        let now = timestamp_now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            blob_path: digest.blob_path(),
            digest,
            virtual_path: virtual_path.into(),
            batch_name: None,
            mime_type: DEFAULT_MIME.to_string(),
            size: 0,
            encrypted_size: 0,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    /// Marker row that makes an empty folder visible in its parent.
    pub fn directory_marker(user_id: u64, name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self::new(user_id, name, Digest::empty(), parent).with_mime_type(DIRECTORY_MIME)
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = mime_type.into();
        self
    }

    pub fn with_sizes(mut self, size: u64, encrypted_size: u64) -> Self {
        self.size = size;
        self.encrypted_size = encrypted_size;
        self
    }

    /// Empty batch names are treated as no batch at all.
    pub fn with_batch_name(mut self, batch_name: Option<String>) -> Self {
        self.batch_name = batch_name.filter(|name| !name.is_empty());
        self
    }

    pub fn is_directory(&self) -> bool {
        self.mime_type == DIRECTORY_MIME
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Full virtual path of the folder a marker stands for.
    pub fn folder_path(&self) -> Option<String> {
        self.is_directory().then(|| format!("{}{}/", self.virtual_path, self.name))
    }
}

/// Per-user byte totals, split by broad content category.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Usage {
    /// Plaintext bytes across all active records.
    pub total_used: u64,
    pub images: u64,
    pub videos: u64,
    pub documents: u64,
    pub other: u64,
    /// Plaintext bytes sitting in the trash.
    pub trash: u64,
}
