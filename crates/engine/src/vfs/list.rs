use crate::error::{ErrorKind, Result};
use crate::path::{immediate_child, normalize_directory};
use exn::ResultExt;
use hoard_catalog::{FileRecord, Repository};
use std::collections::BTreeSet;
use tracing::instrument;

/// One line of a directory listing.
#[derive(Clone, Debug, PartialEq)]
pub enum Entry {
    /// A file, or an explicit folder marker.
    Record(FileRecord),
    /// A folder with no marker of its own, implied by something deeper.
    Folder { name: String, path: String },
}

impl Entry {
    pub fn name(&self) -> &str {
        match self {
            Entry::Record(record) => &record.name,
            Entry::Folder { name, .. } => name,
        }
    }

    pub fn is_folder(&self) -> bool {
        match self {
            Entry::Record(record) => record.is_directory(),
            Entry::Folder { .. } => true,
        }
    }
}

/// Contents of one folder of `user`.
///
/// Rows sitting directly in the folder come first, ordered by batch then
/// name. Folders implied by deeper rows follow in name order, except those
/// already shown through their marker.
#[instrument(skip(catalog))]
pub async fn list_directory(catalog: &Repository, user: u64, path: &str) -> Result<Vec<Entry>> {
    let directory = normalize_directory(path)?;
    let records = catalog.list_directory(user, &directory).await.or_raise(|| ErrorKind::Catalog)?;
    let deeper = catalog.list_subdirectory_paths(user, &directory).await.or_raise(|| ErrorKind::Catalog)?;

    let marked: BTreeSet<&str> = records.iter().filter(|r| r.is_directory()).map(|r| r.name.as_str()).collect();
    let implied: BTreeSet<&str> = deeper
        .iter()
        .filter_map(|path| immediate_child(&directory, path))
        .filter(|name| !marked.contains(name))
        .collect();
    let folders: Vec<Entry> = implied
        .into_iter()
        .map(|name| Entry::Folder { name: name.to_string(), path: format!("{directory}{name}/") })
        .collect();

    tracing::debug!(records = records.len(), implied = folders.len(), "Listed directory");
    let mut entries: Vec<Entry> = records.into_iter().map(Entry::Record).collect();
    entries.extend(folders);
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Harness, upload_bytes};
    use crate::vfs::create_folder;

    fn names(entries: &[Entry]) -> Vec<(&str, bool)> {
        entries.iter().map(|e| (e.name(), e.is_folder())).collect()
    }

    #[tokio::test]
    async fn synthesizes_folders_from_deeper_paths() {
        let h = Harness::new().await;
        upload_bytes(&h, 1, "a.txt", "/", b"a").await.unwrap();
        upload_bytes(&h, 1, "jan.jpg", "/photos/2024", b"jan").await.unwrap();
        upload_bytes(&h, 1, "cv.pdf", "/docs", b"cv").await.unwrap();

        let root = list_directory(&h.catalog, 1, "/").await.unwrap();
        assert_eq!(names(&root), [("a.txt", false), ("docs", true), ("photos", true)]);
        assert!(matches!(&root[2], Entry::Folder { path, .. } if path == "/photos/"));

        let photos = list_directory(&h.catalog, 1, "photos").await.unwrap();
        assert_eq!(names(&photos), [("2024", true)]);
    }

    #[tokio::test]
    async fn folders_only_then_files_only() {
        let h = Harness::new().await;
        upload_bytes(&h, 1, "x.txt", "/a/b", b"x").await.unwrap();
        upload_bytes(&h, 1, "y.txt", "/a/c", b"y").await.unwrap();

        let a = list_directory(&h.catalog, 1, "/a/").await.unwrap();
        assert_eq!(names(&a), [("b", true), ("c", true)]);
        let b = list_directory(&h.catalog, 1, "/a/b/").await.unwrap();
        assert_eq!(names(&b), [("x.txt", false)]);
    }

    #[tokio::test]
    async fn marker_hides_the_synthetic_twin() {
        let h = Harness::new().await;
        create_folder(&h.blobs, &h.catalog, 1, "/", "photos").await.unwrap();
        upload_bytes(&h, 1, "x.jpg", "/photos/trip", b"x").await.unwrap();

        let root = list_directory(&h.catalog, 1, "/").await.unwrap();
        assert_eq!(root.len(), 1);
        assert!(matches!(&root[0], Entry::Record(r) if r.name == "photos" && r.is_directory()));
    }

    #[tokio::test]
    async fn similar_prefixes_stay_apart() {
        let h = Harness::new().await;
        upload_bytes(&h, 1, "a", "/photos-old", b"a").await.unwrap();
        upload_bytes(&h, 1, "b", "/photos/x", b"b").await.unwrap();

        let photos = list_directory(&h.catalog, 1, "/photos").await.unwrap();
        assert_eq!(names(&photos), [("x", true)]);
    }

    #[tokio::test]
    async fn users_see_only_their_own() {
        let h = Harness::new().await;
        upload_bytes(&h, 2, "secret", "/hidden", b"s").await.unwrap();
        assert!(list_directory(&h.catalog, 1, "/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn traversal_is_rejected() {
        let h = Harness::new().await;
        let err = list_directory(&h.catalog, 1, "/../..").await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }
}
