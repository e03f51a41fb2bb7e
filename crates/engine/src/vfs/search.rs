use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use hoard_catalog::{FileRecord, Repository};
use tracing::instrument;

/// Active records of `user` whose name contains `query`, case-insensitively
/// for ASCII. `%` and `_` match themselves. A blank query matches nothing.
#[instrument(skip(catalog))]
pub async fn search(catalog: &Repository, user: u64, query: &str, limit: u32) -> Result<Vec<FileRecord>> {
    let query = query.trim();
    if query.is_empty() {
        return Ok(Vec::new());
    }
    catalog.search_by_name(user, query, limit).await.or_raise(|| ErrorKind::Catalog)
}

/// Most recently uploaded files, newest first. Folder markers are left out.
pub async fn recent(catalog: &Repository, user: u64, limit: u32) -> Result<Vec<FileRecord>> {
    catalog.list_recent(user, limit).await.or_raise(|| ErrorKind::Catalog)
}

/// Images across every folder, newest first.
pub async fn images(catalog: &Repository, user: u64, limit: u32) -> Result<Vec<FileRecord>> {
    catalog.list_by_mime_prefix(user, "image/", limit).await.or_raise(|| ErrorKind::Catalog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Upload;
    use crate::testing::{Harness, upload_bytes};
    use crate::transfer::upload;
    use crate::vfs::create_folder;
    use rstest::rstest;
    use std::io::Cursor;

    async fn fixture() -> Harness {
        let h = Harness::new().await;
        for (name, mime, folder) in [
            ("Holiday.JPG", "image/jpeg", "/photos"),
            ("holiday-plan.txt", "text/plain", "/docs"),
            ("100%_done.txt", "text/plain", "/"),
            ("1000_done.txt", "text/plain", "/"),
            ("cat.png", "image/png", "/photos/pets"),
        ] {
            let request = Upload::new(name, name.len() as u64, Cursor::new(name.as_bytes().to_vec()))
                .with_mime_type(mime)
                .into_folder(folder);
            upload(&h.blobs, &h.catalog, &h.ctx, 1, request).await.unwrap();
        }
        upload_bytes(&h, 2, "holiday-theirs.jpg", "/", b"theirs").await.unwrap();
        create_folder(&h.blobs, &h.catalog, 1, "/", "holiday-folder").await.unwrap();
        h
    }

    #[rstest]
    #[case("holiday", 3)]
    #[case("HOLIDAY", 3)]
    #[case("%_", 1)]
    #[case("_done", 2)]
    #[case("0%_d", 1)]
    #[case("   ", 0)]
    #[case("nothing", 0)]
    #[tokio::test]
    async fn searches_names(#[case] query: &str, #[case] expected: usize) {
        let h = fixture().await;
        let found = search(&h.catalog, 1, query, 50).await.unwrap();
        assert_eq!(found.len(), expected, "{query:?} matched {found:?}");
        assert!(found.iter().all(|r| r.user_id == 1));
    }

    #[tokio::test]
    async fn recent_skips_markers_and_respects_limit() {
        let h = fixture().await;
        let found = recent(&h.catalog, 1, 3).await.unwrap();
        assert_eq!(found.len(), 3);
        assert!(found.iter().all(|r| !r.is_directory()));
    }

    #[tokio::test]
    async fn images_from_every_folder() {
        let h = fixture().await;
        let mut found: Vec<String> = images(&h.catalog, 1, 50).await.unwrap().into_iter().map(|r| r.name).collect();
        found.sort();
        assert_eq!(found, ["Holiday.JPG", "cat.png"]);
    }
}
