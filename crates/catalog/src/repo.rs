//! Queries over the `files` table.
//!
//! Lookups by id come in two flavours: [`Repository::get`] only sees active
//! rows, [`Repository::get_including_deleted`] also sees the trash. Ownership is *not*
//! checked here; callers decide what "not yours" means.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{FileRow, UsageRow, user_id};
use crate::{FileRecord, Usage, timestamp_now};
use exn::ResultExt;
use hoard_storage::Digest;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Outcome of [`Repository::purge`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Purged {
    /// The row as it was just before deletion.
    pub record: FileRecord,
    /// Rows (any user, trashed or not) still referencing the same digest.
    pub remaining: u64,
}

#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}

fn records(rows: Vec<FileRow>) -> Result<Vec<FileRecord>> {
    rows.into_iter().map(FileRecord::try_from).collect()
}

/// Escape `LIKE` wildcards so user input only ever matches literally.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

impl Repository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // =========================================================================
    // Insert
    // =========================================================================

    pub async fn insert(&self, record: &FileRecord) -> Result<()> {
        let row = FileRow::try_from(record)?;
        sqlx::query(include_str!("../queries/insert_file.sql"))
            .bind(row.id)
            .bind(row.user_id)
            .bind(row.name)
            .bind(row.digest)
            .bind(row.blob_path)
            .bind(row.virtual_path)
            .bind(row.batch_name)
            .bind(row.mime_type)
            .bind(row.size)
            .bind(row.encrypted_size)
            .bind(row.created_at)
            .bind(row.updated_at)
            .bind(row.deleted_at)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Active record by id.
    pub async fn get(&self, id: Uuid) -> Result<Option<FileRecord>> {
        let row: Option<FileRow> = sqlx::query_as(include_str!("../queries/get_active.sql"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(FileRecord::try_from).transpose()
    }

    /// Record by id, whether active or in the trash.
    pub async fn get_including_deleted(&self, id: Uuid) -> Result<Option<FileRecord>> {
        let row: Option<FileRow> = sqlx::query_as(include_str!("../queries/get_including_deleted.sql"))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(FileRecord::try_from).transpose()
    }

    /// Oldest active file of `user` with this content. Folder markers share
    /// the empty digest and are never returned.
    pub async fn find_by_user_digest(&self, user: u64, digest: &Digest) -> Result<Option<FileRecord>> {
        let row: Option<FileRow> = sqlx::query_as(include_str!("../queries/find_by_user_digest.sql"))
            .bind(user_id(user)?)
            .bind(digest.as_str())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(FileRecord::try_from).transpose()
    }

    /// Rows referencing `digest` across every user, trash included.
    pub async fn count_by_digest(&self, digest: &Digest) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as(include_str!("../queries/count_by_digest.sql"))
            .bind(digest.as_str())
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("reference count"))
    }

    // =========================================================================
    // Listings
    // =========================================================================

    /// Active records whose virtual path is exactly `directory`, ordered by
    /// batch name then display name.
    pub async fn list_directory(&self, user: u64, directory: &str) -> Result<Vec<FileRecord>> {
        let rows: Vec<FileRow> = sqlx::query_as(include_str!("../queries/list_directory.sql"))
            .bind(user_id(user)?)
            .bind(directory)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        records(rows)
    }

    /// Distinct virtual paths of active records strictly below `directory`.
    pub async fn list_subdirectory_paths(&self, user: u64, directory: &str) -> Result<Vec<String>> {
        let paths: Vec<(String,)> = sqlx::query_as(include_str!("../queries/list_subdirectory_paths.sql"))
            .bind(user_id(user)?)
            .bind(directory)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(paths.into_iter().map(|(path,)| path).collect())
    }

    /// Active records at or anywhere below `directory`.
    pub async fn list_recursive(&self, user: u64, directory: &str) -> Result<Vec<FileRecord>> {
        let rows: Vec<FileRow> = sqlx::query_as(include_str!("../queries/list_recursive.sql"))
            .bind(user_id(user)?)
            .bind(directory)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        records(rows)
    }

    /// Trashed records, most recently deleted first.
    pub async fn list_trash(&self, user: u64) -> Result<Vec<FileRecord>> {
        let rows: Vec<FileRow> = sqlx::query_as(include_str!("../queries/list_trash.sql"))
            .bind(user_id(user)?)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        records(rows)
    }

    /// Case-insensitive (ASCII) substring match on display names.
    pub async fn search_by_name(&self, user: u64, query: &str, limit: u32) -> Result<Vec<FileRecord>> {
        let rows: Vec<FileRow> = sqlx::query_as(include_str!("../queries/search_by_name.sql"))
            .bind(user_id(user)?)
            .bind(escape_like(query))
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        records(rows)
    }

    /// Newest uploads first; folder markers are left out.
    pub async fn list_recent(&self, user: u64, limit: u32) -> Result<Vec<FileRecord>> {
        let rows: Vec<FileRow> = sqlx::query_as(include_str!("../queries/list_recent.sql"))
            .bind(user_id(user)?)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        records(rows)
    }

    /// Active records whose MIME type starts with `prefix` (e.g. `image/`).
    pub async fn list_by_mime_prefix(&self, user: u64, prefix: &str, limit: u32) -> Result<Vec<FileRecord>> {
        let rows: Vec<FileRow> = sqlx::query_as(include_str!("../queries/list_by_mime_prefix.sql"))
            .bind(user_id(user)?)
            .bind(prefix)
            .bind(i64::from(limit))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        records(rows)
    }

    pub async fn usage(&self, user: u64) -> Result<Usage> {
        let row: UsageRow = sqlx::query_as(include_str!("../queries/usage.sql"))
            .bind(user_id(user)?)
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Usage::try_from(row)
    }

    // =========================================================================
    // Updates
    // =========================================================================

    /// Move and/or rename an active record. `false` if no active row matched.
    pub async fn update_location(&self, id: Uuid, virtual_path: &str, name: &str) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/update_location.sql"))
            .bind(virtual_path)
            .bind(name)
            .bind(timestamp_now().unix_timestamp())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Move an active record to the trash. `false` if no active row matched.
    pub async fn soft_delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.soft_delete_many(&[id]).await? > 0)
    }

    /// Trash several records in one transaction: either all of them move or
    /// none do. Already-trashed rows are skipped and not counted.
    pub async fn soft_delete_many(&self, ids: &[Uuid]) -> Result<u64> {
        let now = timestamp_now().unix_timestamp();
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let mut affected = 0;
        for id in ids {
            affected += sqlx::query(include_str!("../queries/soft_delete.sql"))
                .bind(now)
                .bind(id.to_string())
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?
                .rows_affected();
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(affected)
    }

    /// Clear the deletion mark. Restoring an active row just bumps
    /// `updated_at`. `false` if no row matched at all.
    pub async fn restore(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query(include_str!("../queries/restore.sql"))
            .bind(timestamp_now().unix_timestamp())
            .bind(id.to_string())
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(result.rows_affected() > 0)
    }

    /// Delete a row for good and report how many rows still reference its
    /// blob.
    ///
    /// The lookup, the reference count and the delete share one
    /// transaction, so two purges of the last two references can't both
    /// conclude the other one is still around.
    pub async fn purge(&self, id: Uuid) -> Result<Option<Purged>> {
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        let row: Option<FileRow> = sqlx::query_as(include_str!("../queries/get_including_deleted.sql"))
            .bind(id.to_string())
            .fetch_optional(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let Some(row) = row else {
            return Ok(None);
        };
        let record = FileRecord::try_from(row)?;
        sqlx::query(include_str!("../queries/delete_by_id.sql"))
            .bind(id.to_string())
            .execute(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        let (remaining,): (i64,) = sqlx::query_as(include_str!("../queries/count_by_digest.sql"))
            .bind(record.digest.as_str())
            .fetch_one(&mut *tx)
            .await
            .or_raise(|| ErrorKind::Database)?;
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        let remaining = u64::try_from(remaining).or_raise(|| ErrorKind::InvalidData("reference count"))?;
        tracing::debug!(id = %id, digest = %record.digest, remaining, "Purged catalog row");
        Ok(Some(Purged { record, remaining }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    async fn repo() -> Repository {
        let db = Database::connect_in_memory().await.unwrap();
        Repository::from(&db)
    }

    fn file(user: u64, name: &str, content: &[u8], path: &str) -> FileRecord {
        FileRecord::new(user, name, Digest::of(content), path)
            .with_sizes(content.len() as u64, content.len() as u64 + 28)
            .with_mime_type("text/plain")
    }

    #[tokio::test]
    async fn insert_and_get() {
        let repo = repo().await;
        let record = file(1, "a.txt", b"a", "/");
        repo.insert(&record).await.unwrap();

        assert_eq!(repo.get(record.id).await.unwrap(), Some(record.clone()));
        assert_eq!(repo.get_including_deleted(record.id).await.unwrap(), Some(record));
        assert_eq!(repo.get(Uuid::new_v4()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn trashed_rows_are_hidden_from_get() {
        let repo = repo().await;
        let record = file(1, "a.txt", b"a", "/");
        repo.insert(&record).await.unwrap();
        assert!(repo.soft_delete(record.id).await.unwrap());
        // Second delete finds nothing active.
        assert!(!repo.soft_delete(record.id).await.unwrap());

        assert_eq!(repo.get(record.id).await.unwrap(), None);
        assert!(repo.get_including_deleted(record.id).await.unwrap().unwrap().is_deleted());

        assert!(repo.restore(record.id).await.unwrap());
        assert!(!repo.get(record.id).await.unwrap().unwrap().is_deleted());
    }

    #[tokio::test]
    async fn directory_listing_is_exact_and_ordered() {
        let repo = repo().await;
        let later = file(1, "b.txt", b"b", "/docs/");
        let earlier = file(1, "a.txt", b"a", "/docs/");
        let batched = file(1, "0.txt", b"0", "/docs/").with_batch_name(Some("zzz".to_string()));
        let nested = file(1, "c.txt", b"c", "/docs/deep/");
        let other_user = file(2, "x.txt", b"x", "/docs/");
        for record in [&later, &earlier, &batched, &nested, &other_user] {
            repo.insert(record).await.unwrap();
        }

        let names: Vec<_> = repo.list_directory(1, "/docs/").await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(names, ["a.txt", "b.txt", "0.txt"]);

        let deeper = repo.list_subdirectory_paths(1, "/docs/").await.unwrap();
        assert_eq!(deeper, ["/docs/deep/"]);

        let recursive = repo.list_recursive(1, "/docs/").await.unwrap();
        assert_eq!(recursive.len(), 4);
    }

    #[tokio::test]
    async fn prefix_matching_is_literal() {
        let repo = repo().await;
        repo.insert(&file(1, "a", b"a", "/a_b/")).await.unwrap();
        repo.insert(&file(1, "b", b"b", "/axb/")).await.unwrap();

        let matched = repo.list_recursive(1, "/a_b/").await.unwrap();
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].virtual_path, "/a_b/");
    }

    #[tokio::test]
    async fn finds_existing_content_per_user() {
        let repo = repo().await;
        let mine = file(1, "a.txt", b"same", "/");
        repo.insert(&mine).await.unwrap();

        let digest = Digest::of(b"same");
        assert_eq!(repo.find_by_user_digest(1, &digest).await.unwrap(), Some(mine.clone()));
        assert_eq!(repo.find_by_user_digest(2, &digest).await.unwrap(), None);

        repo.soft_delete(mine.id).await.unwrap();
        assert_eq!(repo.find_by_user_digest(1, &digest).await.unwrap(), None);
    }

    #[tokio::test]
    async fn folder_markers_are_not_content() {
        let repo = repo().await;
        repo.insert(&FileRecord::directory_marker(1, "photos", "/")).await.unwrap();
        assert_eq!(repo.find_by_user_digest(1, &Digest::empty()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn counts_references_across_users_and_trash() {
        let repo = repo().await;
        let one = file(1, "a", b"shared", "/");
        let two = file(2, "b", b"shared", "/");
        repo.insert(&one).await.unwrap();
        repo.insert(&two).await.unwrap();
        repo.soft_delete(two.id).await.unwrap();

        assert_eq!(repo.count_by_digest(&Digest::of(b"shared")).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn purge_reports_remaining_references() {
        let repo = repo().await;
        let one = file(1, "a", b"shared", "/");
        let two = file(2, "b", b"shared", "/");
        repo.insert(&one).await.unwrap();
        repo.insert(&two).await.unwrap();

        let first = repo.purge(one.id).await.unwrap().unwrap();
        assert_eq!(first.record, one);
        assert_eq!(first.remaining, 1);

        let second = repo.purge(two.id).await.unwrap().unwrap();
        assert_eq!(second.remaining, 0);

        assert_eq!(repo.purge(two.id).await.unwrap(), None);
        assert_eq!(repo.get_including_deleted(one.id).await.unwrap(), None);
    }

    #[tokio::test]
    async fn soft_delete_many_is_all_or_nothing_per_call() {
        let repo = repo().await;
        let a = file(1, "a", b"a", "/x/");
        let b = file(1, "b", b"b", "/x/y/");
        repo.insert(&a).await.unwrap();
        repo.insert(&b).await.unwrap();

        assert_eq!(repo.soft_delete_many(&[a.id, b.id, Uuid::new_v4()]).await.unwrap(), 2);
        assert_eq!(repo.list_trash(1).await.unwrap().len(), 2);
        assert!(repo.list_recursive(1, "/x/").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn moves_and_renames() {
        let repo = repo().await;
        let record = file(1, "a.txt", b"a", "/");
        repo.insert(&record).await.unwrap();

        assert!(repo.update_location(record.id, "/archive/", "b.txt").await.unwrap());
        let moved = repo.get(record.id).await.unwrap().unwrap();
        assert_eq!((moved.virtual_path.as_str(), moved.name.as_str()), ("/archive/", "b.txt"));

        repo.soft_delete(record.id).await.unwrap();
        assert!(!repo.update_location(record.id, "/", "c.txt").await.unwrap());
    }

    #[tokio::test]
    async fn usage_by_category() {
        let repo = repo().await;
        let records = [
            file(1, "a.png", &[0; 10], "/").with_mime_type("image/png"),
            file(1, "b.mp4", &[0; 20], "/").with_mime_type("video/mp4"),
            file(1, "c.pdf", &[0; 30], "/").with_mime_type("application/pdf"),
            file(1, "d.docx", &[0; 40], "/")
                .with_mime_type("application/vnd.openxmlformats-officedocument.wordprocessingml.document"),
            file(1, "e.bin", &[0; 50], "/").with_mime_type("application/octet-stream"),
            file(1, "f.txt", &[0; 60], "/"),
            file(2, "other-user.txt", &[0; 70], "/"),
        ];
        for record in &records {
            repo.insert(record).await.unwrap();
        }
        repo.soft_delete(records[5].id).await.unwrap();

        let usage = repo.usage(1).await.unwrap();
        assert_eq!(usage.total_used, 150);
        assert_eq!(usage.images, 10);
        assert_eq!(usage.videos, 20);
        assert_eq!(usage.documents, 70);
        assert_eq!(usage.other, 50);
        assert_eq!(usage.trash, 60);

        assert_eq!(repo.usage(3).await.unwrap(), Usage::default());
    }

    #[rstest]
    #[case("report", 2)]
    #[case("REPORT", 2)]
    #[case("100%", 1)]
    #[case("_", 1)]
    #[case("missing", 0)]
    #[tokio::test]
    async fn search_matches_literal_substrings(#[case] query: &str, #[case] expected: usize) {
        let repo = repo().await;
        for name in ["report-q1.pdf", "Report 100%.txt", "notes_v2.md"] {
            repo.insert(&file(1, name, name.as_bytes(), "/")).await.unwrap();
        }
        assert_eq!(repo.search_by_name(1, query, 50).await.unwrap().len(), expected);
    }

    #[tokio::test]
    async fn recent_and_mime_listings() {
        let repo = repo().await;
        let mut older = file(1, "old.png", b"old", "/").with_mime_type("image/png");
        older.created_at = older.created_at - time::Duration::hours(1);
        let newer = file(1, "new.txt", b"new", "/");
        let marker = FileRecord::directory_marker(1, "folder", "/");
        for record in [&older, &newer, &marker] {
            repo.insert(record).await.unwrap();
        }

        let recent: Vec<_> = repo.list_recent(1, 10).await.unwrap().into_iter().map(|r| r.name).collect();
        assert_eq!(recent, ["new.txt", "old.png"]);

        let images = repo.list_by_mime_prefix(1, "image/", 10).await.unwrap();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].name, "old.png");
    }

    #[test]
    fn escapes_like_wildcards() {
        assert_eq!(escape_like(r"50%_off\"), r"50\%\_off\\");
    }
}
