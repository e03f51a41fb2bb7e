use crate::FileRecord;
use crate::error::{Error, ErrorKind};
use exn::{OptionExt, ResultExt};
use hoard_storage::Digest;
use std::path::PathBuf;
use time::UtcDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct FileRow {
    pub(crate) id: String,
    pub(crate) user_id: i64,
    pub(crate) name: String,
    pub(crate) digest: String,
    pub(crate) blob_path: String,
    pub(crate) virtual_path: String,
    pub(crate) batch_name: String,
    pub(crate) mime_type: String,
    pub(crate) size: i64,
    pub(crate) encrypted_size: i64,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
    pub(crate) deleted_at: Option<i64>,
}

pub(crate) fn user_id(user: u64) -> Result<i64, Error> {
    i64::try_from(user).or_raise(|| ErrorKind::InvalidData("user id"))
}

fn timestamp(seconds: i64, field: &'static str) -> Result<UtcDateTime, Error> {
    UtcDateTime::from_unix_timestamp(seconds).or_raise(|| ErrorKind::InvalidData(field))
}

impl TryFrom<&FileRecord> for FileRow {
    type Error = Error;
    fn try_from(record: &FileRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id.to_string(),
            user_id: user_id(record.user_id)?,
            name: record.name.clone(),
            digest: record.digest.to_string(),
            blob_path: record
                .blob_path
                .to_str()
                .ok_or_raise(|| ErrorKind::InvalidData("blob path"))?
                .to_string(),
            virtual_path: record.virtual_path.clone(),
            batch_name: record.batch_name.clone().unwrap_or_default(),
            mime_type: record.mime_type.clone(),
            size: i64::try_from(record.size).or_raise(|| ErrorKind::InvalidData("size"))?,
            encrypted_size: i64::try_from(record.encrypted_size).or_raise(|| ErrorKind::InvalidData("encrypted size"))?,
            created_at: record.created_at.unix_timestamp(),
            updated_at: record.updated_at.unix_timestamp(),
            deleted_at: record.deleted_at.map(|at| at.unix_timestamp()),
        })
    }
}

impl TryFrom<FileRow> for FileRecord {
    type Error = Error;
    fn try_from(row: FileRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: Uuid::parse_str(&row.id).or_raise(|| ErrorKind::InvalidData("id"))?,
            user_id: u64::try_from(row.user_id).or_raise(|| ErrorKind::InvalidData("user id"))?,
            name: row.name,
            digest: row.digest.parse::<Digest>().or_raise(|| ErrorKind::InvalidData("digest"))?,
            blob_path: PathBuf::from(row.blob_path),
            virtual_path: row.virtual_path,
            batch_name: Some(row.batch_name).filter(|batch| !batch.is_empty()),
            mime_type: row.mime_type,
            size: u64::try_from(row.size).or_raise(|| ErrorKind::InvalidData("size"))?,
            encrypted_size: u64::try_from(row.encrypted_size).or_raise(|| ErrorKind::InvalidData("encrypted size"))?,
            created_at: timestamp(row.created_at, "created at")?,
            updated_at: timestamp(row.updated_at, "updated at")?,
            deleted_at: row.deleted_at.map(|at| timestamp(at, "deleted at")).transpose()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row() -> FileRow {
        FileRow {
            id: "67e55044-10b1-426f-9247-bb680e5fe0c8".to_string(),
            user_id: 7,
            name: "report.pdf".to_string(),
            digest: "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824".to_string(),
            blob_path: "2c/f2/2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824".to_string(),
            virtual_path: "/work/".to_string(),
            batch_name: String::new(),
            mime_type: "application/pdf".to_string(),
            size: 5,
            encrypted_size: 33,
            created_at: 1_700_000_000,
            updated_at: 1_700_000_100,
            deleted_at: None,
        }
    }

    #[test]
    fn row_to_model() {
        let record = FileRecord::try_from(row()).unwrap();
        assert_eq!(record.user_id, 7);
        assert_eq!(record.batch_name, None);
        assert_eq!(record.digest, Digest::of(b"hello"));
        assert_eq!(record.created_at.unix_timestamp(), 1_700_000_000);
        assert!(!record.is_deleted());
    }

    #[test]
    fn model_to_row() {
        let record = FileRecord::new(3, "a.txt", Digest::of(b"a"), "/")
            .with_batch_name(Some("holiday".to_string()))
            .with_sizes(1, 29);
        let row = FileRow::try_from(&record).unwrap();
        assert_eq!(row.batch_name, "holiday");
        assert_eq!(row.encrypted_size, 29);
        assert_eq!(FileRecord::try_from(row).unwrap(), record);
    }

    #[test]
    fn rejects_corrupt_rows() {
        let mut bad_digest = row();
        bad_digest.digest = "not a digest".to_string();
        assert!(FileRecord::try_from(bad_digest).is_err());

        let mut negative = row();
        negative.size = -1;
        let err = FileRecord::try_from(negative).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidData("size")));
    }

    #[test]
    fn rejects_out_of_range_user() {
        let mut record = FileRecord::new(0, "a", Digest::empty(), "/");
        record.user_id = u64::MAX;
        assert!(FileRow::try_from(&record).is_err());
    }
}
