use crate::Usage;
use crate::error::{Error, ErrorKind};
use exn::ResultExt;

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct UsageRow {
    total_used: i64,
    images: i64,
    videos: i64,
    documents: i64,
    trash: i64,
}

fn bytes(value: i64, field: &'static str) -> Result<u64, Error> {
    u64::try_from(value).or_raise(|| ErrorKind::InvalidData(field))
}

impl TryFrom<UsageRow> for Usage {
    type Error = Error;
    fn try_from(row: UsageRow) -> Result<Self, Self::Error> {
        let total_used = bytes(row.total_used, "total used")?;
        let images = bytes(row.images, "image usage")?;
        let videos = bytes(row.videos, "video usage")?;
        let documents = bytes(row.documents, "document usage")?;
        Ok(Self {
            total_used,
            images,
            videos,
            documents,
            other: total_used.saturating_sub(images + videos + documents),
            trash: bytes(row.trash, "trash usage")?,
        })
    }
}
