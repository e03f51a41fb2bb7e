mod file;
mod usage;

pub(crate) use self::file::{FileRow, user_id};
pub(crate) use self::usage::UsageRow;
