//! Folder views over the flat catalog.
//!
//! The catalog stores one row per file with the folder it sits in. Folders
//! exist in two ways: explicitly, as a marker row (`inode/directory`) that
//! keeps an empty folder visible, and implicitly, whenever some deeper row
//! has a path below them. Listings merge both.

mod export;
mod folder;
mod list;
mod search;

pub use self::export::{Exported, export_folder_as_zip};
pub use self::folder::{create_folder, delete_folder, move_file, rename_file};
pub use self::list::{Entry, list_directory};
pub use self::search::{images, recent, search};
