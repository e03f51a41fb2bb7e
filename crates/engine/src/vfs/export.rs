use crate::Context;
use crate::error::{Error, ErrorKind, Result};
use crate::path::normalize_directory;
use exn::ResultExt;
use hoard_catalog::{FileRecord, Repository};
use hoard_storage::BlobStore;
use std::collections::HashSet;
use std::io::Write;
use tracing::instrument;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// Summary of a finished export.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Exported {
    pub files: usize,
    /// Plaintext bytes written into the archive, before compression.
    pub bytes: u64,
}

/// Zip up every file at or below `path`, decrypting straight into the
/// archive.
///
/// Entry names are relative to the exported folder. Folder markers are
/// skipped; empty folders don't appear in the archive. The archive is
/// written front to back, so `sink` can be a pipe or a socket.
///
/// Every blob is authenticated before the first archive byte is written, so
/// a damaged file fails the export with [`ErrorKind::CorruptOrTampered`]
/// while `sink` is still untouched. Other failures are reported as
/// [`ErrorKind::Incomplete`] naming the entry involved.
#[instrument(skip(blobs, catalog, _ctx, sink))]
pub async fn export_folder_as_zip<W>(
    blobs: &BlobStore,
    catalog: &Repository,
    _ctx: &Context,
    user: u64,
    path: &str,
    sink: W,
) -> Result<(Exported, W)>
where
    W: Write + Send + 'static,
{
    let root = normalize_directory(path)?;
    let records: Vec<FileRecord> = catalog
        .list_recursive(user, &root)
        .await
        .or_raise(|| ErrorKind::Catalog)?
        .into_iter()
        .filter(|r| !r.is_directory())
        .collect();

    let mut names = EntryNames::default();
    let entries: Vec<(String, FileRecord)> = records.into_iter().map(|r| (names.assign(&root, &r), r)).collect();

    for (name, record) in &entries {
        blobs.verify(&record.blob_path).await.map_err(|err| at_entry(err, "verify", name))?;
    }

    let mut zip = ZipWriter::new_stream(sink);
    let mut exported = Exported::default();
    for (name, record) in &entries {
        let options = SimpleFileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .large_file(record.size >= u64::from(u32::MAX));
        zip.start_file(name.as_str(), options).or_raise(|| ErrorKind::Incomplete { step: format!("add {name}") })?;
        let (written, writer) =
            blobs.decrypt_into(&record.blob_path, zip).await.map_err(|err| at_entry(err, "write", name))?;
        zip = writer;
        exported.files += 1;
        exported.bytes += written;
    }
    let sink = zip.finish().or_raise(|| ErrorKind::Incomplete { step: "finish archive".to_string() })?.into_inner();

    tracing::info!(files = exported.files, bytes = exported.bytes, "Exported folder");
    Ok((exported, sink))
}

/// Tampering is reported as itself; anything else becomes `Incomplete` at
/// `action` on `name`.
fn at_entry(err: hoard_storage::error::Error, action: &str, name: &str) -> Error {
    let err = ErrorKind::storage(err);
    if matches!(&*err, ErrorKind::CorruptOrTampered) {
        tracing::warn!(entry = name, "Blob failed authentication during export");
        return err;
    }
    err.raise(ErrorKind::Incomplete { step: format!("{action} {name}") })
}

/// Hands out archive entry names, adding ` (n)` before the extension when a
/// name is already taken.
#[derive(Default)]
struct EntryNames {
    taken: HashSet<String>,
}

impl EntryNames {
    fn assign(&mut self, root: &str, record: &FileRecord) -> String {
        let folder = record.virtual_path.strip_prefix(root).unwrap_or_default();
        let wanted = format!("{folder}{}", record.name);
        if self.taken.insert(wanted.clone()) {
            return wanted;
        }
        let (stem, extension) = match record.name.rsplit_once('.') {
            Some((stem, extension)) if !stem.is_empty() => (stem, Some(extension)),
            _ => (record.name.as_str(), None),
        };
        let mut n = 1;
        loop {
            let candidate = match extension {
                Some(extension) => format!("{folder}{stem} ({n}).{extension}"),
                None => format!("{folder}{stem} ({n})"),
            };
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}
