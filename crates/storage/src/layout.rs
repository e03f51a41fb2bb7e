//! Sharded on-disk layout.
//!
//! A blob lives at `<root>/<h[0..2]>/<h[2..4]>/<h>`. With 256 × 256 shard
//! directories even a few million blobs keep directory listings short.
//! Identifiers too short to shard go into the `misc/` bucket.

use std::path::PathBuf;

/// Bucket for identifiers shorter than four characters.
pub const MISC_BUCKET: &str = "misc";

/// Relative path (from the storage root) for the blob named `hash`.
///
/// Pure function of its input: the same hash always maps to the same path.
///
/// ```
/// use std::path::Path;
/// use hoard_storage::layout::blob_path;
/// assert_eq!(blob_path("abcdef"), Path::new("ab/cd/abcdef"));
/// assert_eq!(blob_path("abc"), Path::new("misc/abc"));
/// ```
pub fn blob_path(hash: &str) -> PathBuf {
    match (hash.get(0..2), hash.get(2..4)) {
        (Some(first), Some(second)) => [first, second, hash].iter().collect(),
        _ => [MISC_BUCKET, hash].iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::path::Path;

    #[rstest]
    #[case(
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
        "e3/b0/e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    )]
    #[case("abcd", "ab/cd/abcd")]
    #[case("abc", "misc/abc")]
    #[case("", "misc")]
    fn shards_by_prefix(#[case] hash: &str, #[case] expected: &str) {
        assert_eq!(blob_path(hash), Path::new(expected));
    }

    #[test]
    fn is_deterministic() {
        assert_eq!(blob_path("0123456789"), blob_path("0123456789"));
    }
}
