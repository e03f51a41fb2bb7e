//! Relative blob path validation.
//!
//! Blob paths are always relative to the storage root (`ab/cd/abcd...`).
//! Anything absolute, anything that climbs out with `..`, and anything
//! carrying a NUL byte is rejected before a backend gets to touch it.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

/// Validates a relative blob path and resolves `.`/`..` components.
///
/// # Returns
/// The resolved path, [`PathTraversal`](ErrorKind::PathTraversal) if the path
/// is absolute or would leave the root, or
/// [`InvalidPath`](ErrorKind::InvalidPath) if nothing is left after resolving.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use hoard_storage::validate_path;
/// assert!(validate_path("ab/cd/abcdef").is_ok());
/// assert!(validate_path("ab/../misc/abc").is_ok());
/// assert!(validate_path("../etc/passwd").is_err());
/// assert!(validate_path("/etc/passwd").is_err());
/// assert_eq!(validate_path("ab/./cd//ef/").unwrap(), Path::new("ab/cd/ef"));
/// ```
pub fn validate(path: impl AsRef<Path>) -> Result<PathBuf> {
    let original = path.as_ref();
    let traversal = || ErrorKind::PathTraversal(original.to_path_buf());
    let mut components = Vec::new();
    for component in original.components() {
        match component {
            Component::Normal(s) => {
                // C syscalls would silently truncate at the NUL.
                if s.as_encoded_bytes().contains(&0) {
                    exn::bail!(traversal());
                }
                components.push(s);
            },
            Component::CurDir => {},
            Component::RootDir | Component::Prefix(_) => exn::bail!(traversal()),
            Component::ParentDir => {
                if components.pop().is_none() {
                    exn::bail!(traversal());
                }
            },
        }
    }
    match components.is_empty() {
        true => exn::bail!(ErrorKind::InvalidPath(original.to_path_buf())),
        false => Ok(components.into_iter().collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("ab/cd/abcdef", "ab/cd/abcdef")]
    #[case("misc/abc", "misc/abc")]
    #[case("ab//cd/./ef", "ab/cd/ef")]
    #[case("ab/cd/..", "ab")]
    #[case("ab/cd/ef/", "ab/cd/ef")]
    fn resolves_paths_inside_root(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(validate(input).unwrap(), Path::new(expected));
    }

    #[rstest]
    #[case("../etc/passwd")]
    #[case("ab/../../etc/passwd")]
    #[case("..")]
    #[case("/etc/passwd")]
    #[case("ab/c\0d")]
    fn rejects_escapes(#[case] input: &str) {
        let err = validate(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::PathTraversal(_)));
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("ab/..")]
    fn rejects_empty_paths(#[case] input: &str) {
        let err = validate(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }
}
