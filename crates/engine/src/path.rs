//! Virtual path rules.
//!
//! Virtual paths are what users see: `/`, `/photos`, `/photos/2024`. They are
//! purely catalog metadata and never touch the filesystem, but they still get
//! the same suspicion as real paths. This module is the only place they are
//! cleaned; everything downstream trusts its output.
//!
//! Folders are stored with a trailing slash (`/photos/`) so prefix matching
//! can't confuse `/photos/` with `/photos-old/`.

use crate::error::{ErrorKind, Result};

const ILLEGAL: &[char] = &['<', '>', ':', '"', '|', '?', '*'];

fn forbidden(c: char) -> bool {
    ILLEGAL.contains(&c) || c.is_control()
}

/// Clean a user-supplied virtual path.
///
/// Empty input means the root. Empty and `.` segments are dropped, `..`
/// removes the previous segment, and a `..` with nothing left to remove is
/// rejected rather than clamped to the root.
///
/// ```
/// use hoard_engine::path::normalize;
/// assert_eq!(normalize("").unwrap(), "/");
/// assert_eq!(normalize("a//b/./c/").unwrap(), "/a/b/c");
/// assert_eq!(normalize("/a/b/../c").unwrap(), "/a/c");
/// assert!(normalize("../../etc/passwd").is_err());
/// assert!(normalize("/what?").is_err());
/// ```
pub fn normalize(raw: &str) -> Result<String> {
    if let Some(c) = raw.chars().find(|&c| forbidden(c)) {
        exn::bail!(ErrorKind::InvalidPath(format!("{raw:?} contains forbidden character {c:?}")));
    }
    let mut segments: Vec<&str> = Vec::new();
    for segment in raw.split('/') {
        match segment {
            "" | "." => {},
            ".." => {
                if segments.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidPath(format!("{raw:?} climbs above the root")));
                }
            },
            name => segments.push(name),
        }
    }
    Ok(format!("/{}", segments.join("/")))
}

/// Add the trailing slash folders are stored with. The root stays `/`.
pub fn as_directory(path: &str) -> String {
    match path.ends_with('/') {
        true => path.to_string(),
        false => format!("{path}/"),
    }
}

/// [`normalize`] followed by [`as_directory`].
pub fn normalize_directory(raw: &str) -> Result<String> {
    Ok(as_directory(&normalize(raw)?))
}

/// Check a display name (file or folder) for use inside a virtual folder.
pub fn validate_name(name: &str) -> Result<&str> {
    if name.is_empty() || name == "." || name == ".." {
        exn::bail!(ErrorKind::InvalidPath(format!("{name:?} is not a usable name")));
    }
    if let Some(c) = name.chars().find(|&c| c == '/' || forbidden(c)) {
        exn::bail!(ErrorKind::InvalidPath(format!("{name:?} contains forbidden character {c:?}")));
    }
    Ok(name)
}

/// Split a folder path into its parent folder and its own name:
/// `/a/b/` becomes (`/a/`, `b`). `None` for the root.
pub fn parent_and_name(directory: &str) -> Option<(&str, &str)> {
    let trimmed = directory.strip_suffix('/').unwrap_or(directory);
    let (parent, name) = trimmed.rsplit_once('/')?;
    if name.is_empty() {
        return None;
    }
    Some((&directory[..=parent.len()], name))
}

/// First path segment of `path` below `directory`, if `path` is strictly
/// deeper. `/a/` and `/a/b/c/` give `b`.
pub(crate) fn immediate_child<'a>(directory: &str, path: &'a str) -> Option<&'a str> {
    let rest = path.strip_prefix(directory)?;
    let (name, _) = rest.split_once('/')?;
    (!name.is_empty()).then_some(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", "/")]
    #[case("/", "/")]
    #[case("///", "/")]
    #[case("docs", "/docs")]
    #[case("/docs/", "/docs")]
    #[case("a//b/./c", "/a/b/c")]
    #[case("/a/b/../c", "/a/c")]
    #[case("/a/..", "/")]
    #[case("/100% real_files", "/100% real_files")]
    fn normalizes(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(normalize(raw).unwrap(), expected);
    }

    #[rstest]
    #[case("../../etc/passwd")]
    #[case("/..")]
    #[case("/a/../../b")]
    #[case("/a<b")]
    #[case("/a>b")]
    #[case("/c:/windows")]
    #[case("/\"quoted\"")]
    #[case("/pipe|d")]
    #[case("/what?")]
    #[case("/star*")]
    #[case("/nul\0byte")]
    #[case("/new\nline")]
    fn rejects(#[case] raw: &str) {
        let err = normalize(raw).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPath(_)));
    }

    #[test]
    fn directories_end_in_slash() {
        assert_eq!(as_directory("/"), "/");
        assert_eq!(as_directory("/a"), "/a/");
        assert_eq!(normalize_directory("a/b").unwrap(), "/a/b/");
    }

    #[rstest]
    #[case("report.pdf")]
    #[case("...")]
    #[case("with space")]
    fn accepts_names(#[case] name: &str) {
        assert_eq!(validate_name(name).unwrap(), name);
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("..")]
    #[case("a/b")]
    #[case("tab\there")]
    #[case("what?")]
    fn rejects_names(#[case] name: &str) {
        assert!(validate_name(name).is_err());
    }

    #[rstest]
    #[case("/a/", Some(("/", "a")))]
    #[case("/a/b/", Some(("/a/", "b")))]
    #[case("/a/b", Some(("/a/", "b")))]
    #[case("/", None)]
    fn splits_parent_and_name(#[case] directory: &str, #[case] expected: Option<(&str, &str)>) {
        assert_eq!(parent_and_name(directory), expected);
    }

    #[rstest]
    #[case("/", "/photos/", Some("photos"))]
    #[case("/", "/photos/2024/", Some("photos"))]
    #[case("/photos/", "/photos/2024/jan/", Some("2024"))]
    #[case("/photos/", "/photos/", None)]
    #[case("/photos/", "/photos-old/x/", None)]
    fn finds_immediate_child(#[case] directory: &str, #[case] path: &str, #[case] expected: Option<&str>) {
        assert_eq!(immediate_child(directory, path), expected);
    }
}
