//! SHA-256 content identifiers.

use crate::error::{ErrorKind, Result};
use crate::layout;
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::PathBuf;
use std::str::FromStr;

/// SHA-256 of zero bytes. Shared by every folder marker.
pub const EMPTY_DIGEST: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

/// Lowercase hex SHA-256 of a blob's plaintext.
///
/// Only ever constructed from a hasher or from a string that passed
/// validation, so anything holding a `Digest` can derive a blob path from it
/// without further checks.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest(String);

impl Digest {
    pub fn empty() -> Self {
        Self(EMPTY_DIGEST.to_string())
    }

    /// Hash an in-memory buffer.
    pub fn of(bytes: impl AsRef<[u8]>) -> Self {
        Self(hex::encode(Sha256::digest(bytes.as_ref())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Where this blob lives, relative to the storage root.
    pub fn blob_path(&self) -> PathBuf {
        layout::blob_path(&self.0)
    }
}

impl FromStr for Digest {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self> {
        let valid = s.len() == 64 && s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'));
        if !valid {
            exn::bail!(ErrorKind::InvalidDigest(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Stream `content` through SHA-256, then rewind it.
///
/// Returns the digest along with the number of bytes actually read, which
/// callers should trust over whatever size the client declared.
pub fn digest<R: Read + Seek + ?Sized>(content: &mut R) -> Result<(Digest, u64)> {
    let mut hasher = Sha256::new();
    let size = io::copy(content, &mut hasher).map_err(ErrorKind::Io)?;
    content.seek(SeekFrom::Start(0)).map_err(ErrorKind::Io)?;
    Ok((Digest(hex::encode(hasher.finalize())), size))
}
