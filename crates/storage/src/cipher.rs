//! Chunked AES-256-GCM.
//!
//! # Blob format
//!
//! ```text
//! [ nonce (12) ][ sealed chunk 0 ][ sealed chunk 1 ] ... [ sealed chunk n ]
//! ```
//!
//! Plaintext is split into 64 KiB chunks (the last one may be shorter, and an
//! empty plaintext produces no chunks at all). Each chunk is sealed with the
//! current nonce and no associated data, which appends a 16 byte tag. After
//! every chunk the nonce is incremented as a 96-bit big-endian counter.
//!
//! The total encrypted size is therefore `12 + len + 16 * ceil(len / 64Ki)`.
//!
//! Note that chunks aren't bound to their position beyond the nonce counter,
//! so dropping whole chunks off the *end* of a blob goes unnoticed. Anything
//! else (flipped bits, truncation inside a chunk, trailing junk, reordering)
//! fails authentication.

use crate::error::{ErrorKind, Result};
use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use exn::ResultExt;
use std::fmt;
use std::io::{self, Read, Write};

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;
pub const TAG_LEN: usize = 16;
/// Plaintext bytes per sealed chunk.
pub const CHUNK_SIZE: usize = 64 * 1024;
/// Ciphertext bytes per full chunk, including its tag.
pub const SEALED_CHUNK_SIZE: usize = CHUNK_SIZE + TAG_LEN;

/// Size on disk of a blob holding `plaintext_len` bytes.
pub const fn encrypted_len(plaintext_len: u64) -> u64 {
    let chunks = plaintext_len.div_ceil(CHUNK_SIZE as u64);
    NONCE_LEN as u64 + plaintext_len + chunks * TAG_LEN as u64
}

/// 256-bit symmetric key.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey([u8; KEY_LEN]);

impl EncryptionKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let key = <[u8; KEY_LEN]>::try_from(bytes)
            .or_raise(|| ErrorKind::InvalidKey("key must be exactly 32 bytes"))?;
        Ok(Self(key))
    }

    /// Accepts either 32 raw characters or 64 hex digits.
    pub fn parse(input: &str) -> Result<Self> {
        match input.len() {
            KEY_LEN => Self::from_bytes(input.as_bytes()),
            64 => {
                let bytes = hex::decode(input).or_raise(|| ErrorKind::InvalidKey("key is not valid hex"))?;
                Self::from_bytes(&bytes)
            },
            _ => exn::bail!(ErrorKind::InvalidKey("expected 32 bytes or 64 hex characters")),
        }
    }
}

impl From<[u8; KEY_LEN]> for EncryptionKey {
    fn from(key: [u8; KEY_LEN]) -> Self {
        Self(key)
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// Streaming encrypt/decrypt over the chunked format above.
///
/// Both directions are blocking; run them on `spawn_blocking`.
#[derive(Clone)]
pub struct ChunkCipher {
    aead: Aes256Gcm,
}

impl fmt::Debug for ChunkCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkCipher").finish_non_exhaustive()
    }
}

impl ChunkCipher {
    pub fn new(key: &EncryptionKey) -> Self {
        Self { aead: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&key.0)) }
    }

    /// Encrypt everything `src` yields into `dst` under a fresh random nonce.
    ///
    /// Returns the number of bytes written to `dst`.
    pub fn encrypt<R: Read, W: Write>(&self, src: R, dst: W) -> Result<u64> {
        let mut nonce = [0u8; NONCE_LEN];
        getrandom::getrandom(&mut nonce).or_raise(|| ErrorKind::Cipher)?;
        self.encrypt_with_nonce(nonce, src, dst)
    }

    fn encrypt_with_nonce<R: Read, W: Write>(&self, mut nonce: [u8; NONCE_LEN], mut src: R, mut dst: W) -> Result<u64> {
        dst.write_all(&nonce).map_err(ErrorKind::Io)?;
        let mut written = NONCE_LEN as u64;
        let mut chunk = vec![0u8; CHUNK_SIZE];
        loop {
            let filled = read_full(&mut src, &mut chunk).map_err(ErrorKind::Io)?;
            if filled == 0 {
                break;
            }
            let sealed = self
                .aead
                .encrypt(Nonce::from_slice(&nonce), &chunk[..filled])
                .map_err(|_| ErrorKind::Cipher)?;
            dst.write_all(&sealed).map_err(ErrorKind::Io)?;
            written += sealed.len() as u64;
            increment(&mut nonce);
            if filled < CHUNK_SIZE {
                break;
            }
        }
        dst.flush().map_err(ErrorKind::Io)?;
        Ok(written)
    }

    /// Decrypt a blob from `src` into `dst`.
    ///
    /// Plaintext is written chunk by chunk as each one authenticates, so on
    /// failure `dst` may already hold a prefix of the file. Use
    /// [`verify`](Self::verify) first when that matters.
    ///
    /// Returns the number of plaintext bytes written.
    pub fn decrypt<R: Read, W: Write>(&self, mut src: R, mut dst: W) -> Result<u64> {
        let mut nonce = [0u8; NONCE_LEN];
        if read_full(&mut src, &mut nonce).map_err(ErrorKind::Io)? < NONCE_LEN {
            exn::bail!(ErrorKind::CorruptOrTampered);
        }
        let mut written = 0u64;
        let mut sealed = vec![0u8; SEALED_CHUNK_SIZE];
        loop {
            let filled = read_full(&mut src, &mut sealed).map_err(ErrorKind::Io)?;
            if filled == 0 {
                break;
            }
            let plain = self
                .aead
                .decrypt(Nonce::from_slice(&nonce), &sealed[..filled])
                .map_err(|_| ErrorKind::CorruptOrTampered)?;
            dst.write_all(&plain).map_err(ErrorKind::Io)?;
            written += plain.len() as u64;
            increment(&mut nonce);
            if filled < SEALED_CHUNK_SIZE {
                // A short chunk must be the last one.
                let mut probe = [0u8; 1];
                if read_full(&mut src, &mut probe).map_err(ErrorKind::Io)? != 0 {
                    exn::bail!(ErrorKind::CorruptOrTampered);
                }
                break;
            }
        }
        dst.flush().map_err(ErrorKind::Io)?;
        Ok(written)
    }

    /// Authenticate every chunk without keeping any plaintext.
    pub fn verify<R: Read>(&self, src: R) -> Result<u64> {
        self.decrypt(src, io::sink())
    }
}

/// Fill `buf` as far as the reader allows. Only returns short at EOF.
fn read_full<R: Read>(src: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match src.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {},
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// 96-bit big-endian increment, wrapping on overflow.
fn increment(nonce: &mut [u8; NONCE_LEN]) {
    for byte in nonce.iter_mut().rev() {
        *byte = byte.wrapping_add(1);
        if *byte != 0 {
            break;
        }
    }
}
