//! Content-addressed, encrypted blob storage.
//!
//! Plaintext is identified by its SHA-256 ([`Digest`]), stored at a sharded
//! path derived from that digest ([`layout`]), and encrypted at rest with
//! chunked AES-256-GCM ([`cipher`]). The bytes themselves live wherever a
//! [`BlobBackend`] puts them.

pub mod backend;
pub mod cipher;
pub mod error;
pub mod hash;
pub mod layout;
mod path;
mod store;

pub use crate::backend::BlobBackend;
pub use crate::cipher::{ChunkCipher, EncryptionKey};
pub use crate::hash::Digest;
pub use crate::path::validate as validate_path;
pub use crate::store::{BlobStore, StoredBlob};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn BlobBackend + Send + Sync>;
