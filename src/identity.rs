//! Content identity derivation.
//!
//! A memory's id is URI-shaped and derived one of two ways:
//!
//! - **Location identity**: a resource that carries a canonical URL uses
//!   that URL as its id.
//! - **Content identity**: anything else gets a `cid:` URI built from the
//!   SHA-256 digest of its raw bytes.
//!
//! Content identity is deterministic: byte-identical input always yields
//! the same id, so remembering the same bytes twice upserts one memory
//! instead of creating two.

use crate::{Error, Result};
use sha2::{Digest, Sha256};
use url::Url;

/// Derives a `cid:` URI from the SHA-256 digest of `bytes`.
pub fn content_id(bytes: &[u8]) -> Result<Url> {
    let digest = Sha256::digest(bytes);
    let uri = format!("cid:{}", hex::encode(digest));
    Url::parse(&uri).map_err(|e| Error::op("content_id", e))
}

/// Returns the id for a rememberable: its declared location when present,
/// otherwise a content-derived `cid:` URI.
pub fn derive_id(url: Option<&Url>, bytes: &[u8]) -> Result<Url> {
    match url {
        Some(location) => Ok(location.clone()),
        None => content_id(bytes),
    }
}
