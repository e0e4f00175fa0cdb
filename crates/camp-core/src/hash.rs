//! Stable content hashing.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::errors::CampError;
use crate::serde::to_canonical_json_bytes;

/// Computes a stable SHA256 hash for the provided serializable value.
pub fn stable_hash_string<T: Serialize>(value: &T) -> Result<String, CampError> {
    let bytes = to_canonical_json_bytes(value)?;
    Ok(bytes_hash_string(&bytes))
}

/// Computes the SHA256 hex digest of raw bytes.
pub fn bytes_hash_string(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}
