//! # Hashing Utilities
//!
//! Two hash functions, and no more without a very good reason:
//!
//! - **SHA-256** - transaction IDs are `double_sha256` of the canonical
//!   transaction bytes, the same construction freight partners already use
//!   to reference bills of lading on other ledgers.
//! - **BLAKE3** - the rolling application hash over broadcast records.

use sha2::{Digest, Sha256};

use crate::config::HASH_OUTPUT_LENGTH;

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use bftx_protocol::crypto::sha256;
///
/// let hash = sha256(b"bill of lading");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().to_vec()
}

/// Compute the double-SHA-256 hash: `SHA-256(SHA-256(data))`.
///
/// Used for transaction IDs. The double hash closes the length-extension
/// door that plain SHA-256 leaves open.
pub fn double_sha256(data: &[u8]) -> Vec<u8> {
    sha256(&sha256(data))
}

/// Compute the BLAKE3 hash of the input data.
pub fn blake3_hash(data: &[u8]) -> [u8; HASH_OUTPUT_LENGTH] {
    *blake3::hash(data).as_bytes()
}

/// Hash multiple byte slices together without concatenating them first.
///
/// The ledger folds each broadcast record into the application hash with
/// `blake3_hash_multi(&[previous_hash, record_bytes])`.
pub fn blake3_hash_multi(parts: &[&[u8]]) -> [u8; HASH_OUTPUT_LENGTH] {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(part);
    }
    *hasher.finalize().as_bytes()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_vector() {
        // SHA-256("abc") from FIPS 180-2.
        assert_eq!(
            hex::encode(sha256(b"abc")),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_double_sha256_differs_from_single() {
        let data = b"BOL-0001";
        assert_ne!(sha256(data), double_sha256(data));
        assert_eq!(double_sha256(data), sha256(&sha256(data)));
    }

    #[test]
    fn test_blake3_deterministic() {
        assert_eq!(blake3_hash(b"vessel"), blake3_hash(b"vessel"));
        assert_ne!(blake3_hash(b"vessel"), blake3_hash(b"vessel2"));
    }

    #[test]
    fn test_blake3_hash_multi_matches_concatenation() {
        let joined = blake3_hash(b"portloading");
        let split = blake3_hash_multi(&[b"port", b"loading"]);
        assert_eq!(joined, split);
    }
}
