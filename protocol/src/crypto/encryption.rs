//! # AES-256-GCM Encryption
//!
//! Authenticated encryption for private freight transactions. The ledger
//! seals the JSON-encoded properties of a transaction and binds the
//! ciphertext to the transaction ID through the associated data, so a
//! sealed blob copied onto another record fails to open.
//!
//! ## Nonce management
//!
//! Random 96-bit nonces from the OS CSPRNG. GCM is unforgiving about nonce
//! reuse; do not switch to counters without a very good reason.
//!
//! ## Wire format
//!
//! [`seal`] returns `nonce || ciphertext` as a single `Vec<u8>`. The first
//! 12 bytes are the nonce, the rest is the ciphertext plus the 16-byte tag.
//! [`open`] expects the same layout.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use rand::RngCore;
use thiserror::Error;

use crate::config::{AES_KEY_LENGTH, AES_NONCE_LENGTH};

/// Errors that can occur during encryption/decryption.
///
/// Kept vague on purpose: "wrong key" and "corrupted ciphertext" look the
/// same from the outside.
#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("encryption failed")]
    EncryptFailed,

    #[error("decryption failed -- wrong key or corrupted ciphertext")]
    DecryptFailed,

    #[error("invalid key length: expected {AES_KEY_LENGTH} bytes")]
    InvalidKeyLength,

    #[error("ciphertext too short: must be at least {AES_NONCE_LENGTH} bytes")]
    CiphertextTooShort,
}

/// Generate a fresh random AES-256 key.
pub fn generate_key() -> [u8; AES_KEY_LENGTH] {
    let mut key = [0u8; AES_KEY_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut key);
    key
}

/// Encrypt `plaintext` bound to `aad` with a random nonce.
///
/// The AAD is authenticated but not encrypted. The caller must present the
/// same AAD to [`open`].
///
/// # Example
///
/// ```
/// use bftx_protocol::crypto::encryption::{open, seal};
///
/// let key = [0x42u8; 32];
/// let sealed = seal(&key, b"consignee: ACME", b"tx-1").unwrap();
/// assert_eq!(open(&key, &sealed, b"tx-1").unwrap(), b"consignee: ACME");
/// assert!(open(&key, &sealed, b"tx-2").is_err());
/// ```
pub fn seal(
    key: &[u8; AES_KEY_LENGTH],
    plaintext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::EncryptFailed)?;

    let mut nonce_bytes = [0u8; AES_NONCE_LENGTH];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher
        .encrypt(
            nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|_| EncryptionError::EncryptFailed)?;

    let mut out = Vec::with_capacity(AES_NONCE_LENGTH + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt data previously produced by [`seal`].
///
/// # Errors
///
/// `DecryptFailed` when the key is wrong, the data was modified, or the
/// AAD does not match. The cases are not distinguished.
pub fn open(
    key: &[u8; AES_KEY_LENGTH],
    data: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, EncryptionError> {
    if data.len() < AES_NONCE_LENGTH {
        return Err(EncryptionError::CiphertextTooShort);
    }

    let (nonce_bytes, ciphertext) = data.split_at(AES_NONCE_LENGTH);
    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| EncryptionError::DecryptFailed)?;
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(
            nonce,
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| EncryptionError::DecryptFailed)
}

/// Parse a key loaded from an untrusted source (key file, environment).
pub fn key_from_hex(hex_str: &str) -> Result<[u8; AES_KEY_LENGTH], EncryptionError> {
    let bytes = hex::decode(hex_str.trim()).map_err(|_| EncryptionError::InvalidKeyLength)?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| EncryptionError::InvalidKeyLength)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AES_TAG_LENGTH;

    fn test_key() -> [u8; 32] {
        let mut key = [0u8; 32];
        for (i, byte) in key.iter_mut().enumerate() {
            *byte = i as u8;
        }
        key
    }

    #[test]
    fn test_seal_open_roundtrip() {
        let key = test_key();
        let sealed = seal(&key, b"desc of goods: 40 pallets", b"tx").unwrap();
        assert_eq!(open(&key, &sealed, b"tx").unwrap(), b"desc of goods: 40 pallets");
    }

    #[test]
    fn test_sealed_length() {
        let key = test_key();
        let plaintext = b"exactly 26 bytes of input!";
        let sealed = seal(&key, plaintext, b"").unwrap();
        assert_eq!(
            sealed.len(),
            AES_NONCE_LENGTH + plaintext.len() + AES_TAG_LENGTH
        );
    }

    #[test]
    fn test_wrong_key_fails() {
        let key = test_key();
        let sealed = seal(&key, b"secret", b"tx").unwrap();
        let mut wrong = test_key();
        wrong[0] ^= 0xFF;
        assert!(open(&wrong, &sealed, b"tx").is_err());
    }

    #[test]
    fn test_wrong_aad_fails() {
        let key = test_key();
        let sealed = seal(&key, b"secret", b"tx-a").unwrap();
        assert!(open(&key, &sealed, b"tx-b").is_err());
    }

    #[test]
    fn test_modified_ciphertext_fails() {
        let key = test_key();
        let mut sealed = seal(&key, b"secret", b"tx").unwrap();
        sealed[AES_NONCE_LENGTH] ^= 0xFF;
        assert!(open(&key, &sealed, b"tx").is_err());
    }

    #[test]
    fn test_open_too_short() {
        let key = test_key();
        assert!(matches!(
            open(&key, &[0u8; 4], b""),
            Err(EncryptionError::CiphertextTooShort)
        ));
    }

    #[test]
    fn test_unique_nonces() {
        let key = test_key();
        let a = seal(&key, b"message", b"").unwrap();
        let b = seal(&key, b"message", b"").unwrap();
        assert_ne!(&a[..AES_NONCE_LENGTH], &b[..AES_NONCE_LENGTH]);
    }

    #[test]
    fn test_key_from_hex() {
        let key = test_key();
        assert_eq!(key_from_hex(&hex::encode(key)).unwrap(), key);
        assert!(key_from_hex("abcd").is_err());
        assert!(key_from_hex("not hex").is_err());
    }
}
