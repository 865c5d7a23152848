//! On-disk key material for a ledger.
//!
//! Two hex files in the data directory: `signer.key` (Ed25519 seed) and
//! `cipher.key` (AES-256 key). Both are written owner-read/write only on
//! Unix.

use std::fs;
use std::path::Path;

use tracing::info;

use crate::config::{AES_KEY_LENGTH, CIPHER_KEY_FILE, SIGNER_KEY_FILE};
use crate::crypto::encryption::{generate_key, key_from_hex, EncryptionError};
use crate::crypto::keys::{KeyError, SignerKeypair};

#[derive(Debug, thiserror::Error)]
pub enum KeyStoreError {
    #[error("key file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid signer key: {0}")]
    Signer(#[from] KeyError),

    #[error("invalid cipher key: {0}")]
    Cipher(#[from] EncryptionError),

    #[error("key file already exists: {0}")]
    AlreadyExists(String),
}

/// Signing and sealing keys used by a [`crate::ledger::Ledger`].
#[derive(Clone)]
pub struct LedgerKeys {
    pub signer: SignerKeypair,
    pub cipher_key: [u8; AES_KEY_LENGTH],
}

impl LedgerKeys {
    pub fn generate() -> Self {
        Self {
            signer: SignerKeypair::generate(),
            cipher_key: generate_key(),
        }
    }

    /// Reads both key files from `dir`.
    ///
    /// Returns `Ok(None)` when either file is absent.
    pub fn load(dir: &Path) -> Result<Option<Self>, KeyStoreError> {
        let signer_path = dir.join(SIGNER_KEY_FILE);
        let cipher_path = dir.join(CIPHER_KEY_FILE);
        if !signer_path.exists() || !cipher_path.exists() {
            return Ok(None);
        }

        let signer = SignerKeypair::from_hex(&fs::read_to_string(&signer_path)?)?;
        let cipher_key = key_from_hex(&fs::read_to_string(&cipher_path)?)?;
        Ok(Some(Self { signer, cipher_key }))
    }

    /// Writes both key files into `dir`, creating it if needed.
    ///
    /// Refuses to overwrite existing key files.
    pub fn save(&self, dir: &Path) -> Result<(), KeyStoreError> {
        fs::create_dir_all(dir)?;
        let signer_path = dir.join(SIGNER_KEY_FILE);
        let cipher_path = dir.join(CIPHER_KEY_FILE);
        for path in [&signer_path, &cipher_path] {
            if path.exists() {
                return Err(KeyStoreError::AlreadyExists(path.display().to_string()));
            }
        }

        write_secret(&signer_path, &self.signer.to_hex())?;
        write_secret(&cipher_path, &hex::encode(self.cipher_key))?;
        info!(
            dir = %dir.display(),
            signer = %self.signer.public_key().to_hex(),
            "ledger keys written"
        );
        Ok(())
    }
}

impl std::fmt::Debug for LedgerKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerKeys")
            .field("signer", &self.signer.public_key())
            .field("cipher_key", &"[redacted]")
            .finish()
    }
}

fn write_secret(path: &Path, contents: &str) -> std::io::Result<()> {
    fs::write(path, contents)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}
