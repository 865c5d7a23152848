//! # Cryptographic Primitives for BFTX
//!
//! Every signature, hash, and sealed payload in the ledger flows through
//! here. Everything is a thin, typed wrapper around audited crates:
//!
//! - **Ed25519** for transaction signatures.
//! - **AES-256-GCM** for private transaction properties.
//! - **SHA-256** for transaction IDs, **BLAKE3** for the application hash.

pub mod encryption;
pub mod hash;
pub mod keys;

pub use encryption::{open, seal};
pub use hash::{blake3_hash, blake3_hash_multi, double_sha256, sha256};
pub use keys::{SignerKeypair, SignerPublicKey, TxSignature};
