//! # Protocol Configuration & Constants
//!
//! Every magic number in BFTX lives here. If you're hardcoding a constant
//! somewhere else, move it here.

// ---------------------------------------------------------------------------
// Protocol Version
// ---------------------------------------------------------------------------

/// The protocol version reported by `getInfo`.
pub const PROTOCOL_VERSION: &str = "0.1.0";

/// Value of the `Data` field in the info snapshot.
pub const INFO_DATA: &str = "bftx";

/// Type tag stamped on every constructed transaction.
pub const TRANSACTION_TYPE: &str = "BFTX";

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Ed25519 secret key length in bytes.
pub const SIGNING_KEY_LENGTH: usize = 32;

/// Ed25519 signature length. Always 64 bytes.
pub const SIGNATURE_LENGTH: usize = 64;

/// AES-256-GCM key length in bytes.
pub const AES_KEY_LENGTH: usize = 32;

/// AES-256-GCM nonce length in bytes. 96 bits, the only length you should use.
pub const AES_NONCE_LENGTH: usize = 12;

/// AES-256-GCM authentication tag length in bytes.
pub const AES_TAG_LENGTH: usize = 16;

/// Hash output length in bytes. Both SHA-256 and BLAKE3 produce 32-byte digests.
pub const HASH_OUTPUT_LENGTH: usize = 32;

// ---------------------------------------------------------------------------
// Broadcast
// ---------------------------------------------------------------------------

/// Capacity of the in-process broadcast channel. Slow subscribers that fall
/// further behind than this lose the oldest messages.
pub const BROADCAST_CHANNEL_CAPACITY: usize = 256;

/// Hop budget attached to every broadcast message.
pub const BROADCAST_TTL: u8 = 8;

/// Content hashes remembered for duplicate detection. The oldest is
/// forgotten once the window is full.
pub const BROADCAST_DEDUP_WINDOW: usize = 4096;

/// Most recent messages kept in the broadcaster's journal.
pub const BROADCAST_JOURNAL_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// Key Files
// ---------------------------------------------------------------------------

/// File name of the hex-encoded Ed25519 signer key inside the data directory.
pub const SIGNER_KEY_FILE: &str = "signer.key";

/// File name of the hex-encoded AES-256 key inside the data directory.
pub const CIPHER_KEY_FILE: &str = "cipher.key";

/// Sub-directory of the data directory holding the sled database.
pub const DB_DIR: &str = "db";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_lengths_are_consistent() {
        assert_eq!(SIGNING_KEY_LENGTH, ed25519_dalek::SECRET_KEY_LENGTH);
        assert_eq!(SIGNATURE_LENGTH, ed25519_dalek::SIGNATURE_LENGTH);
        assert_eq!(AES_KEY_LENGTH, HASH_OUTPUT_LENGTH);
    }
}
