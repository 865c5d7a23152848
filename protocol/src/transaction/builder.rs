//! Transaction construction via the builder pattern.
//!
//! The [`TransactionBuilder`] sets the bill-of-lading properties, calls
//! `.build()`, and hands back an unsigned [`Transaction`] with a
//! deterministic ID derived from its contents.
//!
//! The builder does not sign or encrypt -- those are separate lifecycle
//! steps in [`super::signing`] and the ledger.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::types::{push_text, Properties};
use crate::config::TRANSACTION_TYPE;
use crate::crypto::hash::double_sha256;

// ---------------------------------------------------------------------------
// Transaction
// ---------------------------------------------------------------------------

/// A BFTX freight transaction.
///
/// The `id` is `hex(double_sha256(content_bytes))` computed at construction.
/// Lifecycle metadata (`signer`, `signature`, `verified`, `transmitted`,
/// `private`, `block_height`) is filled in by later steps and never feeds
/// back into the ID.
///
/// The zero value (`Transaction::default()`) is what a caller gets for any
/// field it did not supply.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Transaction {
    /// Transaction ID, hex-encoded.
    pub id: String,

    /// Type tag. Always [`TRANSACTION_TYPE`] for ledger-built records.
    #[serde(rename = "Type")]
    pub tx_type: String,

    /// Bill-of-lading fields. Reset to zero while the record is encrypted.
    pub properties: Properties,

    /// Hex-encoded Ed25519 public key of the signer. Empty until signed.
    pub signer: String,

    /// Hex-encoded Ed25519 signature over [`Transaction::signable_bytes`].
    pub signature: String,

    /// Whether the signature verified against `signer` at signing time.
    pub verified: bool,

    /// Whether the record has been broadcast.
    pub transmitted: bool,

    /// Hex-encoded `nonce || ciphertext` of the sealed properties.
    /// Empty for plaintext records.
    pub private: String,

    /// ID of the transaction this one amends, if any.
    pub amendment: String,

    /// Unix timestamp in milliseconds when the transaction was built.
    pub timestamp: i64,

    /// Broadcast sequence number. Zero until transmitted.
    pub block_height: i64,
}

impl Transaction {
    /// The bytes the ID is derived from: type, timestamp, amendment and
    /// properties. Excludes every lifecycle field.
    pub fn content_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(512);
        push_text(&mut buf, &self.tx_type);
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        push_text(&mut buf, &self.amendment);
        self.properties.write_canonical(&mut buf);
        buf
    }

    /// The bytes covered by the signature: the ID, the content bytes and
    /// the sealed blob. Signing an encrypted record therefore commits to
    /// the ciphertext, not the (reset) plaintext properties.
    pub fn signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(1024);
        push_text(&mut buf, &self.id);
        buf.extend_from_slice(&self.content_bytes());
        push_text(&mut buf, &self.private);
        buf
    }

    /// Computes the transaction ID from the current content.
    pub fn compute_id(&self) -> String {
        hex::encode(double_sha256(&self.content_bytes()))
    }

    /// Returns `true` if the transaction carries a signature.
    pub fn is_signed(&self) -> bool {
        !self.signature.is_empty()
    }

    /// Returns `true` while the properties are sealed in `private`.
    pub fn is_encrypted(&self) -> bool {
        !self.private.is_empty()
    }
}

// ---------------------------------------------------------------------------
// TransactionBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for unsigned [`Transaction`] instances.
///
/// ```rust
/// use bftx_protocol::transaction::{Properties, TransactionBuilder};
///
/// let tx = TransactionBuilder::new()
///     .properties(Properties {
///         shipper: "ACME Exports".into(),
///         bol_num: "BOL-0001".into(),
///         ..Default::default()
///     })
///     .timestamp(1_700_000_000_000)
///     .build();
/// assert_eq!(tx.id, tx.compute_id());
/// ```
///
/// `timestamp` defaults to the current UTC time at build.
#[derive(Debug, Default)]
pub struct TransactionBuilder {
    properties: Properties,
    amendment: String,
    timestamp: Option<i64>,
}

impl TransactionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bill-of-lading fields.
    pub fn properties(mut self, properties: Properties) -> Self {
        self.properties = properties;
        self
    }

    /// Marks the transaction as an amendment of `id`.
    pub fn amendment(mut self, id: &str) -> Self {
        self.amendment = id.to_string();
        self
    }

    /// Sets the timestamp explicitly (Unix milliseconds).
    pub fn timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Consumes the builder and produces an unsigned [`Transaction`].
    pub fn build(self) -> Transaction {
        let timestamp = self
            .timestamp
            .unwrap_or_else(|| Utc::now().timestamp_millis());

        let mut tx = Transaction {
            tx_type: TRANSACTION_TYPE.to_string(),
            properties: self.properties,
            amendment: self.amendment,
            timestamp,
            ..Default::default()
        };
        tx.id = tx.compute_id();
        tx
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
