//! # Transaction Lifecycle Contract
//!
//! The async call contract between the operation gateway and whatever
//! subsystem owns transaction state. The gateway never sees a store, a key
//! or a channel; it sees this trait.
//!
//! Errors cross the boundary as [`LifecycleError`]. Their `Display` form is
//! what callers see: lookup and state failures render as bare numeric HTTP
//! status codes (`"404"`, `"409"`) so transports can map them directly,
//! everything else renders as descriptive text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::broadcast::BroadcastError;
use crate::crypto::encryption::EncryptionError;
use crate::storage::DbError;
use crate::transaction::Transaction;

// ---------------------------------------------------------------------------
// Info
// ---------------------------------------------------------------------------

/// Aggregate ledger state, recomputed on every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Info {
    pub data: String,
    pub version: String,
    pub last_block_height: i64,
    /// Hex-encoded application hash. Empty before the first broadcast.
    pub last_block_app_hash: String,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// No transaction with the given ID.
    #[error("404")]
    NotFound(String),

    /// The transaction exists but its state forbids the operation.
    #[error("409")]
    InvalidState { id: String, reason: &'static str },

    #[error("storage error: {0}")]
    Storage(#[from] DbError),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error("broadcast error: {0}")]
    Broadcast(String),
}

impl From<EncryptionError> for LifecycleError {
    fn from(err: EncryptionError) -> Self {
        Self::Crypto(err.to_string())
    }
}

impl From<BroadcastError> for LifecycleError {
    fn from(err: BroadcastError) -> Self {
        Self::Broadcast(err.to_string())
    }
}

pub type LifecycleResult<T> = Result<T, LifecycleError>;

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Operations on BFTX transactions, one per gateway operation.
#[async_trait]
pub trait TransactionLifecycle: Send + Sync {
    async fn get_transaction(&self, id: &str) -> LifecycleResult<Transaction>;

    /// Every transaction whose ID starts with `id`, ordered by ID.
    async fn query_transaction(&self, id: &str) -> LifecycleResult<Vec<Transaction>>;

    async fn get_info(&self) -> LifecycleResult<Info>;

    /// Number of stored transactions, as a decimal string.
    async fn get_total(&self) -> LifecycleResult<String>;

    async fn construct_bftx(&self, tx: Transaction) -> LifecycleResult<Transaction>;

    async fn encrypt_bftx(&self, id: &str) -> LifecycleResult<Transaction>;

    async fn decrypt_bftx(&self, id: &str) -> LifecycleResult<Transaction>;

    async fn sign_bftx(&self, id: &str) -> LifecycleResult<Transaction>;

    async fn broadcast_bftx(&self, id: &str) -> LifecycleResult<Transaction>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_errors_render_as_status_codes() {
        assert_eq!(LifecycleError::NotFound("abc".into()).to_string(), "404");
        let err = LifecycleError::InvalidState {
            id: "abc".into(),
            reason: "already signed",
        };
        assert_eq!(err.to_string(), "409");
    }

    #[test]
    fn other_errors_render_as_text() {
        let err: LifecycleError = EncryptionError::DecryptFailed.into();
        assert!(err.to_string().starts_with("crypto error"));
        assert!(err.to_string().parse::<u16>().is_err());

        let err: LifecycleError = BroadcastError::Expired.into();
        assert!(err.to_string().starts_with("broadcast error"));
    }

    #[test]
    fn info_wire_names() {
        let info = Info {
            data: "bftx".into(),
            version: "0.1.0".into(),
            last_block_height: 3,
            last_block_app_hash: "ab".into(),
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["LastBlockHeight"], 3);
        assert_eq!(json["LastBlockAppHash"], "ab");
    }
}
