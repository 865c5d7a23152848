//! # Ledger
//!
//! The bundled [`TransactionLifecycle`] implementation: a sled store, the
//! ledger's AES-256-GCM key for private properties, its Ed25519 key for
//! signatures, and a [`Broadcaster`] for transmitted records.
//!
//! ## State machine
//!
//! ```text
//! constructed ──encrypt──▶ encrypted ──decrypt──▶ constructed
//!      │                       │
//!      └────────sign───────────┴──▶ signed ──broadcast──▶ transmitted
//! ```
//!
//! Mutations are serialized through one async lock so block heights are
//! assigned without gaps and read-modify-write cycles never interleave.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::broadcast::{BroadcastMessage, Broadcaster};
use crate::config::{DB_DIR, INFO_DATA, PROTOCOL_VERSION};
use crate::crypto::encryption::{open, seal};
use crate::crypto::hash::blake3_hash_multi;
use crate::keystore::LedgerKeys;
use crate::lifecycle::{Info, LifecycleError, LifecycleResult, TransactionLifecycle};
use crate::storage::{BftxDB, DbResult};
use crate::transaction::{
    sign_transaction, verify_transaction, Properties, Transaction, TransactionBuilder,
};

pub struct Ledger {
    db: BftxDB,
    keys: LedgerKeys,
    broadcaster: Arc<dyn Broadcaster>,
    write_lock: Mutex<()>,
}

impl Ledger {
    pub fn new(db: BftxDB, keys: LedgerKeys, broadcaster: Arc<dyn Broadcaster>) -> Self {
        Self {
            db,
            keys,
            broadcaster,
            write_lock: Mutex::new(()),
        }
    }

    /// Opens the store under `data_dir/db`.
    pub fn open(
        data_dir: &Path,
        keys: LedgerKeys,
        broadcaster: Arc<dyn Broadcaster>,
    ) -> DbResult<Self> {
        let db = BftxDB::open(data_dir.join(DB_DIR))?;
        info!(
            path = %data_dir.display(),
            transactions = db.transaction_count(),
            "ledger store opened"
        );
        Ok(Self::new(db, keys, broadcaster))
    }

    /// A ledger over a temporary store. Used by tests and benches.
    pub fn temporary(keys: LedgerKeys, broadcaster: Arc<dyn Broadcaster>) -> DbResult<Self> {
        Ok(Self::new(BftxDB::open_temporary()?, keys, broadcaster))
    }

    /// Hex public key the ledger signs with.
    pub fn signer(&self) -> String {
        self.keys.signer.public_key().to_hex()
    }

    fn load(&self, id: &str) -> LifecycleResult<Transaction> {
        self.db
            .get_transaction(id)?
            .ok_or_else(|| LifecycleError::NotFound(id.to_string()))
    }

    fn unseal(&self, tx: &Transaction) -> LifecycleResult<Properties> {
        let sealed = hex::decode(&tx.private)
            .map_err(|e| LifecycleError::Crypto(format!("malformed private blob: {e}")))?;
        let plaintext = open(&self.keys.cipher_key, &sealed, tx.id.as_bytes())?;
        serde_json::from_slice(&plaintext)
            .map_err(|e| LifecycleError::Crypto(format!("malformed private properties: {e}")))
    }
}

fn invalid(tx: &Transaction, reason: &'static str) -> LifecycleError {
    debug!(tx_id = %tx.id, reason, "lifecycle transition rejected");
    LifecycleError::InvalidState {
        id: tx.id.clone(),
        reason,
    }
}

#[async_trait]
impl TransactionLifecycle for Ledger {
    async fn get_transaction(&self, id: &str) -> LifecycleResult<Transaction> {
        self.load(id)
    }

    async fn query_transaction(&self, id: &str) -> LifecycleResult<Vec<Transaction>> {
        Ok(self.db.scan_prefix(id)?)
    }

    async fn get_info(&self) -> LifecycleResult<Info> {
        Ok(Info {
            data: INFO_DATA.to_string(),
            version: PROTOCOL_VERSION.to_string(),
            last_block_height: self.db.latest_block_height()? as i64,
            last_block_app_hash: hex::encode(self.db.latest_app_hash()?),
        })
    }

    async fn get_total(&self) -> LifecycleResult<String> {
        Ok(self.db.transaction_count().to_string())
    }

    #[instrument(skip_all)]
    async fn construct_bftx(&self, tx: Transaction) -> LifecycleResult<Transaction> {
        let mut builder = TransactionBuilder::new().properties(tx.properties);
        if !tx.amendment.is_empty() {
            builder = builder.amendment(&tx.amendment);
        }
        if tx.timestamp != 0 {
            builder = builder.timestamp(tx.timestamp);
        }
        let tx = builder.build();

        let _guard = self.write_lock.lock().await;
        if !self.db.insert_new(&tx)? {
            return Err(invalid(&tx, "duplicate transaction"));
        }
        info!(tx_id = %tx.id, "transaction constructed");
        Ok(tx)
    }

    #[instrument(skip(self))]
    async fn encrypt_bftx(&self, id: &str) -> LifecycleResult<Transaction> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.load(id)?;
        if tx.is_encrypted() {
            return Err(invalid(&tx, "already encrypted"));
        }
        if tx.is_signed() {
            return Err(invalid(&tx, "already signed"));
        }
        if tx.transmitted {
            return Err(invalid(&tx, "already transmitted"));
        }

        let plaintext = serde_json::to_vec(&tx.properties)
            .map_err(|e| LifecycleError::Crypto(e.to_string()))?;
        let sealed = seal(&self.keys.cipher_key, &plaintext, tx.id.as_bytes())?;
        tx.private = hex::encode(sealed);
        tx.properties = Properties::default();

        self.db.put_transaction(&tx)?;
        info!(tx_id = %tx.id, "transaction encrypted");
        Ok(tx)
    }

    #[instrument(skip(self))]
    async fn decrypt_bftx(&self, id: &str) -> LifecycleResult<Transaction> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.load(id)?;
        if !tx.is_encrypted() {
            return Err(invalid(&tx, "not encrypted"));
        }

        tx.properties = self.unseal(&tx)?;
        if tx.is_signed() {
            // The signature covers the sealed blob; keep the stored record.
            tx.private.clear();
            debug!(tx_id = %tx.id, "returning decrypted view of signed transaction");
            return Ok(tx);
        }

        tx.private.clear();
        self.db.put_transaction(&tx)?;
        info!(tx_id = %tx.id, "transaction decrypted");
        Ok(tx)
    }

    #[instrument(skip(self))]
    async fn sign_bftx(&self, id: &str) -> LifecycleResult<Transaction> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.load(id)?;
        if tx.is_signed() {
            return Err(invalid(&tx, "already signed"));
        }

        sign_transaction(&mut tx, &self.keys.signer);
        self.db.put_transaction(&tx)?;
        info!(tx_id = %tx.id, verified = tx.verified, "transaction signed");
        Ok(tx)
    }

    #[instrument(skip(self))]
    async fn broadcast_bftx(&self, id: &str) -> LifecycleResult<Transaction> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self.load(id)?;
        if !tx.is_signed() {
            return Err(invalid(&tx, "not signed"));
        }
        if !tx.verified || !verify_transaction(&tx) {
            return Err(invalid(&tx, "signature not verified"));
        }
        if tx.transmitted {
            return Err(invalid(&tx, "already transmitted"));
        }

        let prev_height = self.db.latest_block_height()?;
        let prev_hash = self.db.latest_app_hash()?;
        let height = prev_height + 1;
        let app_hash = blake3_hash_multi(&[prev_hash.as_slice(), tx.signable_bytes().as_slice()]);

        let original = tx.clone();
        tx.block_height = height as i64;
        tx.transmitted = true;

        // Persist first: a published message must always have a stored tip.
        self.db.put_broadcast(&tx, height, &app_hash)?;
        if let Err(e) = self
            .broadcaster
            .publish(BroadcastMessage::new(tx.clone(), height, &app_hash))
            .await
        {
            warn!(tx_id = %tx.id, error = %e, "publish failed, restoring previous tip");
            self.db.put_broadcast(&original, prev_height, &prev_hash)?;
            return Err(e.into());
        }

        info!(tx_id = %tx.id, height, app_hash = %hex::encode(app_hash), "transaction broadcast");
        Ok(tx)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
