//! # BftxDB - Persistent Storage Engine
//!
//! The persistence layer for the BFTX ledger, built on sled's embedded
//! key-value store.
//!
//! ## Tree Layout
//!
//! | Tree           | Key                 | Value                    |
//! |----------------|---------------------|--------------------------|
//! | `transactions` | `tx_id` (hex bytes) | `bincode(Transaction)`   |
//! | `metadata`     | key (UTF-8)         | value (bytes)            |
//!
//! Transaction IDs are lowercase hex, so sled's lexicographic ordering is
//! also ID ordering and prefix scans return records sorted by ID.
//!
//! The block height is stored big-endian for the same reason the height
//! keys of a block store would be: byte order equals numeric order.

use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use sled::{Db, Tree};
use std::path::Path;

use crate::transaction::Transaction;

// ---------------------------------------------------------------------------
// Error Type
// ---------------------------------------------------------------------------

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("key not found: {0}")]
    NotFound(String),
}

pub type DbResult<T> = Result<T, DbError>;

// ---------------------------------------------------------------------------
// Metadata Keys
// ---------------------------------------------------------------------------

const META_LATEST_HEIGHT: &[u8] = b"latest_block_height";
const META_LATEST_APP_HASH: &[u8] = b"latest_app_hash";

// ---------------------------------------------------------------------------
// BftxDB
// ---------------------------------------------------------------------------

/// Persistent storage for BFTX transactions and ledger metadata.
///
/// sled trees are lock-free for readers, so `BftxDB` is cheap to clone and
/// share across tasks. Serialization is bincode.
#[derive(Debug, Clone)]
pub struct BftxDB {
    db: Db,
    /// Transactions indexed by hex-encoded tx ID.
    transactions: Tree,
    /// Latest block height and app hash.
    metadata: Tree,
}

impl BftxDB {
    /// Open or create a database at the given filesystem path.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let db = sled::open(path)?;
        Self::from_db(db)
    }

    /// Create a temporary database that is removed when dropped.
    pub fn open_temporary() -> DbResult<Self> {
        let config = sled::Config::new().temporary(true);
        let db = config.open()?;
        Self::from_db(db)
    }

    fn from_db(db: Db) -> DbResult<Self> {
        let transactions = db.open_tree("transactions")?;
        let metadata = db.open_tree("metadata")?;
        Ok(Self {
            db,
            transactions,
            metadata,
        })
    }

    // -- Transaction operations ---------------------------------------------

    /// Insert a transaction only if its ID is not yet present.
    ///
    /// Returns `false` without writing when the ID already exists.
    pub fn insert_new(&self, tx: &Transaction) -> DbResult<bool> {
        let bytes = encode(tx)?;
        let swapped = self
            .transactions
            .compare_and_swap(tx.id.as_bytes(), None::<&[u8]>, Some(bytes))?;
        Ok(swapped.is_ok())
    }

    /// Persist a transaction, replacing any previous version.
    pub fn put_transaction(&self, tx: &Transaction) -> DbResult<()> {
        self.transactions.insert(tx.id.as_bytes(), encode(tx)?)?;
        Ok(())
    }

    /// Retrieve a transaction by its hex-encoded ID.
    pub fn get_transaction(&self, id: &str) -> DbResult<Option<Transaction>> {
        match self.transactions.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// All transactions whose ID starts with `prefix`, in ID order.
    ///
    /// An empty prefix returns every stored transaction.
    pub fn scan_prefix(&self, prefix: &str) -> DbResult<Vec<Transaction>> {
        let mut out = Vec::new();
        for entry in self.transactions.scan_prefix(prefix.as_bytes()) {
            let (_key, value) = entry?;
            out.push(decode(&value)?);
        }
        Ok(out)
    }

    /// Persist a broadcast transaction together with the new chain tip.
    ///
    /// The record, height and app hash commit in one multi-tree transaction,
    /// then the database is flushed. Writing the previous record and tip the
    /// same way undoes a broadcast.
    pub fn put_broadcast(&self, tx: &Transaction, height: u64, app_hash: &[u8]) -> DbResult<()> {
        let record = encode(tx)?;
        (&self.transactions, &self.metadata)
            .transaction(|(transactions, metadata)| {
                transactions.insert(tx.id.as_bytes(), record.as_slice())?;
                metadata.insert(META_LATEST_HEIGHT, height.to_be_bytes().to_vec())?;
                metadata.insert(META_LATEST_APP_HASH, app_hash)?;
                Ok::<_, ConflictableTransactionError<DbError>>(())
            })
            .map_err(|e| match e {
                TransactionError::Abort(e) => e,
                TransactionError::Storage(e) => DbError::Sled(e),
            })?;

        self.db.flush()?;
        Ok(())
    }

    // -- Metadata operations ------------------------------------------------

    /// Latest broadcast height, or 0 before the first broadcast.
    pub fn latest_block_height(&self) -> DbResult<u64> {
        match self.metadata.get(META_LATEST_HEIGHT)? {
            Some(bytes) => {
                let height = u64::from_be_bytes(
                    bytes
                        .as_ref()
                        .try_into()
                        .map_err(|_| DbError::Serialization("invalid height bytes".to_string()))?,
                );
                Ok(height)
            }
            None => Ok(0),
        }
    }

    /// Latest application hash, or empty before the first broadcast.
    pub fn latest_app_hash(&self) -> DbResult<Vec<u8>> {
        Ok(self
            .metadata
            .get(META_LATEST_APP_HASH)?
            .map(|bytes| bytes.to_vec())
            .unwrap_or_default())
    }

    // -- Utility operations -------------------------------------------------

    /// Return the number of transactions stored in the database.
    pub fn transaction_count(&self) -> usize {
        self.transactions.len()
    }

    /// Force a flush of all pending writes to disk.
    pub fn flush(&self) -> DbResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

fn encode(tx: &Transaction) -> DbResult<Vec<u8>> {
    bincode::serialize(tx).map_err(|e| DbError::Serialization(e.to_string()))
}

fn decode(bytes: &[u8]) -> DbResult<Transaction> {
    bincode::deserialize(bytes).map_err(|e| DbError::Serialization(e.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
