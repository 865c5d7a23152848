//! In-memory lifecycle collaborator for gateway tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use bftx_protocol::lifecycle::LifecycleResult;
use bftx_protocol::{Info, LifecycleError, Transaction, TransactionLifecycle};

/// Records every call. Unknown IDs fail with `"404"`; `failing_with`
/// makes every call fail with the given error instead.
#[derive(Default)]
pub struct StubLifecycle {
    records: Mutex<BTreeMap<String, Transaction>>,
    calls: AtomicUsize,
    failure: Option<fn() -> LifecycleError>,
}

impl StubLifecycle {
    pub fn failing_with(failure: fn() -> LifecycleError) -> Self {
        Self {
            failure: Some(failure),
            ..Default::default()
        }
    }

    pub fn with_transaction(self, tx: Transaction) -> Self {
        self.records.lock().unwrap().insert(tx.id.clone(), tx);
        self
    }

    /// Number of external calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn enter(&self) -> LifecycleResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.failure {
            Some(failure) => Err(failure()),
            None => Ok(()),
        }
    }

    fn lookup(&self, id: &str) -> LifecycleResult<Transaction> {
        self.enter()?;
        self.records
            .lock()
            .unwrap()
            .get(id)
            .cloned()
            .ok_or_else(|| LifecycleError::NotFound(id.to_string()))
    }

    fn update(&self, id: &str, apply: impl FnOnce(&mut Transaction)) -> LifecycleResult<Transaction> {
        let mut tx = self.lookup(id)?;
        apply(&mut tx);
        self.records.lock().unwrap().insert(id.to_string(), tx.clone());
        Ok(tx)
    }
}

#[async_trait]
impl TransactionLifecycle for StubLifecycle {
    async fn get_transaction(&self, id: &str) -> LifecycleResult<Transaction> {
        self.lookup(id)
    }

    async fn query_transaction(&self, id: &str) -> LifecycleResult<Vec<Transaction>> {
        self.enter()?;
        Ok(self
            .records
            .lock()
            .unwrap()
            .values()
            .filter(|tx| tx.id.starts_with(id))
            .cloned()
            .collect())
    }

    async fn get_info(&self) -> LifecycleResult<Info> {
        self.enter()?;
        Ok(Info {
            data: "bftx".into(),
            version: "stub".into(),
            last_block_height: 0,
            last_block_app_hash: String::new(),
        })
    }

    async fn get_total(&self) -> LifecycleResult<String> {
        self.enter()?;
        Ok(self.records.lock().unwrap().len().to_string())
    }

    async fn construct_bftx(&self, mut tx: Transaction) -> LifecycleResult<Transaction> {
        self.enter()?;
        let mut records = self.records.lock().unwrap();
        tx.id = format!("stub-{}", records.len() + 1);
        tx.tx_type = "BFTX".into();
        records.insert(tx.id.clone(), tx.clone());
        Ok(tx)
    }

    async fn encrypt_bftx(&self, id: &str) -> LifecycleResult<Transaction> {
        self.update(id, |tx| tx.private = "sealed".into())
    }

    async fn decrypt_bftx(&self, id: &str) -> LifecycleResult<Transaction> {
        self.update(id, |tx| tx.private.clear())
    }

    async fn sign_bftx(&self, id: &str) -> LifecycleResult<Transaction> {
        self.update(id, |tx| {
            tx.signature = "sig".into();
            tx.verified = true;
        })
    }

    async fn broadcast_bftx(&self, id: &str) -> LifecycleResult<Transaction> {
        self.update(id, |tx| {
            tx.transmitted = true;
            tx.block_height = 1;
        })
    }
}
