//! # Broadcast
//!
//! Publication of signed transactions once the ledger assigns them a block
//! height. The ledger talks to a [`Broadcaster`]; the in-process
//! [`LocalBroadcaster`] fans messages out over a tokio broadcast channel and
//! keeps a bounded journal of what it has published recently.
//!
//! Messages carry a TTL so a relaying subscriber can bound propagation the
//! same way a gossip layer would. Duplicates are detected by the BLAKE3
//! content hash of the message, over a sliding window of recent hashes.

use std::collections::{HashSet, VecDeque};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::config::{
    BROADCAST_CHANNEL_CAPACITY, BROADCAST_DEDUP_WINDOW, BROADCAST_JOURNAL_CAPACITY, BROADCAST_TTL,
};
use crate::crypto::hash::blake3_hash;
use crate::transaction::Transaction;

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

/// A transmitted transaction together with the chain tip it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BroadcastMessage {
    pub transaction: Transaction,
    pub block_height: u64,
    /// Hex-encoded application hash after this transaction.
    pub app_hash: String,
    /// Remaining hops before the message is dropped.
    pub ttl: u8,
}

impl BroadcastMessage {
    pub fn new(transaction: Transaction, block_height: u64, app_hash: &[u8]) -> Self {
        Self {
            transaction,
            block_height,
            app_hash: hex::encode(app_hash),
            ttl: BROADCAST_TTL,
        }
    }

    /// Decrements the TTL. Returns `None` if the message has expired.
    pub fn decrement_ttl(self) -> Option<Self> {
        if self.ttl > 1 {
            Some(Self {
                ttl: self.ttl - 1,
                ..self
            })
        } else {
            None
        }
    }

    /// BLAKE3 hash of the message, ignoring the TTL.
    pub fn content_hash(&self) -> [u8; 32] {
        let mut bytes = self.transaction.signable_bytes();
        bytes.extend_from_slice(&self.block_height.to_be_bytes());
        bytes.extend_from_slice(self.app_hash.as_bytes());
        blake3_hash(&bytes)
    }
}

// ---------------------------------------------------------------------------
// Broadcaster
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum BroadcastError {
    #[error("message already published: {0}")]
    Duplicate(String),

    #[error("message expired before publication")]
    Expired,
}

/// Sink for transmitted transactions.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn publish(&self, message: BroadcastMessage) -> Result<(), BroadcastError>;
}

/// Recently published hashes and messages, both capped.
struct Published {
    seen: HashSet<[u8; 32]>,
    order: VecDeque<[u8; 32]>,
    journal: VecDeque<BroadcastMessage>,
    dedup_window: usize,
    journal_capacity: usize,
}

impl Published {
    /// Records `hash`, evicting the oldest one past the window. Returns
    /// `false` if it is already present.
    fn remember(&mut self, hash: [u8; 32]) -> bool {
        if !self.seen.insert(hash) {
            return false;
        }
        self.order.push_back(hash);
        while self.order.len() > self.dedup_window {
            if let Some(old) = self.order.pop_front() {
                self.seen.remove(&old);
            }
        }
        true
    }

    fn record(&mut self, message: BroadcastMessage) {
        self.journal.push_back(message);
        while self.journal.len() > self.journal_capacity {
            self.journal.pop_front();
        }
    }
}

/// In-process broadcaster backed by a tokio broadcast channel.
///
/// Publishing with no subscribers is not an error; the message still lands
/// in the journal.
pub struct LocalBroadcaster {
    sender: broadcast::Sender<BroadcastMessage>,
    published: RwLock<Published>,
}

impl LocalBroadcaster {
    pub fn new() -> Self {
        Self::with_limits(BROADCAST_DEDUP_WINDOW, BROADCAST_JOURNAL_CAPACITY)
    }

    /// Broadcaster remembering at most `dedup_window` hashes and
    /// `journal_capacity` messages.
    pub fn with_limits(dedup_window: usize, journal_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(BROADCAST_CHANNEL_CAPACITY);
        Self {
            sender,
            published: RwLock::new(Published {
                seen: HashSet::new(),
                order: VecDeque::new(),
                journal: VecDeque::new(),
                dedup_window,
                journal_capacity,
            }),
        }
    }

    /// Subscribe to messages published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<BroadcastMessage> {
        self.sender.subscribe()
    }

    /// The most recently published messages, oldest first.
    pub fn journal(&self) -> Vec<BroadcastMessage> {
        self.published.read().journal.iter().cloned().collect()
    }
}

impl Default for LocalBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Broadcaster for LocalBroadcaster {
    async fn publish(&self, message: BroadcastMessage) -> Result<(), BroadcastError> {
        if message.ttl == 0 {
            return Err(BroadcastError::Expired);
        }

        let hash = message.content_hash();
        {
            let mut published = self.published.write();
            if !published.remember(hash) {
                trace!(tx_id = %message.transaction.id, "dropping duplicate broadcast");
                return Err(BroadcastError::Duplicate(message.transaction.id));
            }
            published.record(message.clone());
        }

        let tx_id = message.transaction.id.clone();
        match self.sender.send(message) {
            Ok(receivers) => debug!(tx_id = %tx_id, receivers, "broadcast published"),
            Err(_) => debug!(tx_id = %tx_id, "broadcast published with no subscribers"),
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transaction::{Properties, TransactionBuilder};

    fn message(height: u64) -> BroadcastMessage {
        let tx = TransactionBuilder::new()
            .properties(Properties {
                vessel: "MV Ever Given".into(),
                ..Default::default()
            })
            .timestamp(42)
            .build();
        BroadcastMessage::new(tx, height, &[height as u8; 32])
    }

    #[test]
    fn ttl_decrements_then_expires() {
        let mut msg = message(1);
        msg.ttl = 2;
        let msg = msg.decrement_ttl().expect("one hop left");
        assert_eq!(msg.ttl, 1);
        assert!(msg.decrement_ttl().is_none());
    }

    #[test]
    fn content_hash_ignores_ttl() {
        let a = message(1);
        let mut b = a.clone();
        b.ttl = 1;
        assert_eq!(a.content_hash(), b.content_hash());
        assert_ne!(a.content_hash(), message(2).content_hash());
    }

    #[tokio::test]
    async fn publish_reaches_subscribers_and_journal() {
        let broadcaster = LocalBroadcaster::new();
        let mut rx = broadcaster.subscribe();

        broadcaster.publish(message(1)).await.unwrap();

        let received = rx.recv().await.unwrap();
        assert_eq!(received.block_height, 1);
        assert_eq!(broadcaster.journal().len(), 1);
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_ok() {
        let broadcaster = LocalBroadcaster::new();
        broadcaster.publish(message(1)).await.unwrap();
        assert_eq!(broadcaster.journal().len(), 1);
    }

    #[tokio::test]
    async fn duplicate_publish_is_rejected() {
        let broadcaster = LocalBroadcaster::new();
        broadcaster.publish(message(1)).await.unwrap();
        let err = broadcaster.publish(message(1)).await.unwrap_err();
        assert!(matches!(err, BroadcastError::Duplicate(_)));
        assert_eq!(broadcaster.journal().len(), 1);
    }

    #[tokio::test]
    async fn expired_message_is_rejected() {
        let broadcaster = LocalBroadcaster::new();
        let mut msg = message(1);
        msg.ttl = 0;
        assert!(matches!(
            broadcaster.publish(msg).await,
            Err(BroadcastError::Expired)
        ));
    }

    #[tokio::test]
    async fn journal_and_dedup_window_are_bounded() {
        let broadcaster = LocalBroadcaster::with_limits(2, 2);
        for height in 1..=3 {
            broadcaster.publish(message(height)).await.unwrap();
        }

        let heights: Vec<_> = broadcaster.journal().iter().map(|m| m.block_height).collect();
        assert_eq!(heights, [2, 3]);

        // Height 1 fell out of the window; 3 is still remembered.
        broadcaster.publish(message(1)).await.unwrap();
        assert!(matches!(
            broadcaster.publish(message(3)).await,
            Err(BroadcastError::Duplicate(_))
        ));
        assert_eq!(broadcaster.published.read().seen.len(), 2);
    }
}
