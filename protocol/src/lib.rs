// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # BFTX Protocol - Core Library
//!
//! Freight transactions (bills of lading) and the ledger that owns them.
//!
//! The gateway in `bftx-node` talks to this crate through exactly one seam,
//! the async [`lifecycle::TransactionLifecycle`] trait. Everything behind it
//! is the bundled [`ledger::Ledger`]: a sled store, AES-256-GCM for private
//! properties, Ed25519 for signatures, and an in-process broadcaster.
//!
//! ## Modules
//!
//! - **config** - Protocol constants and key-file names.
//! - **crypto** - Hashing, symmetric sealing, Ed25519 keys. Thin wrappers
//!   around audited crates.
//! - **transaction** - The record, its canonical bytes, builder, signing.
//! - **storage** - sled persistence for records and the chain tip.
//! - **broadcast** - Publication of transmitted records.
//! - **keystore** - On-disk signer and cipher keys.
//! - **lifecycle** - The call contract, its error type and `Info`.
//! - **ledger** - The contract implementation.

pub mod broadcast;
pub mod config;
pub mod crypto;
pub mod keystore;
pub mod ledger;
pub mod lifecycle;
pub mod storage;
pub mod transaction;

pub use ledger::Ledger;
pub use lifecycle::{Info, LifecycleError, TransactionLifecycle};
pub use transaction::Transaction;
