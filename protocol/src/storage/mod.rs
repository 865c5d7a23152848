//! # Storage Module
//!
//! Persistent storage for the BFTX ledger.
//!
//! ```text
//! db.rs  - sled-backed transaction store and chain-tip metadata
//! ```
//!
//! Bincode is the on-disk format. JSON is for the API; bincode is for
//! storage.

pub mod db;

pub use db::{BftxDB, DbError, DbResult};
