//! # Transaction Module
//!
//! The freight transaction record and the pieces that build and sign it.
//!
//! ```text
//! types.rs    - Bill-of-lading property types (Properties and parties)
//! builder.rs  - Transaction record, canonical bytes, TransactionBuilder
//! signing.rs  - Ed25519 signing and verification of records
//! ```
//!
//! ## Transaction Lifecycle
//!
//! 1. **Construct** - [`TransactionBuilder`] stamps type, timestamp and ID.
//! 2. **Encrypt / Decrypt** - optional; the ledger seals the properties.
//! 3. **Sign** - [`sign_transaction`] with the ledger's keypair.
//! 4. **Broadcast** - the ledger assigns a block height and publishes.

pub mod builder;
pub mod signing;
pub mod types;

pub use builder::{Transaction, TransactionBuilder};
pub use signing::{sign_transaction, verify_transaction};
pub use types::{AgentMaster, AgentOwner, IssueDetails, MasterInfo, Properties};
