//! # walkv Core
//!
//! A minimal transactional key-value engine built around a write-ahead
//! log. Committed writes survive a crash; uncommitted or partially
//! logged writes never become visible after restart.
//!
//! ## Guarantees
//!
//! - **Atomicity**: a transaction's operations apply all-or-nothing.
//! - **Durability**: [`Engine::update`] returns only after the commit
//!   record is synced to stable storage.
//! - **Recovery**: opening an engine replays the log and reconstructs
//!   exactly the committed state (redo-only - uncommitted work is never
//!   applied, so there is nothing to undo).
//!
//! ## Example
//!
//! ```rust
//! use walkv_core::Engine;
//!
//! let engine = Engine::open_in_memory().unwrap();
//!
//! engine
//!     .update(|txn| {
//!         txn.put("language", "rust")?;
//!         Ok(())
//!     })
//!     .unwrap();
//!
//! engine
//!     .view(|txn| {
//!         assert_eq!(txn.get("language"), Some("rust".to_string()));
//!         Ok(())
//!     })
//!     .unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod engine;
mod error;
pub mod recovery;
mod store;
mod transaction;
mod types;
pub mod wal;

pub use config::Config;
pub use engine::Engine;
pub use error::{CoreError, CoreResult};
pub use store::Store;
pub use transaction::{Transaction, TxnState};
pub use types::TxnId;
pub use wal::{LogRecord, RecordKind, WalManager};
