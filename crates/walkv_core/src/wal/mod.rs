//! Write-ahead log: record codec, append path, and streaming replay.
//!
//! Every data-changing intent is appended here before any in-memory state
//! changes, which is what makes redo-only recovery possible: the log is
//! authoritative, the store is a cache rebuilt by replay.
//!
//! ## Record format
//!
//! ```text
//! | magic (4) | version (2) | kind (1) | length (4) | payload (N) | crc32 (4) |
//! ```
//!
//! ## Replay policy
//!
//! Tolerated (treated as clean end-of-log): a truncated header or payload
//! at the tail, which is the footprint of a crash mid-append. Fatal:
//! invalid magic, unsupported version, unknown kind byte, or CRC mismatch,
//! which indicate real corruption and must keep the engine from opening.

mod iterator;
mod record;
mod writer;

pub use iterator::RecordIterator;
pub use record::{LogRecord, RecordKind, LOG_MAGIC, LOG_VERSION};
pub use writer::WalManager;
