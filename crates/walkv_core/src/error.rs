//! Error types for the walkv engine.

use std::io;
use thiserror::Error;

/// Result type for engine operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in walkv engine operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Log backend error.
    #[error("storage error: {0}")]
    Storage(#[from] walkv_storage::StorageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Opening the engine failed before recovery started.
    #[error("open failed: {message}")]
    Open {
        /// Description of the failure.
        message: String,
    },

    /// Log replay hit an unreadable or structurally invalid record stream.
    #[error("recovery failed: {source}")]
    Recovery {
        /// The underlying cause.
        #[source]
        source: Box<CoreError>,
    },

    /// A log record is malformed or truncated in a way replay cannot skip.
    #[error("corrupt record: {message}")]
    Corrupt {
        /// Description of the corruption.
        message: String,
    },

    /// A record carries a kind byte the engine does not recognize.
    #[error("unknown record kind {kind} at offset {offset}")]
    UnknownRecordKind {
        /// The unrecognized kind byte.
        kind: u8,
        /// Log offset of the offending record.
        offset: u64,
    },

    /// A record's stored checksum does not match its contents.
    #[error("checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Checksum stored in the record envelope.
        expected: u32,
        /// Checksum computed from the record bytes.
        actual: u32,
    },

    /// `begin` was called on a transaction that is already active.
    #[error("transaction already started")]
    AlreadyStarted,

    /// A write was attempted on a transaction that is not active.
    #[error("cannot write in a non-active transaction")]
    NotActive,

    /// `commit` or `abort` was called on an already finalized transaction.
    #[error("transaction already committed or aborted")]
    AlreadyFinalized,

    /// An operation was attempted on a terminal transaction.
    #[error("transaction is closed")]
    TransactionClosed,
}

impl CoreError {
    /// Creates an open failure error.
    pub fn open(message: impl Into<String>) -> Self {
        Self::Open {
            message: message.into(),
        }
    }

    /// Wraps an error as a fatal recovery failure.
    pub fn recovery(source: CoreError) -> Self {
        Self::Recovery {
            source: Box::new(source),
        }
    }

    /// Creates a corrupt record error.
    pub fn corrupt(message: impl Into<String>) -> Self {
        Self::Corrupt {
            message: message.into(),
        }
    }
}
