//! WAL manager: envelope encoding, appends, and durability barriers.

use crate::error::CoreResult;
use crate::wal::iterator::RecordIterator;
use crate::wal::record::{LogRecord, LOG_MAGIC, LOG_VERSION};
use parking_lot::Mutex;
use std::sync::Arc;

/// Envelope header size: magic (4) + version (2) + kind (1) + length (4).
pub(crate) const HEADER_SIZE: usize = 11;

/// Trailing CRC32 size.
pub(crate) const CRC_SIZE: usize = 4;

/// Manages appends to and replay reads from the write-ahead log.
///
/// Each record is framed as:
///
/// ```text
/// | magic (4) | version (2) | kind (1) | length (4) | payload (N) | crc32 (4) |
/// ```
///
/// The CRC covers everything before it. Appends go through a single
/// backend lock, so record bytes are never interleaved.
pub struct WalManager {
    /// Log backend holding the raw bytes.
    backend: Arc<Mutex<Box<dyn walkv_storage::LogBackend>>>,
    /// Whether to sync after every append.
    sync_on_write: bool,
}

impl WalManager {
    /// Creates a new WAL manager over a backend.
    pub fn new(backend: Box<dyn walkv_storage::LogBackend>, sync_on_write: bool) -> Self {
        Self {
            backend: Arc::new(Mutex::new(backend)),
            sync_on_write,
        }
    }

    /// Appends one record to the log.
    ///
    /// Returns the offset where the record was written.
    ///
    /// # Errors
    ///
    /// Returns an error if an I/O error occurs.
    pub fn append(&self, record: &LogRecord) -> CoreResult<u64> {
        let payload = record.encode_payload();

        let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
        data.extend_from_slice(&LOG_MAGIC);
        data.extend_from_slice(&LOG_VERSION.to_le_bytes());
        data.push(record.kind.as_byte());
        data.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        data.extend_from_slice(&payload);

        let crc = crc32fast::hash(&data);
        data.extend_from_slice(&crc.to_le_bytes());

        let mut backend = self.backend.lock();
        let offset = backend.append(&data)?;

        if self.sync_on_write {
            backend.sync()?;
        }

        Ok(offset)
    }

    /// Flushes buffered writes to the operating system.
    pub fn flush(&self) -> CoreResult<()> {
        self.backend.lock().flush()?;
        Ok(())
    }

    /// Forces all appended records durable to stable storage.
    ///
    /// This is the commit protocol's durability barrier: once it returns
    /// successfully, previously appended records survive a crash.
    pub fn sync(&self) -> CoreResult<()> {
        self.backend.lock().sync()?;
        Ok(())
    }

    /// Returns the current log size in bytes.
    pub fn size(&self) -> CoreResult<u64> {
        Ok(self.backend.lock().size()?)
    }

    /// Returns a streaming iterator over all records.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be determined.
    pub fn iter(&self) -> CoreResult<RecordIterator<'_>> {
        self.iter_from(0)
    }

    /// Returns a streaming iterator over records from a start offset.
    ///
    /// The offset must be a record boundary previously returned by
    /// [`WalManager::append`], or zero for a full replay.
    pub fn iter_from(&self, offset: u64) -> CoreResult<RecordIterator<'_>> {
        RecordIterator::new(self.backend.lock(), offset)
    }

    /// Reads all records into memory.
    ///
    /// Prefer [`WalManager::iter`] for large logs; this is a convenience
    /// for tests and small logs.
    pub fn read_all(&self) -> CoreResult<Vec<(u64, LogRecord)>> {
        self.iter()?.collect()
    }
}

impl std::fmt::Debug for WalManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalManager")
            .field("sync_on_write", &self.sync_on_write)
            .finish_non_exhaustive()
    }
}
