//! Streaming log record iterator used by recovery.

use crate::error::{CoreError, CoreResult};
use crate::wal::record::{LogRecord, RecordKind, LOG_MAGIC, LOG_VERSION};
use crate::wal::writer::{CRC_SIZE, HEADER_SIZE};
use parking_lot::MutexGuard;

/// A streaming iterator over log records.
///
/// Reads records one at a time from the backend, so replay memory stays
/// bounded by the largest single record rather than the log size. The
/// backend lock is held for the iterator's lifetime, which keeps replay
/// isolated from concurrent appends.
///
/// # Error policy
///
/// A truncated record at the tail of the log (incomplete header or
/// payload) is a crash artifact, not corruption: iteration ends cleanly
/// there. Invalid magic, an unsupported version, an unrecognized kind
/// byte, or a CRC mismatch are real corruption and surface as errors.
pub struct RecordIterator<'a> {
    backend: MutexGuard<'a, Box<dyn walkv_storage::LogBackend>>,
    total_size: u64,
    offset: u64,
    finished: bool,
}

impl<'a> RecordIterator<'a> {
    /// Creates an iterator starting at the given offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend size cannot be determined.
    pub(crate) fn new(
        backend: MutexGuard<'a, Box<dyn walkv_storage::LogBackend>>,
        offset: u64,
    ) -> CoreResult<Self> {
        let total_size = backend.size()?;
        Ok(Self {
            backend,
            total_size,
            offset,
            finished: false,
        })
    }

    fn read_next(&mut self) -> CoreResult<Option<(u64, LogRecord)>> {
        if self.finished {
            return Ok(None);
        }

        let start = self.offset;
        let remaining = self.total_size.saturating_sub(start);

        if remaining < HEADER_SIZE as u64 {
            // Incomplete header at the tail: clean end of log.
            self.finished = true;
            return Ok(None);
        }

        let header = self.backend.read_at(start, HEADER_SIZE)?;

        if header[0..4] != LOG_MAGIC {
            self.finished = true;
            return Err(CoreError::corrupt(format!(
                "invalid magic at offset {start}"
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version > LOG_VERSION {
            self.finished = true;
            return Err(CoreError::corrupt(format!(
                "unsupported log version {version} at offset {start}"
            )));
        }

        let kind_byte = header[6];
        let Some(kind) = RecordKind::from_byte(kind_byte) else {
            self.finished = true;
            return Err(CoreError::UnknownRecordKind {
                kind: kind_byte,
                offset: start,
            });
        };

        let payload_len =
            u32::from_le_bytes([header[7], header[8], header[9], header[10]]) as usize;
        let total_len = (HEADER_SIZE + payload_len + CRC_SIZE) as u64;

        if remaining < total_len {
            // Record body never made it to disk: clean end of log.
            self.finished = true;
            return Ok(None);
        }

        let rest = self
            .backend
            .read_at(start + HEADER_SIZE as u64, payload_len + CRC_SIZE)?;
        let payload = &rest[..payload_len];
        let stored_crc = u32::from_le_bytes([
            rest[payload_len],
            rest[payload_len + 1],
            rest[payload_len + 2],
            rest[payload_len + 3],
        ]);

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&header);
        hasher.update(payload);
        let computed_crc = hasher.finalize();

        if stored_crc != computed_crc {
            self.finished = true;
            return Err(CoreError::ChecksumMismatch {
                expected: stored_crc,
                actual: computed_crc,
            });
        }

        let record = LogRecord::decode_payload(kind, payload)?;
        self.offset = start + total_len;

        Ok(Some((start, record)))
    }
}

impl Iterator for RecordIterator<'_> {
    type Item = CoreResult<(u64, LogRecord)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.read_next() {
            Ok(Some(item)) => Some(Ok(item)),
            Ok(None) => None,
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TxnId;
    use crate::wal::WalManager;
    use walkv_storage::MemoryBackend;

    fn wal_with_records(records: &[LogRecord]) -> WalManager {
        let wal = WalManager::new(Box::new(MemoryBackend::new()), false);
        for record in records {
            wal.append(record).unwrap();
        }
        wal
    }

    fn raw_bytes(wal: &WalManager) -> Vec<u8> {
        let size = wal.size().unwrap() as usize;
        let mut iter = wal.iter().unwrap();
        iter.backend.read_at(0, size).unwrap()
    }

    #[test]
    fn empty_log_yields_nothing() {
        let wal = WalManager::new(Box::new(MemoryBackend::new()), false);
        assert!(wal.iter().unwrap().next().is_none());
    }

    #[test]
    fn yields_records_in_order() {
        let r1 = LogRecord::begin(TxnId::new(1));
        let r2 = LogRecord::put(TxnId::new(1), "k", "v");
        let r3 = LogRecord::commit(TxnId::new(1));
        let wal = wal_with_records(&[r1.clone(), r2.clone(), r3.clone()]);

        let records: Vec<_> = wal.iter().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].1, r1);
        assert_eq!(records[1].1, r2);
        assert_eq!(records[2].1, r3);
    }

    #[test]
    fn truncated_tail_record_is_clean_end() {
        let wal = wal_with_records(&[
            LogRecord::begin(TxnId::new(1)),
            LogRecord::put(TxnId::new(1), "key", "value"),
        ]);

        // Chop bytes off the final record, as a crash mid-append would.
        let mut bytes = raw_bytes(&wal);
        bytes.truncate(bytes.len() - 5);

        let reopened = WalManager::new(Box::new(MemoryBackend::with_data(bytes)), false);
        let records: Vec<_> = reopened.iter().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].1.kind, RecordKind::Begin);
    }

    #[test]
    fn truncated_header_is_clean_end() {
        let wal = wal_with_records(&[LogRecord::begin(TxnId::new(1))]);

        let mut bytes = raw_bytes(&wal);
        // A few stray header bytes after the last full record.
        bytes.extend_from_slice(&LOG_MAGIC[..3]);

        let reopened = WalManager::new(Box::new(MemoryBackend::with_data(bytes)), false);
        let records: Vec<_> = reopened.iter().unwrap().map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn corrupted_magic_is_fatal() {
        let wal = wal_with_records(&[LogRecord::begin(TxnId::new(1))]);

        let mut bytes = raw_bytes(&wal);
        bytes[0] = b'X';

        let reopened = WalManager::new(Box::new(MemoryBackend::with_data(bytes)), false);
        let result: CoreResult<Vec<_>> = reopened.iter().unwrap().collect();
        assert!(matches!(result, Err(CoreError::Corrupt { .. })));
    }

    #[test]
    fn unknown_kind_byte_is_fatal() {
        let wal = wal_with_records(&[LogRecord::begin(TxnId::new(1))]);

        let mut bytes = raw_bytes(&wal);
        bytes[6] = 0xEE; // kind byte

        let reopened = WalManager::new(Box::new(MemoryBackend::with_data(bytes)), false);
        let result: CoreResult<Vec<_>> = reopened.iter().unwrap().collect();
        assert!(matches!(
            result,
            Err(CoreError::UnknownRecordKind { kind: 0xEE, .. })
        ));
    }

    #[test]
    fn flipped_payload_bit_fails_checksum() {
        let wal = wal_with_records(&[LogRecord::put(TxnId::new(1), "key", "value")]);

        let mut bytes = raw_bytes(&wal);
        let flip_at = HEADER_SIZE + 10;
        bytes[flip_at] ^= 0x01;

        let reopened = WalManager::new(Box::new(MemoryBackend::with_data(bytes)), false);
        let result: CoreResult<Vec<_>> = reopened.iter().unwrap().collect();
        assert!(matches!(result, Err(CoreError::ChecksumMismatch { .. })));
    }

    #[test]
    fn iteration_stops_after_error() {
        let wal = wal_with_records(&[
            LogRecord::begin(TxnId::new(1)),
            LogRecord::begin(TxnId::new(2)),
        ]);

        let mut bytes = raw_bytes(&wal);
        bytes[0] = b'X'; // corrupt the first record

        let reopened = WalManager::new(Box::new(MemoryBackend::with_data(bytes)), false);
        let mut iter = reopened.iter().unwrap();
        assert!(iter.next().unwrap().is_err());
        assert!(iter.next().is_none());
    }
}
