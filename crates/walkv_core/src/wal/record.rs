//! Log record types and payload serialization.

use crate::error::{CoreError, CoreResult};
use crate::types::TxnId;
use std::time::{SystemTime, UNIX_EPOCH};

/// Magic bytes identifying a walkv log record.
pub const LOG_MAGIC: [u8; 4] = *b"WKVL";

/// Current log format version.
pub const LOG_VERSION: u16 = 1;

/// Kind of log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordKind {
    /// A transaction began.
    Begin = 1,
    /// A transaction set a key to a value.
    Put = 2,
    /// A transaction removed a key.
    Delete = 3,
    /// A transaction committed.
    Commit = 4,
    /// A transaction aborted.
    Abort = 5,
    /// Snapshot marker. Reserved; replay has no behavior for it.
    Persist = 6,
}

impl RecordKind {
    /// Converts a byte to a record kind.
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            1 => Some(Self::Begin),
            2 => Some(Self::Put),
            3 => Some(Self::Delete),
            4 => Some(Self::Commit),
            5 => Some(Self::Abort),
            6 => Some(Self::Persist),
            _ => None,
        }
    }

    /// Converts the record kind to a byte.
    #[must_use]
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// A log record: one durable fact about a transaction.
///
/// Records for a given transaction appear in the log in the exact order
/// the transaction issued them, terminated by exactly one of
/// [`RecordKind::Commit`] or [`RecordKind::Abort`], or by nothing at all
/// if the process crashed first.
///
/// `key` and `value` are empty for kinds that do not carry data. The
/// timestamp is informational only; log position provides ordering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// Id of the owning transaction.
    pub txn_id: TxnId,
    /// What happened.
    pub kind: RecordKind,
    /// Key for Put and Delete records, empty otherwise.
    pub key: String,
    /// Value for Put records, empty otherwise.
    pub value: String,
    /// Creation time in Unix milliseconds. Never used for ordering.
    pub timestamp: i64,
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

impl LogRecord {
    /// Creates a Begin record for a transaction.
    #[must_use]
    pub fn begin(txn_id: TxnId) -> Self {
        Self::bare(txn_id, RecordKind::Begin)
    }

    /// Creates a Put record.
    #[must_use]
    pub fn put(txn_id: TxnId, key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            txn_id,
            kind: RecordKind::Put,
            key: key.into(),
            value: value.into(),
            timestamp: now_millis(),
        }
    }

    /// Creates a Delete record.
    #[must_use]
    pub fn delete(txn_id: TxnId, key: impl Into<String>) -> Self {
        Self {
            txn_id,
            kind: RecordKind::Delete,
            key: key.into(),
            value: String::new(),
            timestamp: now_millis(),
        }
    }

    /// Creates a Commit record.
    #[must_use]
    pub fn commit(txn_id: TxnId) -> Self {
        Self::bare(txn_id, RecordKind::Commit)
    }

    /// Creates an Abort record.
    #[must_use]
    pub fn abort(txn_id: TxnId) -> Self {
        Self::bare(txn_id, RecordKind::Abort)
    }

    fn bare(txn_id: TxnId, kind: RecordKind) -> Self {
        Self {
            txn_id,
            kind,
            key: String::new(),
            value: String::new(),
            timestamp: now_millis(),
        }
    }

    /// Serializes the record payload (without envelope).
    ///
    /// Layout: `txn_id (8) | timestamp (8) | key_len (4) | key | value_len (4) | value`,
    /// all integers little-endian. Empty strings encode as a zero length.
    pub fn encode_payload(&self) -> Vec<u8> {
        let mut buf =
            Vec::with_capacity(8 + 8 + 4 + self.key.len() + 4 + self.value.len());
        buf.extend_from_slice(&self.txn_id.as_u64().to_le_bytes());
        buf.extend_from_slice(&self.timestamp.to_le_bytes());
        buf.extend_from_slice(&(self.key.len() as u32).to_le_bytes());
        buf.extend_from_slice(self.key.as_bytes());
        buf.extend_from_slice(&(self.value.len() as u32).to_le_bytes());
        buf.extend_from_slice(self.value.as_bytes());
        buf
    }

    /// Deserializes a record from its kind and payload.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Corrupt`] if the payload is truncated, carries
    /// trailing bytes, or holds a key or value that is not valid UTF-8.
    pub fn decode_payload(kind: RecordKind, payload: &[u8]) -> CoreResult<Self> {
        let mut cursor = 0usize;

        let read_u64 = |cursor: &mut usize| -> CoreResult<u64> {
            let end = *cursor + 8;
            let bytes: [u8; 8] = payload
                .get(*cursor..end)
                .ok_or_else(|| CoreError::corrupt("unexpected end of payload"))?
                .try_into()
                .map_err(|_| CoreError::corrupt("invalid u64"))?;
            *cursor = end;
            Ok(u64::from_le_bytes(bytes))
        };

        let read_string = |cursor: &mut usize| -> CoreResult<String> {
            let end = *cursor + 4;
            let len_bytes: [u8; 4] = payload
                .get(*cursor..end)
                .ok_or_else(|| CoreError::corrupt("unexpected end of payload"))?
                .try_into()
                .map_err(|_| CoreError::corrupt("invalid length"))?;
            *cursor = end;
            let len = u32::from_le_bytes(len_bytes) as usize;
            let bytes = payload
                .get(*cursor..*cursor + len)
                .ok_or_else(|| CoreError::corrupt("string extends past end of payload"))?;
            *cursor += len;
            String::from_utf8(bytes.to_vec())
                .map_err(|_| CoreError::corrupt("string is not valid UTF-8"))
        };

        let txn_id = TxnId::new(read_u64(&mut cursor)?);
        let timestamp = read_u64(&mut cursor)? as i64;
        let key = read_string(&mut cursor)?;
        let value = read_string(&mut cursor)?;

        if cursor != payload.len() {
            return Err(CoreError::corrupt(format!(
                "trailing bytes in record: expected {} bytes, got {}",
                cursor,
                payload.len()
            )));
        }

        Ok(Self {
            txn_id,
            kind,
            key,
            value,
            timestamp,
        })
    }
}
