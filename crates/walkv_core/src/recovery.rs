//! Log replay and crash recovery.

use crate::error::{CoreError, CoreResult};
use crate::store::Store;
use crate::types::TxnId;
use crate::wal::{LogRecord, RecordKind, WalManager};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// Replays the log from `start_offset` and folds it into `store`.
///
/// Runs once at startup, before any transaction is created. State is
/// reconstructed purely from the record stream: operations of a
/// transaction are buffered per id and applied to the store only when its
/// Commit record is reached, in original order. Transactions that reach
/// Abort, or that never reach a terminal record before the stream ends,
/// leave the store untouched. This is redo-only recovery - the store is
/// never mutated before commit, so there is nothing to undo.
///
/// The store's transaction id high-water mark is advanced by every record
/// seen, committed or not, so ids from unfinished transactions are never
/// reissued.
///
/// Records that do not fit their transaction's replay state (a duplicate
/// Begin, or a Put/Delete/Commit/Abort for a transaction that is not
/// active) are expected crash artifacts: they are logged and skipped.
/// Only a structurally corrupt stream or an unexpected record kind fails
/// recovery, wrapped as [`CoreError::Recovery`].
pub fn replay(wal: &WalManager, store: &mut Store, start_offset: u64) -> CoreResult<()> {
    replay_inner(wal, store, start_offset).map_err(CoreError::recovery)
}

fn replay_inner(wal: &WalManager, store: &mut Store, start_offset: u64) -> CoreResult<()> {
    // Transient replay state, discarded when the pass completes. Mirrors
    // what each live transaction buffered before its terminal record.
    let mut pending_ops: HashMap<TxnId, Vec<LogRecord>> = HashMap::new();
    let mut active: HashSet<TxnId> = HashSet::new();

    let mut records_seen = 0u64;
    let mut committed = 0u64;

    for result in wal.iter_from(start_offset)? {
        let (offset, record) = result?;
        records_seen += 1;
        let txn_id = record.txn_id;
        store.observe_txn_id(txn_id.as_u64());

        match record.kind {
            RecordKind::Begin => {
                if active.contains(&txn_id) {
                    warn!(%txn_id, offset, "duplicate Begin record, ignoring");
                    continue;
                }
                active.insert(txn_id);
            }
            RecordKind::Put | RecordKind::Delete => {
                if !active.contains(&txn_id) {
                    warn!(%txn_id, offset, kind = ?record.kind,
                        "operation for a transaction that is not active, ignoring");
                    continue;
                }
                pending_ops.entry(txn_id).or_default().push(record);
            }
            RecordKind::Commit => {
                if !active.remove(&txn_id) {
                    warn!(%txn_id, offset, "Commit for a transaction that is not active, ignoring");
                    continue;
                }
                if let Some(ops) = pending_ops.remove(&txn_id) {
                    for op in ops {
                        match op.kind {
                            RecordKind::Put => store.put(op.key, op.value),
                            RecordKind::Delete => store.delete(&op.key),
                            _ => {}
                        }
                    }
                }
                committed += 1;
            }
            RecordKind::Abort => {
                if !active.remove(&txn_id) {
                    warn!(%txn_id, offset, "Abort for a transaction that is not active, ignoring");
                    continue;
                }
                pending_ops.remove(&txn_id);
            }
            RecordKind::Persist => {
                return Err(CoreError::UnknownRecordKind {
                    kind: record.kind.as_byte(),
                    offset,
                });
            }
        }
    }

    // Whatever is still active began but never reached a terminal record
    // before the crash: discard its buffered operations unapplied.
    for txn_id in active.drain() {
        let dropped = pending_ops.remove(&txn_id).map_or(0, |ops| ops.len());
        warn!(%txn_id, dropped, "transaction never finalized, discarding");
    }

    debug!(
        records_seen,
        committed,
        max_txn_id = store.max_txn_id(),
        keys = store.len(),
        "log replay complete"
    );

    Ok(())
}
