//! Transaction state machine and commit protocol.

use crate::error::{CoreError, CoreResult};
use crate::store::Store;
use crate::types::TxnId;
use crate::wal::{LogRecord, RecordKind, WalManager};
use parking_lot::RwLock;
use std::sync::Arc;

/// State of a transaction.
///
/// Transitions are `Init -> Active -> {Committed | Aborted}`. The two
/// final states are terminal; no operation leaves them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnState {
    /// Created but not yet begun.
    Init,
    /// Begun; may buffer writes.
    Active,
    /// Committed. Terminal. Read-only views start here.
    Committed,
    /// Aborted. Terminal.
    Aborted,
}

/// A transactional unit of work bound to one transaction id.
///
/// Every `put`/`delete` is appended to the log immediately and buffered;
/// the buffer is applied to the shared store only at commit, after the
/// commit record is durable. A crash mid-transaction therefore leaves a
/// trail of records in the log that recovery recognizes as belonging to
/// an unfinished transaction and discards.
///
/// Reads go straight to the shared store of committed state: a
/// transaction does not see its own uncommitted writes via [`get`].
///
/// [`get`]: Transaction::get
#[derive(Debug)]
pub struct Transaction {
    id: TxnId,
    state: TxnState,
    wal: Arc<WalManager>,
    store: Arc<RwLock<Store>>,
    pending: Vec<LogRecord>,
}

impl Transaction {
    /// Creates a transaction in the `Init` state.
    pub(crate) fn new(id: TxnId, wal: Arc<WalManager>, store: Arc<RwLock<Store>>) -> Self {
        Self {
            id,
            state: TxnState::Init,
            wal,
            store,
            pending: Vec::new(),
        }
    }

    /// Creates a read-only transaction.
    ///
    /// Starts directly in the terminal `Committed` state without logging
    /// anything, so `get` works but `put`/`delete` fail with `NotActive`.
    pub(crate) fn new_read_only(
        id: TxnId,
        wal: Arc<WalManager>,
        store: Arc<RwLock<Store>>,
    ) -> Self {
        Self {
            id,
            state: TxnState::Committed,
            wal,
            store,
            pending: Vec::new(),
        }
    }

    /// Returns the transaction id.
    #[must_use]
    pub fn id(&self) -> TxnId {
        self.id
    }

    /// Returns the current state.
    #[must_use]
    pub fn state(&self) -> TxnState {
        self.state
    }

    /// Begins the transaction, appending a Begin record to the log.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AlreadyStarted`] if already active, or
    /// [`CoreError::TransactionClosed`] if already finalized.
    pub(crate) fn begin(&mut self) -> CoreResult<()> {
        match self.state {
            TxnState::Init => {}
            TxnState::Active => return Err(CoreError::AlreadyStarted),
            TxnState::Committed | TxnState::Aborted => {
                return Err(CoreError::TransactionClosed)
            }
        }
        self.wal.append(&LogRecord::begin(self.id))?;
        self.state = TxnState::Active;
        Ok(())
    }

    /// Looks up a key in the shared store of committed state.
    ///
    /// Uncommitted writes buffered by this transaction are not visible,
    /// including to the transaction itself.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.store.read().get(key).map(str::to_owned)
    }

    /// Records an update of `key` to `value`.
    ///
    /// The record is appended to the log immediately; the store is not
    /// touched until commit.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotActive`] if the transaction is not active,
    /// or an I/O error from the log append. On failure the transaction's
    /// state and buffered operations are unchanged.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) -> CoreResult<()> {
        if self.state != TxnState::Active {
            return Err(CoreError::NotActive);
        }
        let record = LogRecord::put(self.id, key, value);
        self.wal.append(&record)?;
        self.pending.push(record);
        Ok(())
    }

    /// Records a removal of `key`.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotActive`] if the transaction is not active,
    /// or an I/O error from the log append.
    pub fn delete(&mut self, key: impl Into<String>) -> CoreResult<()> {
        if self.state != TxnState::Active {
            return Err(CoreError::NotActive);
        }
        let record = LogRecord::delete(self.id, key);
        self.wal.append(&record)?;
        self.pending.push(record);
        Ok(())
    }

    /// Commits the transaction.
    ///
    /// Protocol, in strict order:
    ///
    /// 1. Append the Commit record.
    /// 2. Sync the log - the durability barrier. Once this returns, the
    ///    transaction is durably committed even if the process dies now.
    /// 3. Apply buffered operations to the store in original order.
    /// 4. Transition to `Committed`.
    /// 5. Sync the log again.
    ///
    /// If step 1 or 2 fails the state is still `Active` and no store
    /// mutation has occurred; the caller must treat the transaction as
    /// failed.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AlreadyFinalized`] if not active, or the I/O
    /// error from the log.
    pub(crate) fn commit(&mut self) -> CoreResult<()> {
        if self.state != TxnState::Active {
            return Err(CoreError::AlreadyFinalized);
        }

        self.wal.append(&LogRecord::commit(self.id))?;
        self.wal.sync()?;

        {
            let mut store = self.store.write();
            for record in &self.pending {
                match record.kind {
                    RecordKind::Put => store.put(record.key.clone(), record.value.clone()),
                    RecordKind::Delete => store.delete(&record.key),
                    _ => {}
                }
            }
        }

        self.state = TxnState::Committed;
        self.wal.sync()?;
        Ok(())
    }

    /// Aborts the transaction, discarding its buffered operations.
    ///
    /// Appends an Abort record and syncs the log. The store is never
    /// mutated for an aborted transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::AlreadyFinalized`] if not active, or the I/O
    /// error from the log.
    pub(crate) fn abort(&mut self) -> CoreResult<()> {
        if self.state != TxnState::Active {
            return Err(CoreError::AlreadyFinalized);
        }
        self.wal.append(&LogRecord::abort(self.id))?;
        self.state = TxnState::Aborted;
        self.wal.sync()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use walkv_storage::MemoryBackend;

    fn harness() -> (Arc<WalManager>, Arc<RwLock<Store>>) {
        let wal = Arc::new(WalManager::new(Box::new(MemoryBackend::new()), false));
        let store = Arc::new(RwLock::new(Store::new()));
        (wal, store)
    }

    fn active_txn(id: u64, wal: &Arc<WalManager>, store: &Arc<RwLock<Store>>) -> Transaction {
        let mut txn = Transaction::new(TxnId::new(id), Arc::clone(wal), Arc::clone(store));
        txn.begin().unwrap();
        txn
    }

    #[test]
    fn begin_moves_init_to_active_and_logs() {
        let (wal, store) = harness();
        let mut txn = Transaction::new(TxnId::new(1), Arc::clone(&wal), store);
        assert_eq!(txn.state(), TxnState::Init);

        txn.begin().unwrap();
        assert_eq!(txn.state(), TxnState::Active);

        let records = wal.read_all().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].1.kind, RecordKind::Begin);
    }

    #[test]
    fn begin_twice_fails() {
        let (wal, store) = harness();
        let mut txn = active_txn(1, &wal, &store);
        assert!(matches!(txn.begin(), Err(CoreError::AlreadyStarted)));
    }

    #[test]
    fn begin_after_commit_fails() {
        let (wal, store) = harness();
        let mut txn = active_txn(1, &wal, &store);
        txn.commit().unwrap();
        assert!(matches!(txn.begin(), Err(CoreError::TransactionClosed)));
    }

    #[test]
    fn put_logs_and_buffers_without_applying() {
        let (wal, store) = harness();
        let mut txn = active_txn(1, &wal, &store);

        txn.put("foo", "bar").unwrap();

        // Logged immediately...
        let records = wal.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].1.kind, RecordKind::Put);
        // ...but not applied to the store.
        assert!(store.read().is_empty());
    }

    #[test]
    fn get_does_not_see_own_uncommitted_write() {
        let (wal, store) = harness();
        let mut txn = active_txn(1, &wal, &store);

        txn.put("foo", "bar").unwrap();
        assert_eq!(txn.get("foo"), None);

        txn.commit().unwrap();
        assert_eq!(txn.get("foo"), Some("bar".to_string()));
    }

    #[test]
    fn put_on_init_transaction_fails() {
        let (wal, store) = harness();
        let mut txn = Transaction::new(TxnId::new(1), wal, store);
        assert!(matches!(txn.put("k", "v"), Err(CoreError::NotActive)));
    }

    #[test]
    fn commit_applies_operations_in_order() {
        let (wal, store) = harness();
        let mut txn = active_txn(1, &wal, &store);

        txn.put("k", "first").unwrap();
        txn.put("k", "second").unwrap();
        txn.put("gone", "x").unwrap();
        txn.delete("gone").unwrap();
        txn.commit().unwrap();

        let store = store.read();
        assert_eq!(store.get("k"), Some("second"));
        assert_eq!(store.get("gone"), None);
    }

    #[test]
    fn commit_writes_terminal_record() {
        let (wal, store) = harness();
        let mut txn = active_txn(1, &wal, &store);
        txn.put("a", "1").unwrap();
        txn.commit().unwrap();

        let records = wal.read_all().unwrap();
        assert_eq!(records.last().unwrap().1.kind, RecordKind::Commit);
        assert_eq!(txn.state(), TxnState::Committed);
    }

    #[test]
    fn commit_twice_fails() {
        let (wal, store) = harness();
        let mut txn = active_txn(1, &wal, &store);
        txn.commit().unwrap();
        assert!(matches!(txn.commit(), Err(CoreError::AlreadyFinalized)));
    }

    #[test]
    fn abort_discards_operations() {
        let (wal, store) = harness();
        let mut txn = active_txn(1, &wal, &store);

        txn.put("foo", "bar").unwrap();
        txn.abort().unwrap();

        assert_eq!(txn.state(), TxnState::Aborted);
        assert!(store.read().is_empty());

        let records = wal.read_all().unwrap();
        assert_eq!(records.last().unwrap().1.kind, RecordKind::Abort);
    }

    #[test]
    fn abort_after_commit_fails() {
        let (wal, store) = harness();
        let mut txn = active_txn(1, &wal, &store);
        txn.commit().unwrap();
        assert!(matches!(txn.abort(), Err(CoreError::AlreadyFinalized)));
    }

    #[test]
    fn read_only_transaction_rejects_writes() {
        let (wal, store) = harness();
        store.write().put("existing", "value");

        let mut txn = Transaction::new_read_only(TxnId::new(1), wal, store);
        assert_eq!(txn.get("existing"), Some("value".to_string()));
        assert!(matches!(txn.put("k", "v"), Err(CoreError::NotActive)));
        assert!(matches!(txn.delete("existing"), Err(CoreError::NotActive)));
    }
}
