//! Engine facade: opening, recovery, and transaction entry points.

use crate::config::Config;
use crate::error::{CoreError, CoreResult};
use crate::recovery;
use crate::store::Store;
use crate::transaction::Transaction;
use crate::types::TxnId;
use crate::wal::WalManager;
use parking_lot::{Mutex, RwLock};
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::error;

/// Name of the log file inside an engine directory.
const WAL_FILE: &str = "wal.log";

/// The main engine handle.
///
/// Owns the log and the store for the process lifetime, generates
/// transaction ids, and exposes [`update`] and [`view`] as the only
/// transaction entry points. Opening an engine replays the entire log
/// first, so the store always reflects exactly the committed
/// transactions, and only those.
///
/// All transactions are serialized through a single engine-wide lock:
/// log record order is identical to commit order, which is what makes
/// redo-only replay correct.
///
/// # Example
///
/// ```rust
/// use walkv_core::Engine;
///
/// let engine = Engine::open_in_memory().unwrap();
///
/// engine
///     .update(|txn| {
///         txn.put("foo", "bar")?;
///         Ok(())
///     })
///     .unwrap();
///
/// assert_eq!(engine.get("foo"), Some("bar".to_string()));
/// ```
///
/// [`update`]: Engine::update
/// [`view`]: Engine::view
pub struct Engine {
    /// Log handle, shared with each transaction.
    wal: Arc<WalManager>,
    /// Committed state, shared with each transaction.
    store: Arc<RwLock<Store>>,
    /// Next transaction id to issue.
    next_txn_id: AtomicU64,
    /// Serializes every `update`/`view` end to end.
    txn_lock: Mutex<()>,
}

impl Engine {
    /// Opens an engine rooted at a directory, with default configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Open`] if the log is missing and
    /// `create_if_missing` is off, [`CoreError::Recovery`] if replay
    /// fails, or an I/O error from opening the log.
    pub fn open(path: &Path) -> CoreResult<Self> {
        Self::open_with_config(path, Config::default())
    }

    /// Opens an engine rooted at a directory with custom configuration.
    ///
    /// The directory holds a single `wal.log` file; parent directories
    /// are created as needed.
    pub fn open_with_config(path: &Path, config: Config) -> CoreResult<Self> {
        use walkv_storage::FileBackend;

        let wal_path = path.join(WAL_FILE);
        if !config.create_if_missing && !wal_path.exists() {
            return Err(CoreError::open(format!(
                "log not found at {} and create_if_missing is off",
                wal_path.display()
            )));
        }

        let backend = FileBackend::open_with_create_dirs(&wal_path)?;
        Self::open_with_backend(Box::new(backend), config)
    }

    /// Opens an engine over a pre-built log backend.
    ///
    /// Lower-level constructor used for in-memory engines and for
    /// crash-recovery tests that reopen a captured byte snapshot.
    pub fn open_with_backend(
        backend: Box<dyn walkv_storage::LogBackend>,
        config: Config,
    ) -> CoreResult<Self> {
        let wal = Arc::new(WalManager::new(backend, config.sync_on_write));

        let mut store = Store::new();
        recovery::replay(&wal, &mut store, 0)?;
        let watermark = store.max_txn_id();

        Ok(Self {
            wal,
            store: Arc::new(RwLock::new(store)),
            next_txn_id: AtomicU64::new(watermark + 1),
            txn_lock: Mutex::new(()),
        })
    }

    /// Opens a fresh non-persistent engine for testing.
    pub fn open_in_memory() -> CoreResult<Self> {
        use walkv_storage::MemoryBackend;
        Self::open_with_backend(Box::new(MemoryBackend::new()), Config::default())
    }

    /// Issues the next transaction id.
    ///
    /// Strictly increasing and never reused, including across restarts:
    /// the counter is seeded past every id recovery observed in the log.
    /// Safe under concurrent callers.
    pub fn next_txn_id(&self) -> TxnId {
        TxnId::new(self.next_txn_id.fetch_add(1, Ordering::SeqCst))
    }

    /// Runs a read-write transaction.
    ///
    /// Creates a transaction, begins it, and invokes `work`. If `work`
    /// succeeds the transaction is committed and its result returned; if
    /// it fails the transaction is aborted and the error returned. Should
    /// the abort itself also fail, that failure is logged and the
    /// original error is still the one returned, so the root cause is
    /// never masked.
    ///
    /// The whole call is serialized against every other `update`/`view`.
    ///
    /// # Errors
    ///
    /// Returns the error from `work`, or from begin/commit.
    pub fn update<T, F>(&self, work: F) -> CoreResult<T>
    where
        F: FnOnce(&mut Transaction) -> CoreResult<T>,
    {
        let _guard = self.txn_lock.lock();

        let mut txn = Transaction::new(
            self.next_txn_id(),
            Arc::clone(&self.wal),
            Arc::clone(&self.store),
        );
        txn.begin()?;

        match work(&mut txn) {
            Ok(value) => {
                txn.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(abort_err) = txn.abort() {
                    error!(txn_id = %txn.id(), %abort_err, "abort failed after work error");
                }
                Err(err)
            }
        }
    }

    /// Runs a read-only transaction.
    ///
    /// The transaction starts in a terminal read state without writing to
    /// the log: `get` works, `put`/`delete` fail with
    /// [`CoreError::NotActive`].
    ///
    /// # Errors
    ///
    /// Returns the error from `work`.
    pub fn view<T, F>(&self, work: F) -> CoreResult<T>
    where
        F: FnOnce(&mut Transaction) -> CoreResult<T>,
    {
        let _guard = self.txn_lock.lock();

        let mut txn = Transaction::new_read_only(
            self.next_txn_id(),
            Arc::clone(&self.wal),
            Arc::clone(&self.store),
        );
        work(&mut txn)
    }

    /// Looks up a key directly, outside any transaction.
    ///
    /// Equivalent to a trivial [`view`](Engine::view) that reads one key.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        let _guard = self.txn_lock.lock();
        self.store.read().get(key).map(str::to_owned)
    }

    /// Returns the highest transaction id issued or observed so far.
    #[must_use]
    pub fn last_txn_id(&self) -> u64 {
        self.next_txn_id.load(Ordering::SeqCst) - 1
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("keys", &self.store.read().len())
            .field("last_txn_id", &self.last_txn_id())
            .finish_non_exhaustive()
    }
}
