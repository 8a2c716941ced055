//! In-memory key-value store of committed state.

use std::collections::HashMap;

/// The in-memory mapping of committed data.
///
/// Holds only *committed* state: the store is created empty at startup,
/// populated by recovery replay, and thereafter mutated exclusively by the
/// commit protocol's apply step. Aborted and still-active transactions
/// never touch it.
///
/// Also tracks the high-water mark of transaction ids observed in the
/// log, which seeds the engine's id generator so ids are never reused
/// after a restart.
#[derive(Debug, Default)]
pub struct Store {
    data: HashMap<String, String>,
    max_txn_id: u64,
}

impl Store {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks up a key, returning the committed value if present.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    /// Sets a key to a value, overwriting any previous value.
    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.data.insert(key.into(), value.into());
    }

    /// Removes a key. Removing an absent key is a no-op.
    pub fn delete(&mut self, key: &str) {
        self.data.remove(key);
    }

    /// Returns the number of committed keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if no keys are committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the highest transaction id observed.
    #[must_use]
    pub fn max_txn_id(&self) -> u64 {
        self.max_txn_id
    }

    /// Advances the transaction id high-water mark.
    ///
    /// Monotonic: observing an id lower than the current mark leaves the
    /// mark unchanged, so the mark is the maximum over all records seen
    /// regardless of their order in the log.
    pub fn observe_txn_id(&mut self, id: u64) {
        self.max_txn_id = self.max_txn_id.max(id);
    }
}
