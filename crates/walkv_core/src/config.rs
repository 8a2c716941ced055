//! Engine configuration.

/// Configuration for opening an engine.
#[derive(Debug, Clone)]
pub struct Config {
    /// Whether to create the log if it doesn't exist.
    pub create_if_missing: bool,

    /// Whether to sync the log after every append.
    ///
    /// Off by default: the commit protocol already syncs at its
    /// durability barriers regardless of this setting, so per-append
    /// syncing only narrows the window for records of *unfinished*
    /// transactions, at a large throughput cost.
    pub sync_on_write: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            create_if_missing: true,
            sync_on_write: false,
        }
    }
}

impl Config {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets whether to create the log if missing.
    #[must_use]
    pub const fn create_if_missing(mut self, value: bool) -> Self {
        self.create_if_missing = value;
        self
    }

    /// Sets whether to sync the log after every append.
    #[must_use]
    pub const fn sync_on_write(mut self, value: bool) -> Self {
        self.sync_on_write = value;
        self
    }
}
