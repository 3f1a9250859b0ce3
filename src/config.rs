//! Configuration for RosterDB
//!
//! Centralized configuration with sensible defaults. Every component takes
//! its knobs from this struct at construction time; there is no ambient
//! global state.

use std::path::PathBuf;
use std::time::Duration;

/// Main configuration for a RosterDB store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Root directory for all data files.
    /// Internal structure:
    ///   {data_dir}/
    ///     ├── {table}.csv        (backing file, single source of truth)
    ///     ├── {table}.lock/      (lock directory while a mutation runs)
    ///     └── backups/           (timestamped snapshots)
    pub data_dir: PathBuf,

    /// Table name; determines the backing file and lock names
    pub table_name: String,

    // -------------------------------------------------------------------------
    // Lock Configuration
    // -------------------------------------------------------------------------
    /// Total time to wait for the table lock before giving up
    pub lock_timeout: Duration,

    /// How often to re-check a held lock while waiting
    pub lock_poll_interval: Duration,

    // -------------------------------------------------------------------------
    // Retry Configuration
    // -------------------------------------------------------------------------
    /// Max attempts for an atomic replace or backup copy
    pub max_retries: u32,

    /// Pause between retry attempts
    pub retry_backoff: Duration,

    // -------------------------------------------------------------------------
    // Backup Configuration
    // -------------------------------------------------------------------------
    /// Number of snapshots retained after pruning
    pub backup_retention: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./rosterdb_data"),
            table_name: "students".to_string(),
            lock_timeout: Duration::from_secs(10),
            lock_poll_interval: Duration::from_secs(1),
            max_retries: 3,
            retry_backoff: Duration::from_millis(100),
            backup_retention: 10,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// Path of the backing CSV file
    pub fn table_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.csv", self.table_name))
    }

    /// Path of the lock directory for the table
    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join(format!("{}.lock", self.table_name))
    }

    /// Path of the backup directory
    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join("backups")
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory (root for all storage)
    pub fn data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.data_dir = path.into();
        self
    }

    /// Set the table name
    pub fn table_name(mut self, name: impl Into<String>) -> Self {
        self.config.table_name = name.into();
        self
    }

    /// Set the lock acquisition timeout
    pub fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.config.lock_timeout = timeout;
        self
    }

    /// Set the lock polling interval
    pub fn lock_poll_interval(mut self, interval: Duration) -> Self {
        self.config.lock_poll_interval = interval;
        self
    }

    /// Set the maximum number of I/O retry attempts
    pub fn max_retries(mut self, count: u32) -> Self {
        self.config.max_retries = count;
        self
    }

    /// Set the pause between retry attempts
    pub fn retry_backoff(mut self, backoff: Duration) -> Self {
        self.config.retry_backoff = backoff;
        self
    }

    /// Set the number of snapshots kept by pruning
    pub fn backup_retention(mut self, count: usize) -> Self {
        self.config.backup_retention = count;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
