//! Record store
//!
//! The CRUD engine that coordinates all components.
//!
//! ## Responsibilities
//! - Serialize mutations behind the cross-process table lock
//! - Keep reads lock-free against the atomically replaced backing file
//! - Allocate IDs and enforce student-code uniqueness under lock
//! - Trigger best-effort snapshots after each committed mutation
//!
//! ## Concurrency Model: locked mutations, lock-free reads
//!
//! - **Mutations** (create/update/delete/restore): each one is an
//!   independent locked transaction — acquire lock → load table → transform
//!   in memory → persist via atomic replace → release. At most one
//!   mutation proceeds at a time system-wide.
//!
//! - **Reads** (read/list/search/next_id_preview): no lock. A reader may
//!   see a slightly stale file but never a torn one; the atomic rename
//!   guarantees a complete pre- or post-mutation snapshot.
//!
//! There is no in-memory state shared across calls, so the store needs no
//! internal locking of its own.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{info, warn};

use crate::atomic::{atomic_replace, RetryPolicy};
use crate::backup::{BackupManager, BackupReason};
use crate::config::Config;
use crate::error::{Result, RosterError};
use crate::lock::LockManager;
use crate::record::{Record, RecordDraft, RecordPatch};
use crate::table::Table;
use crate::validate::{is_valid_student_code, sanitize};

/// Explicit confirmation token for [`Store::delete`]
///
/// Deletion is irreversible; the store never prompts, so the caller must
/// construct this token deliberately after obtaining a non-ambiguous
/// confirmation from its user.
#[derive(Debug)]
pub struct DeleteConfirmation(());

impl DeleteConfirmation {
    pub fn confirmed() -> Self {
        DeleteConfirmation(())
    }
}

/// The record store
pub struct Store {
    config: Config,
    table_path: PathBuf,
    lock: LockManager,
    backup: BackupManager,
    retry: RetryPolicy,
}

impl Store {
    /// Open or create a store with the given config
    ///
    /// On startup:
    /// 1. Create the data directory
    /// 2. Initialize a header-only backing file if none exists
    pub fn open(config: Config) -> Result<Self> {
        if config.table_name.is_empty() {
            return Err(RosterError::Config("table name must not be empty".into()));
        }

        fs::create_dir_all(&config.data_dir)?;

        let table_path = config.table_path();
        let retry = RetryPolicy::from_config(&config);

        if !table_path.exists() {
            atomic_replace(&table_path, || Ok(Table::empty_file_content()), &retry)?;
            info!(table = %table_path.display(), "initialized empty table");
        }

        Ok(Self {
            lock: LockManager::new(&config),
            backup: BackupManager::new(&config),
            table_path,
            retry,
            config,
        })
    }

    /// Open with a data directory (convenience method)
    ///
    /// Uses default config with the specified data directory
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open(Config::builder().data_dir(path).build())
    }

    // =========================================================================
    // Mutations (serialized behind the table lock)
    // =========================================================================

    /// Create a new record from a draft
    ///
    /// The student code is sanitized and format-checked here, and its
    /// uniqueness re-verified under lock; a collaborator's pre-check
    /// cannot close the race window between its check and this commit.
    /// Assigns the next ID and stamps the registration time.
    pub fn create(&self, draft: RecordDraft) -> Result<Record> {
        let code = sanitize(&draft.student_code);
        if !is_valid_student_code(&code) {
            return Err(RosterError::InvalidCode { code });
        }

        let guard = self.lock.acquire()?;
        let mut table = Table::load(&self.table_path)?;

        if table.code_in_use(&code, None) {
            return Err(RosterError::DuplicateCode { code });
        }

        let record = Record {
            id: table.next_id(),
            student_code: code,
            first_name: draft.first_name,
            last_name: draft.last_name,
            email: draft.email,
            phone: draft.phone,
            gpa: draft.gpa,
            registered_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        };

        table.push(record.clone());
        table.persist(&self.table_path, &self.retry)?;
        drop(guard);

        info!(id = record.id, code = %record.student_code, "record created");
        self.trigger_auto_backup();
        Ok(record)
    }

    /// Update an existing record with keep-if-absent merge semantics
    ///
    /// A field left `None` in the patch retains its current value. A
    /// changed student code is re-validated for uniqueness excluding this
    /// record.
    pub fn update(&self, id: u64, patch: RecordPatch) -> Result<Record> {
        let guard = self.lock.acquire()?;
        let mut table = Table::load(&self.table_path)?;

        let current = table.find(id).ok_or(RosterError::NotFound { id })?.clone();
        let mut merged = current.merged(&patch);

        if merged.student_code != current.student_code {
            merged.student_code = sanitize(&merged.student_code);
            if !is_valid_student_code(&merged.student_code) {
                return Err(RosterError::InvalidCode {
                    code: merged.student_code,
                });
            }
            if table.code_in_use(&merged.student_code, Some(id)) {
                return Err(RosterError::DuplicateCode {
                    code: merged.student_code,
                });
            }
        }

        table.replace(merged.clone())?;
        table.persist(&self.table_path, &self.retry)?;
        drop(guard);

        info!(id, "record updated");
        self.trigger_auto_backup();
        Ok(merged)
    }

    /// Delete a record permanently
    ///
    /// Irreversible; requires an explicit [`DeleteConfirmation`] from the
    /// caller. Returns the removed record.
    pub fn delete(&self, id: u64, _confirm: DeleteConfirmation) -> Result<Record> {
        let guard = self.lock.acquire()?;
        let mut table = Table::load(&self.table_path)?;

        let removed = table.remove(id)?;
        table.persist(&self.table_path, &self.retry)?;
        drop(guard);

        info!(id, code = %removed.student_code, "record deleted");
        self.trigger_auto_backup();
        Ok(removed)
    }

    // =========================================================================
    // Reads (lock-free)
    // =========================================================================

    /// Get a record by ID
    pub fn read(&self, id: u64) -> Result<Record> {
        let table = Table::load(&self.table_path)?;
        table
            .find(id)
            .cloned()
            .ok_or(RosterError::NotFound { id })
    }

    /// All live records in file order
    pub fn list(&self) -> Result<Vec<Record>> {
        Ok(Table::load(&self.table_path)?.into_records())
    }

    /// Case-insensitive substring search over code/first/last/email
    pub fn search(&self, term: &str) -> Result<Vec<Record>> {
        let table = Table::load(&self.table_path)?;
        Ok(table
            .into_records()
            .into_iter()
            .filter(|r| r.matches(term))
            .collect())
    }

    /// The ID the next `create` would assign (diagnostic only)
    ///
    /// Computed lock-free, so a concurrent create can still claim it first.
    pub fn next_id_preview(&self) -> Result<u64> {
        Ok(Table::load(&self.table_path)?.next_id())
    }

    // =========================================================================
    // Backup / Restore
    // =========================================================================

    /// Take a snapshot now and prune to the retention limit
    pub fn backup(&self, reason: BackupReason) -> Result<PathBuf> {
        self.backup.snapshot_and_prune(reason)
    }

    /// Replace the backing file with a snapshot, under the table lock
    ///
    /// A dated safety copy of the current backing file is taken first and
    /// its path returned; any failure after that point leaves the safety
    /// copy in place for manual recovery.
    pub fn restore(&self, snapshot: &Path) -> Result<PathBuf> {
        let guard = self.lock.acquire()?;
        let safety = self.backup.restore(snapshot)?;
        drop(guard);
        Ok(safety)
    }

    /// Fire-and-forget snapshot after a committed mutation
    ///
    /// Runs detached from the mutation's critical path and never holds the
    /// table lock. Backups are advisory: a failure is logged and dropped,
    /// it is not part of the mutation's durability contract.
    fn trigger_auto_backup(&self) {
        let backup = self.backup.clone();
        std::thread::spawn(move || {
            if let Err(e) = backup.snapshot_and_prune(BackupReason::Auto) {
                warn!("auto backup failed: {}", e);
            }
        });
    }

    // =========================================================================
    // Accessors (for testing and debugging)
    // =========================================================================

    /// Path of the backing CSV file
    pub fn table_path(&self) -> &Path {
        &self.table_path
    }

    /// The backup manager
    pub fn backups(&self) -> &BackupManager {
        &self.backup
    }

    /// The configuration
    pub fn config(&self) -> &Config {
        &self.config
    }
}
