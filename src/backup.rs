//! Backup manager
//!
//! Timestamped snapshots of the backing file, retention pruning, and
//! restore. Snapshots are advisory: they run off the mutation's critical
//! path and a failed snapshot never fails the mutation that triggered it.
//! Restore is the one operation here that the store runs under the
//! exclusive table lock.
//!
//! Snapshot naming: `{table}_{YYYYMMDD_HHMMSS}_{reason}.csv` with reason
//! `auto` or `manual`. The safety copy taken before a restore uses the
//! `pre_restore` tag in the same scheme.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::Local;
use tracing::{debug, info, warn};

use crate::atomic::{copy_with_retry, RetryPolicy};
use crate::config::Config;
use crate::error::{Result, RosterError};

/// Why a snapshot was taken; becomes the tag in the snapshot file name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupReason {
    /// Fire-and-forget snapshot after a successful mutation
    Auto,
    /// Operator-requested snapshot
    Manual,
}

impl BackupReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupReason::Auto => "auto",
            BackupReason::Manual => "manual",
        }
    }
}

/// Snapshots the backing file and prunes old snapshots
///
/// Owns the backup directory's contents; only reads the backing file.
/// Cloneable so the store can hand a copy to the detached auto-backup
/// thread.
#[derive(Debug, Clone)]
pub struct BackupManager {
    table_path: PathBuf,
    backup_dir: PathBuf,
    table_name: String,
    retention: usize,
    retry: RetryPolicy,
}

impl BackupManager {
    pub fn new(config: &Config) -> Self {
        Self {
            table_path: config.table_path(),
            backup_dir: config.backup_dir(),
            table_name: config.table_name.clone(),
            retention: config.backup_retention,
            retry: RetryPolicy::from_config(config),
        }
    }

    /// Copy the current backing file into a new uniquely named snapshot
    pub fn snapshot(&self, reason: BackupReason) -> Result<PathBuf> {
        fs::create_dir_all(&self.backup_dir)?;

        let dest = self.snapshot_path(reason.as_str());
        copy_with_retry(&self.table_path, &dest, &self.retry)?;
        info!(snapshot = %dest.display(), reason = reason.as_str(), "snapshot created");
        Ok(dest)
    }

    /// Snapshot and prune in one step; used by the post-mutation trigger
    pub fn snapshot_and_prune(&self, reason: BackupReason) -> Result<PathBuf> {
        let path = self.snapshot(reason)?;
        self.prune(self.retention)?;
        Ok(path)
    }

    /// Keep the `retention` most recently modified snapshots, delete the rest
    pub fn prune(&self, retention: usize) -> Result<()> {
        let mut snapshots = self.snapshots_with_mtime()?;
        if snapshots.len() <= retention {
            return Ok(());
        }

        // Oldest first, trim down to the retention count
        snapshots.sort_by_key(|(_, mtime)| *mtime);
        let excess = snapshots.len() - retention;
        for (path, _) in snapshots.into_iter().take(excess) {
            debug!(snapshot = %path.display(), "pruning old snapshot");
            fs::remove_file(&path)?;
        }
        Ok(())
    }

    /// All snapshots of this table, most recently modified first
    pub fn list_snapshots(&self) -> Result<Vec<PathBuf>> {
        let mut snapshots = self.snapshots_with_mtime()?;
        snapshots.sort_by_key(|(_, mtime)| std::cmp::Reverse(*mtime));
        Ok(snapshots.into_iter().map(|(path, _)| path).collect())
    }

    /// Copy `snapshot` over the backing file, taking a safety copy first
    ///
    /// The caller (the store) must hold the table lock. The safety copy of
    /// the current backing file is taken before anything is overwritten;
    /// a failure after that point leaves the safety copy in place for
    /// manual recovery.
    pub fn restore(&self, snapshot: &Path) -> Result<PathBuf> {
        if !snapshot.exists() {
            return Err(RosterError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("snapshot not found: {}", snapshot.display()),
            )));
        }

        fs::create_dir_all(&self.backup_dir)?;
        let safety = self.snapshot_path("pre_restore");
        copy_with_retry(&self.table_path, &safety, &self.retry)?;
        info!(safety_copy = %safety.display(), "pre-restore safety copy created");

        if let Err(e) = copy_with_retry(snapshot, &self.table_path, &self.retry) {
            warn!(
                snapshot = %snapshot.display(),
                safety_copy = %safety.display(),
                "restore failed after safety copy; safety copy kept"
            );
            return Err(e);
        }

        info!(snapshot = %snapshot.display(), "table restored from snapshot");
        Ok(safety)
    }

    /// The backup directory path
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn snapshot_path(&self, tag: &str) -> PathBuf {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        self.backup_dir
            .join(format!("{}_{}_{}.csv", self.table_name, stamp, tag))
    }

    /// Snapshots of this table paired with their modification time
    fn snapshots_with_mtime(&self) -> Result<Vec<(PathBuf, SystemTime)>> {
        let mut out = Vec::new();
        let entries = match fs::read_dir(&self.backup_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(out),
            Err(e) => return Err(e.into()),
        };

        let prefix = format!("{}_", self.table_name);
        for entry in entries {
            let entry = entry?;
            let path = entry.path();
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if !path.is_file() || !name.starts_with(&prefix) || !name.ends_with(".csv") {
                continue;
            }
            let mtime = entry.metadata()?.modified()?;
            out.push((path, mtime));
        }
        Ok(out)
    }
}
