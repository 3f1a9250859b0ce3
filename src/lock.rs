//! Cross-process table lock
//!
//! Mutual exclusion between processes (and threads) mutating the same
//! table, built on the atomic create-or-fail semantics of `mkdir`: whoever
//! creates the lock directory holds the lock. An `owner.json` sentinel
//! inside records the holder's identity so waiters can detect and reclaim
//! stale locks.
//!
//! ## Staleness
//!
//! A lock is reclaimed (with a warning) when:
//! - the recorded holder PID is no longer alive on this host, or
//! - the sentinel is older than twice the configured timeout, even if the
//!   holder still looks alive (covers clock skew and zombie holders).
//!
//! ## Release
//!
//! [`LockGuard`] releases on drop, so the lock is returned on every exit
//! path of the critical section, including panics. Release is idempotent.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Result, RosterError};

/// Sentinel file name inside the lock directory
const SENTINEL_FILE: &str = "owner.json";

/// Identity of the current lock holder, persisted inside the lock directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockSentinel {
    /// PID of the process holding the lock
    pub pid: u32,
    /// Hostname of the holding machine
    pub hostname: String,
    /// When the lock was acquired (Unix timestamp millis)
    pub acquired_at_ms: u64,
    /// Resource the lock protects
    pub resource: String,
}

impl LockSentinel {
    fn current(resource: &str) -> Self {
        Self {
            pid: std::process::id(),
            hostname: hostname(),
            acquired_at_ms: unix_millis(),
            resource: resource.to_string(),
        }
    }

    /// Whether the recorded holder PID is still alive on this host
    ///
    /// Cross-host holders cannot be verified and are assumed alive.
    pub fn is_holder_alive(&self) -> bool {
        if self.hostname != hostname() {
            return true;
        }
        is_pid_alive(self.pid)
    }

    /// Whether the sentinel is older than the given threshold
    pub fn is_stale(&self, threshold: Duration) -> bool {
        let age_ms = unix_millis().saturating_sub(self.acquired_at_ms);
        Duration::from_millis(age_ms) > threshold
    }
}

/// Acquires and releases the table lock
#[derive(Debug, Clone)]
pub struct LockManager {
    lock_dir: PathBuf,
    resource: String,
    timeout: Duration,
    poll_interval: Duration,
}

impl LockManager {
    /// Build a lock manager for the configured table
    pub fn new(config: &Config) -> Self {
        Self {
            lock_dir: config.lock_path(),
            resource: config.table_name.clone(),
            timeout: config.lock_timeout,
            poll_interval: config.lock_poll_interval,
        }
    }

    /// Acquire the lock, waiting up to the configured timeout
    ///
    /// Polls at the configured interval while another holder is active.
    /// Stale locks are forcibly reclaimed. Exhausting the timeout fails
    /// with [`RosterError::LockTimeout`]; callers treat that as fatal for
    /// the operation rather than retrying further up.
    pub fn acquire(&self) -> Result<LockGuard> {
        let deadline = Instant::now() + self.timeout;
        let mut last_holder_pid = 0;

        loop {
            match self.try_acquire()? {
                Some(guard) => return Ok(guard),
                None => {
                    if let Some(sentinel) = self.read_sentinel() {
                        last_holder_pid = sentinel.pid;
                        if self.reclaim_if_stale(&sentinel)? {
                            continue;
                        }
                    }
                }
            }

            if Instant::now() >= deadline {
                return Err(RosterError::LockTimeout {
                    resource: self.resource.clone(),
                    timeout_secs: self.timeout.as_secs(),
                    holder_pid: last_holder_pid,
                });
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            std::thread::sleep(self.poll_interval.min(remaining));
        }
    }

    /// One acquisition attempt; `None` means another holder is active
    fn try_acquire(&self) -> Result<Option<LockGuard>> {
        match fs::create_dir(&self.lock_dir) {
            Ok(()) => {
                let sentinel = LockSentinel::current(&self.resource);
                let json = serde_json::to_string_pretty(&sentinel)
                    .map_err(|e| RosterError::Corrupt(format!("sentinel encode: {}", e)))?;
                if let Err(e) = fs::write(self.lock_dir.join(SENTINEL_FILE), json) {
                    // A lock dir without a sentinel could never be reclaimed
                    let _ = remove_lock_dir(&self.lock_dir);
                    return Err(e.into());
                }
                debug!(pid = sentinel.pid, resource = %self.resource, "lock acquired");
                Ok(Some(LockGuard {
                    lock_dir: self.lock_dir.clone(),
                    released: false,
                }))
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Read the current holder's sentinel, if present and parseable
    ///
    /// A lock directory without a readable sentinel is mid-acquisition or
    /// torn; the poll loop just tries again later.
    fn read_sentinel(&self) -> Option<LockSentinel> {
        let contents = fs::read_to_string(self.lock_dir.join(SENTINEL_FILE)).ok()?;
        serde_json::from_str(&contents).ok()
    }

    /// Reclaim the lock if the holder is dead or the sentinel too old
    ///
    /// Returns true when the lock was torn down and may be re-attempted
    /// immediately.
    fn reclaim_if_stale(&self, sentinel: &LockSentinel) -> Result<bool> {
        let stale_threshold = self.timeout * 2;

        if !sentinel.is_holder_alive() {
            warn!(
                pid = sentinel.pid,
                resource = %self.resource,
                "reclaiming lock: holder process is dead"
            );
        } else if sentinel.is_stale(stale_threshold) {
            warn!(
                pid = sentinel.pid,
                resource = %self.resource,
                age_ms = unix_millis().saturating_sub(sentinel.acquired_at_ms),
                "reclaiming lock: sentinel exceeded {}s",
                stale_threshold.as_secs()
            );
        } else {
            return Ok(false);
        }

        // Another waiter may have reclaimed and re-acquired since the
        // sentinel above was read; re-read at the last moment and only
        // tear down the exact sentinel judged stale, never a fresh one.
        match self.read_sentinel() {
            Some(current)
                if current.pid == sentinel.pid
                    && current.acquired_at_ms == sentinel.acquired_at_ms =>
            {
                remove_lock_dir(&self.lock_dir)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// The directory used as the lock
    pub fn lock_dir(&self) -> &Path {
        &self.lock_dir
    }
}

/// Proof of held mutual exclusion over the table
///
/// Dropping the guard releases the lock.
#[derive(Debug)]
pub struct LockGuard {
    lock_dir: PathBuf,
    released: bool,
}

impl LockGuard {
    /// Release explicitly; idempotent
    pub fn release(mut self) {
        self.release_inner();
    }

    fn release_inner(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        if let Err(e) = remove_lock_dir(&self.lock_dir) {
            warn!(path = %self.lock_dir.display(), "failed to release lock: {}", e);
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.release_inner();
    }
}

/// Remove sentinel and lock directory, tolerating an already removed lock
fn remove_lock_dir(lock_dir: &Path) -> Result<()> {
    match fs::remove_file(lock_dir.join(SENTINEL_FILE)) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    match fs::remove_dir(lock_dir) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

fn unix_millis() -> u64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("HOST"))
        .unwrap_or_else(|_| "unknown".into())
}

/// Check whether a PID is alive on the local system.
///
/// `/proc` existence is used as a safe alternative to `kill(pid, 0)`;
/// on platforms without procfs the holder is assumed alive and the age
/// threshold handles reclaim.
fn is_pid_alive(pid: u32) -> bool {
    let proc_path = format!("/proc/{}", pid);
    if Path::new("/proc").exists() {
        Path::new(&proc_path).exists()
    } else {
        true
    }
}
