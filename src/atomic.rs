//! Atomic file replacement
//!
//! Readers of the backing file must never observe a torn write. New content
//! is written to a temporary file in the target's own directory (same
//! filesystem), synced to disk, and swung into place with a single
//! `rename`, so a concurrent reader sees either the old file or the new
//! one in full. The sync before the rename matters for crash tolerance:
//! without it a power loss can persist the rename while the new file's
//! data blocks are still unwritten.
//!
//! Transient failures are retried a bounded number of times with a short
//! backoff; exhausting the retries surfaces the last error and the caller
//! must not assume partial success.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::Result;

/// Bounded retry discipline shared by atomic replace and backup copies
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Max attempts before giving up
    pub max_retries: u32,
    /// Pause between attempts
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: config.retry_backoff,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(100),
        }
    }
}

/// Atomically replace `path` with content yielded by `producer`
///
/// The producer is invoked once per attempt and yields the full intended
/// content. Each attempt writes a temp file next to the target, syncs it,
/// and renames it over the target. The temp file is removed on every
/// failure path.
pub fn atomic_replace<F>(path: &Path, mut producer: F, policy: &RetryPolicy) -> Result<()>
where
    F: FnMut() -> Result<String>,
{
    let attempts = policy.max_retries.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match replace_once(path, &mut producer) {
            Ok(()) => {
                debug!(path = %path.display(), attempt, "atomic replace committed");
                return Ok(());
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    attempt,
                    max = attempts,
                    "atomic replace attempt failed: {}",
                    e
                );
                if attempt >= attempts {
                    return Err(e);
                }
                std::thread::sleep(policy.backoff);
            }
        }
    }
}

/// One write-sync-rename attempt
fn replace_once<F>(path: &Path, producer: &mut F) -> Result<()>
where
    F: FnMut() -> Result<String>,
{
    let content = producer()?;
    let tmp = temp_path(path);

    if let Err(e) = write_durable(&tmp, content.as_bytes()) {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }

    match fs::rename(&tmp, path) {
        Ok(()) => Ok(()),
        Err(e) => {
            // Never leave the temp file behind
            let _ = fs::remove_file(&tmp);
            Err(e.into())
        }
    }
}

/// Write and fsync so the data is on disk before the rename commits it
fn write_durable(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Copy `src` to `dst` with the shared retry discipline
pub fn copy_with_retry(src: &Path, dst: &Path, policy: &RetryPolicy) -> Result<u64> {
    let attempts = policy.max_retries.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match fs::copy(src, dst) {
            Ok(bytes) => return Ok(bytes),
            Err(e) => {
                warn!(
                    src = %src.display(),
                    dst = %dst.display(),
                    attempt,
                    max = attempts,
                    "copy attempt failed: {}",
                    e
                );
                if attempt >= attempts {
                    return Err(e.into());
                }
                std::thread::sleep(policy.backoff);
            }
        }
    }
}

/// Temp file beside the target; pid-suffixed so concurrent processes
/// never collide on it
fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "table".to_string());
    path.with_file_name(format!(".{}.{}.tmp", name, std::process::id()))
}
