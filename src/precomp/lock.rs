use std::fs::{File, OpenOptions};
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use fs2::FileExt;

use crate::foundation::error::{PolicyError, PolicyResult};
use crate::foundation::fs::ensure_parent_dir;

/// Lock file name inside a pass-1 cache directory.
pub const LOCK_FILE: &str = ".lock";

/// Tuning for [`CacheLock::acquire`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockOptions {
    /// Give up waiting for another holder after this long.
    pub wait_timeout: Duration,
    /// Delay between acquisition attempts.
    pub poll_interval: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(30 * 60),
            poll_interval: Duration::from_millis(250),
        }
    }
}

/// Exclusive OS file lock on `<dir>/.lock`, held for the lifetime of the value.
///
/// The lock file itself is left in place; only the lock on it matters. The OS drops the lock
/// when the holding process exits, so a crashed holder never blocks later runs.
#[derive(Debug)]
pub struct CacheLock {
    file: File,
    path: PathBuf,
}

impl CacheLock {
    /// Block until this process holds the lock on `<dir>/.lock`, or `wait_timeout` elapses.
    pub fn acquire(dir: &Path, opts: &LockOptions) -> PolicyResult<Self> {
        let path = dir.join(LOCK_FILE);
        ensure_parent_dir(&path)?;
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| {
                PolicyError::cache(format!("open cache lock '{}': {e}", path.display()))
            })?;

        let started = Instant::now();
        let mut waited = false;
        loop {
            match file.try_lock_exclusive() {
                Ok(()) => break,
                Err(e) if is_contended(&e) => {
                    if started.elapsed() >= opts.wait_timeout {
                        return Err(PolicyError::cache(format!(
                            "timed out after {:?} waiting for cache lock '{}'",
                            opts.wait_timeout,
                            path.display()
                        )));
                    }
                    if !waited {
                        tracing::info!(lock = %path.display(), "cache entry is locked; waiting");
                        waited = true;
                    }
                    std::thread::sleep(opts.poll_interval);
                }
                Err(e) => {
                    return Err(PolicyError::cache(format!(
                        "acquire cache lock '{}': {e}",
                        path.display()
                    )));
                }
            }
        }

        if waited {
            tracing::info!(
                lock = %path.display(),
                waited_ms = started.elapsed().as_millis() as u64,
                "acquired cache lock after waiting"
            );
        }
        let mut lock = Self { file, path };
        lock.record_holder();
        Ok(lock)
    }

    /// Lock file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    // Holder pid is diagnostic only.
    fn record_holder(&mut self) {
        let _ = self.file.set_len(0);
        let _ = writeln!(self.file, "pid={}", std::process::id());
    }
}

impl Drop for CacheLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

fn is_contended(err: &std::io::Error) -> bool {
    let contended = fs2::lock_contended_error();
    err.kind() == contended.kind() || err.raw_os_error() == contended.raw_os_error()
}

#[cfg(test)]
#[path = "../../tests/unit/precomp/lock.rs"]
mod tests;
