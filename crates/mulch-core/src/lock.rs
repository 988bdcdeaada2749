//! Advisory cross-process locking for domain files.
//!
//! A lock on `path` is a zero-byte sibling marker at `path + ".lock"`, created
//! exclusively. Its presence plus its own modification time is the whole
//! protocol: a marker older than the stale threshold is assumed to belong to a
//! crashed process and is removed before retrying.
//!
//! Use [`with_file_lock`] for read-modify-write cycles; the marker is removed
//! on every exit path, including `?` returns and panics.

use crate::error::{MulchError, Result};
use std::fs::{self, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime};

/// Suffix appended to the target path to form the marker path.
pub const LOCK_SUFFIX: &str = ".lock";

/// Markers older than this are treated as abandoned.
pub const LOCK_STALE_THRESHOLD: Duration = Duration::from_secs(30);

/// Sleep between acquisition attempts.
pub const LOCK_RETRY_INTERVAL: Duration = Duration::from_millis(50);

/// Give up acquiring after this long.
pub const LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Timing knobs for lock acquisition. `Default` uses the named constants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockOptions {
    pub stale_after: Duration,
    pub retry_interval: Duration,
    pub timeout: Duration,
}

impl Default for LockOptions {
    fn default() -> Self {
        Self {
            stale_after: LOCK_STALE_THRESHOLD,
            retry_interval: LOCK_RETRY_INTERVAL,
            timeout: LOCK_TIMEOUT,
        }
    }
}

/// Observed state of a marker, for status reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    Active,
    Stale,
}

impl LockStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LockStatus::Active => "active",
            LockStatus::Stale => "stale",
        }
    }
}

/// Marker path guarding `target`.
pub fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(LOCK_SUFFIX);
    PathBuf::from(name)
}

/// Holds the marker for one target file. Dropping the guard releases it.
#[derive(Debug)]
pub struct FileLockGuard {
    lock_path: PathBuf,
}

impl FileLockGuard {
    /// Acquire the lock for `target` with default timings.
    pub fn acquire(target: &Path) -> Result<Self> {
        Self::acquire_with(target, &LockOptions::default())
    }

    /// Acquire the lock for `target`, polling until created or timed out.
    ///
    /// Stale markers are removed and acquisition retried immediately.
    pub fn acquire_with(target: &Path, options: &LockOptions) -> Result<Self> {
        let lock_path = lock_path_for(target);
        let started = Instant::now();

        loop {
            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
            {
                Ok(_) => {
                    log::debug!("acquired lock {}", lock_path.display());
                    return Ok(Self { lock_path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    if is_stale(&lock_path, options.stale_after) {
                        log::debug!("removing stale lock {}", lock_path.display());
                        match fs::remove_file(&lock_path) {
                            Ok(()) => continue,
                            // Another process cleaned it up first
                            Err(e) if e.kind() == ErrorKind::NotFound => continue,
                            Err(e) => return Err(e.into()),
                        }
                    }
                }
                Err(e) => return Err(e.into()),
            }

            let waited = started.elapsed();
            if waited >= options.timeout {
                return Err(MulchError::LockTimeout {
                    path: target.to_path_buf(),
                    waited,
                });
            }
            thread::sleep(options.retry_interval);
        }
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.lock_path) {
            log::warn!("failed to release lock {}: {}", self.lock_path.display(), e);
        }
    }
}

/// Check whether a marker is older than `stale_after`.
///
/// Reads the marker's own metadata without following symlinks, so a marker
/// that is a link never causes the target of the link to be inspected.
/// Unreadable metadata or a modification time in the future count as fresh.
pub fn is_stale(lock_path: &Path, stale_after: Duration) -> bool {
    let modified = match fs::symlink_metadata(lock_path).and_then(|m| m.modified()) {
        Ok(t) => t,
        Err(_) => return false,
    };
    match SystemTime::now().duration_since(modified) {
        Ok(age) => age > stale_after,
        Err(_) => false,
    }
}

/// Report whether `target` is currently locked, and whether that lock looks
/// abandoned.
pub fn lock_status(target: &Path, stale_after: Duration) -> Option<LockStatus> {
    let lock_path = lock_path_for(target);
    if fs::symlink_metadata(&lock_path).is_err() {
        return None;
    }
    if is_stale(&lock_path, stale_after) {
        Some(LockStatus::Stale)
    } else {
        Some(LockStatus::Active)
    }
}

/// Run `action` while holding the lock on `target`.
///
/// The action never runs if the lock cannot be acquired. The lock is released
/// whether the action succeeds, fails, or panics.
pub fn with_file_lock<T, F>(target: &Path, action: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    with_file_lock_opts(target, &LockOptions::default(), action)
}

/// [`with_file_lock`] with explicit timings.
pub fn with_file_lock_opts<T, F>(target: &Path, options: &LockOptions, action: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let _guard = FileLockGuard::acquire_with(target, options)?;
    action()
}
