// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Advisory mutex backed by an `O_EXCL` lockfile with PID + timestamp,
//! stale detection, and retry-with-backoff (C3).
//!
//! Two locks exist in this system: the queue lock (`queue.json.lock`)
//! and the runner lock (`runner.lock`). Both use this same primitive.

use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;
use tracing::warn;

const STALE_AFTER: Duration = Duration::from_secs(30);
const DEFAULT_RETRIES: u32 = 10;
const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum LockError {
    #[error("lock busy: {0}")]
    Busy(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Content written into a lockfile: enough to detect staleness and to
/// report who is currently holding it.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LockContents {
    pid: u32,
    #[serde(default)]
    started_at_ms: Option<u64>,
}

thread_local! {
    /// Re-entrancy guard: a process must not deadlock against a lock
    /// path it already holds on this thread. Maps the canonicalized
    /// path string to the current hold depth.
    static HELD: RefCell<HashMap<PathBuf, u32>> = RefCell::new(HashMap::new());
}

fn held_depth(path: &Path) -> u32 {
    HELD.with(|h| h.borrow().get(path).copied().unwrap_or(0))
}

fn enter(path: &Path) -> u32 {
    HELD.with(|h| {
        let mut h = h.borrow_mut();
        let depth = h.entry(path.to_path_buf()).or_insert(0);
        *depth += 1;
        *depth
    })
}

fn exit(path: &Path) -> u32 {
    HELD.with(|h| {
        let mut h = h.borrow_mut();
        if let Some(depth) = h.get_mut(path) {
            *depth -= 1;
            let remaining = *depth;
            if remaining == 0 {
                h.remove(path);
            }
            remaining
        } else {
            0
        }
    })
}

/// A held advisory lock. Releases (deletes the lockfile) on drop, once
/// the re-entrant hold depth for this path reaches zero.
pub struct FileLock {
    path: PathBuf,
    released: bool,
}

impl FileLock {
    /// Attempt to acquire the lock once: if this thread already holds
    /// it, succeed re-entrantly. Otherwise create it exclusively, or,
    /// if it already exists and is stale (older than 30s), delete and
    /// retry once. Does not retry on contention from another holder —
    /// see [`FileLock::acquire_with_retry`].
    pub fn try_acquire(path: &Path) -> Result<Self, LockError> {
        if held_depth(path) > 0 {
            enter(path);
            return Ok(FileLock {
                path: path.to_path_buf(),
                released: false,
            });
        }

        match Self::create_exclusive(path) {
            Ok(()) => {
                enter(path);
                Ok(FileLock {
                    path: path.to_path_buf(),
                    released: false,
                })
            }
            Err(LockError::Busy(_)) => {
                if Self::is_stale(path) {
                    warn!(path = %path.display(), "removing stale lockfile");
                    let _ = fs::remove_file(path);
                    Self::create_exclusive(path)?;
                    enter(path);
                    Ok(FileLock {
                        path: path.to_path_buf(),
                        released: false,
                    })
                } else {
                    Err(LockError::Busy(path.display().to_string()))
                }
            }
            Err(e) => Err(e),
        }
    }

    /// Acquire with up to `retries` attempts at `interval` spacing,
    /// failing with [`LockError::Busy`] on exhaustion. The default
    /// policy (10 retries, 100ms) matches the design's `withLock`.
    pub fn acquire_with_retry(
        path: &Path,
        retries: u32,
        interval: Duration,
    ) -> Result<Self, LockError> {
        let mut last_err = None;
        for attempt in 0..=retries {
            match Self::try_acquire(path) {
                Ok(lock) => return Ok(lock),
                Err(e) => {
                    last_err = Some(e);
                    if attempt < retries {
                        thread::sleep(interval);
                    }
                }
            }
        }
        Err(last_err.unwrap_or(LockError::Busy(path.display().to_string())))
    }

    /// Run `f` while holding the lock, using the default retry budget.
    pub fn with_lock<T>(path: &Path, f: impl FnOnce() -> T) -> Result<T, LockError> {
        let _lock = Self::acquire_with_retry(path, DEFAULT_RETRIES, DEFAULT_RETRY_INTERVAL)?;
        Ok(f())
    }

    fn create_exclusive(path: &Path) -> Result<(), LockError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                return Err(LockError::Busy(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let contents = LockContents {
            pid: std::process::id(),
            started_at_ms: Some(now_ms()),
        };
        let body = serde_json::to_string(&contents).unwrap_or_else(|_| "{}".to_string());
        file.write_all(body.as_bytes())?;
        Ok(())
    }

    fn is_stale(path: &Path) -> bool {
        match fs::metadata(path) {
            Ok(meta) => match meta.modified() {
                Ok(mtime) => mtime.elapsed().unwrap_or(Duration::ZERO) > STALE_AFTER,
                Err(_) => false,
            },
            Err(_) => true,
        }
    }

    /// Read the PID recorded in a lockfile, if any, without acquiring it.
    pub fn read_holder_pid(path: &Path) -> Option<u32> {
        let body = fs::read_to_string(path).ok()?;
        serde_json::from_str::<LockContents>(&body).ok().map(|c| c.pid)
    }

    pub fn release(mut self) {
        self.do_release();
    }

    fn do_release(&mut self) {
        if !self.released {
            self.released = true;
            if exit(&self.path) == 0 {
                let _ = fs::remove_file(&self.path);
            }
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        self.do_release();
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "file_lock_tests.rs"]
mod tests;
