//! Cross-process lock artifacts for state files.
//!
//! Hook invocations are separate processes that share nothing but the
//! filesystem, so mutual exclusion is an exclusive-create file next to the
//! state file. Whoever creates `{base}.lock` owns the critical section until
//! the [`FileLock`] guard drops and removes it.
//!
//! # Lock File Structure
//!
//! ```text
//! claude-delegation-<session>.lock   # {"pid": 4242, "created": 1700000000000, "nonce": 991...}
//! ```
//!
//! # Abandoned Locks
//!
//! A hook killed mid-critical-section leaves its artifact behind. A contender
//! breaks such a lock when either:
//!
//! 1. The recorded PID is no longer alive, or
//! 2. The artifact is older than `stale_lock_age` (covers PID reuse and
//!    unreadable metadata, where file mtime stands in for `created`).
//!
//! # Bounded Waiting
//!
//! Acquisition retries with doubling, jittered backoff and gives up with
//! [`GateError::LockTimeout`] once `lock_timeout` has elapsed. It never blocks
//! indefinitely and never writes without holding the artifact.
//!
//! Locks are not reentrant: acquiring the same path twice from one process
//! waits on itself until the stale age or the timeout.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use fs_err as fs;
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::paths::lock_path_for;
use crate::error::{GateError, Result};
use crate::storage::GateSettings;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockMeta {
    pub pid: u32,
    /// Creation time, epoch milliseconds.
    pub created: u64,
    /// Distinguishes this holder from a later one with the same PID.
    pub nonce: u64,
}

/// RAII guard for a held lock artifact.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    meta: LockMeta,
}

impl FileLock {
    /// Acquires the lock paired with `state_path`, waiting at most
    /// `settings.lock_timeout`.
    pub fn acquire(state_path: &Path, settings: &GateSettings) -> Result<FileLock> {
        let lock_path = lock_path_for(state_path);
        let started = Instant::now();
        let mut backoff = settings.lock_backoff_initial;
        let mut rng = rand::thread_rng();

        loop {
            let meta = LockMeta {
                pid: std::process::id(),
                created: now_ms(),
                nonce: rng.gen(),
            };

            match try_create(&lock_path, &meta) {
                Ok(()) => {
                    return Ok(FileLock {
                        path: lock_path,
                        meta,
                    })
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    if break_if_abandoned(&lock_path, settings.stale_lock_age) {
                        continue;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => {
                    let parent = lock_path
                        .parent()
                        .ok_or_else(|| GateError::NoParentDir(lock_path.clone()))?;
                    fs::create_dir_all(parent)
                        .map_err(|e| GateError::io("creating state directory", e))?;
                    continue;
                }
                Err(err) => return Err(GateError::io("creating lock artifact", err)),
            }

            let waited = started.elapsed();
            if waited >= settings.lock_timeout {
                tracing::debug!(
                    path = %lock_path.display(),
                    waited_ms = waited.as_millis() as u64,
                    "Lock acquisition timed out"
                );
                return Err(GateError::LockTimeout {
                    path: lock_path,
                    waited_ms: waited.as_millis() as u64,
                });
            }

            let remaining = settings.lock_timeout - waited;
            let jitter = Duration::from_millis(rng.gen_range(0..=backoff.as_millis() as u64 / 2));
            thread::sleep((backoff + jitter).min(remaining));
            backoff = (backoff * 2).min(settings.lock_backoff_max);
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn meta(&self) -> &LockMeta {
        &self.meta
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // Only remove the artifact if it is still ours; a slow holder may have
        // been broken as abandoned and replaced by someone else.
        match read_meta(&self.path) {
            Some(current) if current == self.meta => {
                if let Err(err) = fs::remove_file(&self.path) {
                    if err.kind() != ErrorKind::NotFound {
                        tracing::warn!(path = %self.path.display(), error = %err, "Failed to release lock");
                    }
                }
            }
            Some(_) => {
                tracing::warn!(path = %self.path.display(), "Lock was taken over before release");
            }
            None => {}
        }
    }
}

fn try_create(lock_path: &Path, meta: &LockMeta) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(lock_path)?;
    publish_meta(&mut file, lock_path, meta)
}

/// Writes holder metadata into a freshly created artifact. On failure the
/// artifact is removed again: without metadata its release could not be
/// matched, and contenders would wait out the full stale age.
fn publish_meta(out: &mut impl Write, lock_path: &Path, meta: &LockMeta) -> std::io::Result<()> {
    let written = serde_json::to_vec(meta)
        .map_err(std::io::Error::other)
        .and_then(|payload| out.write_all(&payload));
    if let Err(err) = written {
        tracing::debug!(path = %lock_path.display(), error = %err, "Failed to write lock metadata");
        if let Err(rm) = fs::remove_file(lock_path) {
            tracing::warn!(path = %lock_path.display(), error = %rm, "Failed to discard lock artifact");
        }
        return Err(err);
    }
    Ok(())
}

fn read_meta(lock_path: &Path) -> Option<LockMeta> {
    let content = fs::read_to_string(lock_path).ok()?;
    serde_json::from_str(&content).ok()
}

/// Removes the artifact if its holder is gone. Returns true if the caller
/// should retry immediately.
pub(crate) fn break_if_abandoned(lock_path: &Path, stale_age: Duration) -> bool {
    let meta = read_meta(lock_path);

    let abandoned = match &meta {
        Some(meta) if meta.pid != std::process::id() && !is_pid_alive(meta.pid) => true,
        Some(meta) => now_ms().saturating_sub(meta.created) > stale_age.as_millis() as u64,
        None => match artifact_age(lock_path) {
            Some(age) => age > stale_age,
            // Vanished between our create attempt and now: just retry.
            None => return !lock_path.exists(),
        },
    };

    if !abandoned {
        return false;
    }

    // Re-check right before removal to narrow the window where a fresh
    // holder replaced the abandoned artifact.
    if read_meta(lock_path) != meta {
        return false;
    }

    match fs::remove_file(lock_path) {
        Ok(()) => {
            tracing::info!(
                path = %lock_path.display(),
                holder = ?meta.as_ref().map(|m| m.pid),
                "Broke abandoned lock"
            );
            true
        }
        Err(err) if err.kind() == ErrorKind::NotFound => true,
        Err(err) => {
            tracing::warn!(path = %lock_path.display(), error = %err, "Failed to break abandoned lock");
            false
        }
    }
}

/// Age of a lock artifact judged by its metadata or, failing that, its mtime.
pub fn artifact_age(lock_path: &Path) -> Option<Duration> {
    if let Some(meta) = read_meta(lock_path) {
        return Some(Duration::from_millis(now_ms().saturating_sub(meta.created)));
    }
    let modified = fs::metadata(lock_path).ok()?.modified().ok()?;
    SystemTime::now().duration_since(modified).ok()
}

pub fn is_pid_alive(pid: u32) -> bool {
    #[cfg(unix)]
    {
        // SAFETY: kill(pid, 0) performs permission and existence checks only.
        #[allow(unsafe_code)]
        let rc = unsafe { libc::kill(pid as i32, 0) };
        rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
    }
    #[cfg(not(unix))]
    {
        let _ = pid;
        true
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
pub(crate) mod tests_helper {
    use super::*;

    /// Plants a lock artifact as if another process held it.
    pub fn plant_lock(state_path: &Path, pid: u32, created: u64) {
        let meta = LockMeta {
            pid,
            created,
            nonce: 7,
        };
        fs::write(
            lock_path_for(state_path),
            serde_json::to_vec(&meta).unwrap(),
        )
        .unwrap();
    }

    pub fn now() -> u64 {
        now_ms()
    }
}
