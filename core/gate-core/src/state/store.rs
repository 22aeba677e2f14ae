//! Lock-guarded, atomically written state files.
//!
//! Every mutation takes the lock artifact next to the state file, writes the new
//! content to a temp file in the same directory, and renames it over the target.
//! A reader therefore sees either the old or the new document, never a torn one.
//!
//! # Two Surfaces
//!
//! - `try_*` methods return [`GateError`] so callers can tell contention
//!   ([`GateError::LockTimeout`]) from plain I/O trouble.
//! - [`LockedStore::read_state`] / [`LockedStore::write_state`] swallow every
//!   failure into `None` / `false` after logging it.
//!
//! Missing directories and files are absence, not errors, on both surfaces.

use std::io::{ErrorKind, Write};
use std::path::Path;

use fs_err as fs;
use tempfile::Builder;

use super::lock::FileLock;
use super::paths::temp_file_prefix;
use crate::error::{GateError, Result};
use crate::storage::{GateSettings, DEFAULT_PREFIX};

/// What a read-modify-write closure wants done with the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Keep,
    Write(String),
    Delete,
}

#[derive(Debug, Clone)]
pub struct LockedStore {
    settings: GateSettings,
    namespace: String,
}

impl LockedStore {
    pub fn new(settings: GateSettings) -> Self {
        Self {
            settings,
            namespace: DEFAULT_PREFIX.to_string(),
        }
    }

    /// Names temp files after `namespace` so sweeps can find orphans.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    pub fn settings(&self) -> &GateSettings {
        &self.settings
    }

    pub fn try_write_state_with_lock(&self, path: &Path, content: &str) -> Result<()> {
        let _lock = FileLock::acquire(path, &self.settings)?;
        self.write_atomic(path, content)
    }

    /// Reads under the same exclusive lock writers use.
    pub fn try_read_state_with_lock(&self, path: &Path) -> Result<Option<String>> {
        // No file yet: equivalent to reading before any writer started.
        if !path.exists() {
            return Ok(None);
        }
        let _lock = FileLock::acquire(path, &self.settings)?;
        read_optional(path)
    }

    /// Holds one lock across read, `f`, and the resulting write or delete.
    pub fn modify_state_with_lock<T>(
        &self,
        path: &Path,
        f: impl FnOnce(Option<String>) -> (Mutation, T),
    ) -> Result<T> {
        let _lock = FileLock::acquire(path, &self.settings)?;
        let current = read_optional(path)?;
        let (mutation, output) = f(current);
        match mutation {
            Mutation::Keep => {}
            Mutation::Write(content) => self.write_atomic(path, &content)?,
            Mutation::Delete => {
                remove_optional(path)?;
            }
        }
        Ok(output)
    }

    /// Returns whether a file was actually removed.
    pub fn try_delete_state_with_lock(&self, path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        let _lock = FileLock::acquire(path, &self.settings)?;
        remove_optional(path)
    }

    /// Lockless snapshot read. Safe because writers only ever rename whole files.
    pub fn read_unlocked(&self, path: &Path) -> Result<Option<String>> {
        read_optional(path)
    }

    pub fn read_state(&self, path: &Path) -> Option<String> {
        match self.try_read_state_with_lock(path) {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "State read failed");
                None
            }
        }
    }

    pub fn write_state(&self, path: &Path, content: &str) -> bool {
        match self.try_write_state_with_lock(path, content) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "State write failed");
                false
            }
        }
    }

    fn write_atomic(&self, path: &Path, content: &str) -> Result<()> {
        let parent = path
            .parent()
            .ok_or_else(|| GateError::NoParentDir(path.to_path_buf()))?;
        fs::create_dir_all(parent).map_err(|e| GateError::io("creating state directory", e))?;

        let mut temp_file = Builder::new()
            .prefix(&temp_file_prefix(&self.namespace))
            .tempfile_in(parent)
            .map_err(|e| GateError::io("creating temp state file", e))?;
        temp_file
            .write_all(content.as_bytes())
            .map_err(|e| GateError::io("writing temp state file", e))?;
        temp_file
            .flush()
            .map_err(|e| GateError::io("flushing temp state file", e))?;
        temp_file
            .as_file()
            .sync_all()
            .map_err(|e| GateError::io("syncing temp state file", e))?;
        temp_file
            .persist(path)
            .map_err(|e| GateError::io("renaming state file into place", e.error))?;
        Ok(())
    }
}

/// File modification time as epoch milliseconds.
pub(crate) fn modified_ms(path: &Path) -> Option<i64> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    let since_epoch = modified.duration_since(std::time::UNIX_EPOCH).ok()?;
    Some(since_epoch.as_millis() as i64)
}

/// Wall-clock time since the file was last modified.
pub(crate) fn file_age(path: &Path) -> Option<std::time::Duration> {
    let modified = fs::metadata(path).ok()?.modified().ok()?;
    std::time::SystemTime::now().duration_since(modified).ok()
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
        Err(err) => Err(GateError::io("reading state file", err)),
    }
}

fn remove_optional(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(GateError::io("removing state file", err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::lock::tests_helper::{now, plant_lock};
    use std::time::Duration;
    use tempfile::tempdir;

    fn store() -> LockedStore {
        LockedStore::new(GateSettings {
            lock_timeout: Duration::from_millis(150),
            lock_backoff_initial: Duration::from_millis(2),
            ..GateSettings::default()
        })
    }

    #[test]
    fn round_trip_is_byte_exact() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("claude-test-run-s1.json");
        let content = "{\n  \"active\" : true,\t\"note\": \"ünïcode\" }\n";

        store().try_write_state_with_lock(&path, content).unwrap();
        let back = store().try_read_state_with_lock(&path).unwrap();
        assert_eq!(back.as_deref(), Some(content));
    }

    #[test]
    fn missing_file_reads_as_none() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nope.json");
        assert_eq!(store().try_read_state_with_lock(&path).unwrap(), None);
        assert_eq!(store().read_state(&path), None);
    }

    #[test]
    fn missing_directory_reads_as_none() {
        let path = Path::new("/definitely/not/here/state.json");
        assert_eq!(store().read_state(path), None);
    }

    #[test]
    fn write_creates_missing_directory() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("a/b/state.json");
        assert!(store().write_state(&path, "{}"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}");
    }

    #[test]
    fn write_leaves_no_temp_or_lock_behind() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("claude-delegation-s1.json");
        store().write_state(&path, "{}");

        let names: Vec<_> = fs::read_dir(temp.path())
            .unwrap()
            .flatten()
            .map(|e| e.file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["claude-delegation-s1.json".to_string()]);
    }

    #[test]
    fn contended_write_fails_with_timeout_and_keeps_content() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("claude-delegation-s1.json");
        store().write_state(&path, "old");
        plant_lock(&path, std::process::id(), now());

        let err = store().try_write_state_with_lock(&path, "new").unwrap_err();
        assert!(err.is_lock_timeout());
        assert!(!store().write_state(&path, "new"));
        assert_eq!(store().read_unlocked(&path).unwrap().as_deref(), Some("old"));
    }

    #[test]
    fn contended_read_swallows_to_none() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("claude-delegation-s1.json");
        store().write_state(&path, "content");
        plant_lock(&path, std::process::id(), now());

        assert!(store().try_read_state_with_lock(&path).unwrap_err().is_lock_timeout());
        assert_eq!(store().read_state(&path), None);
    }

    #[test]
    fn modify_sees_current_and_applies_mutation() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("state.json");
        store().write_state(&path, "1");

        let seen = store()
            .modify_state_with_lock(&path, |current| {
                let n: u32 = current.as_deref().unwrap_or("0").parse().unwrap();
                (Mutation::Write((n + 1).to_string()), n)
            })
            .unwrap();
        assert_eq!(seen, 1);
        assert_eq!(store().read_state(&path).as_deref(), Some("2"));

        store()
            .modify_state_with_lock(&path, |_| (Mutation::Delete, ()))
            .unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn delete_reports_whether_anything_was_removed() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("state.json");
        assert!(!store().try_delete_state_with_lock(&path).unwrap());
        store().write_state(&path, "{}");
        assert!(store().try_delete_state_with_lock(&path).unwrap());
    }
}
