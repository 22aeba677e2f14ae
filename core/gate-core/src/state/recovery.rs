//! Session-end snapshots of unfinished workflows.
//!
//! When a session ends with an active, mid-workflow record, the record is
//! copied into the recovery directory before the live file is deleted:
//!
//! ```text
//! ~/.claude/recovery/
//! └── delegation-<session>-1700000000000.json
//!     {"kind":"delegation","sessionId":"...","archivedAt":1700000000000,
//!      "archivedAtISO":"2023-11-14T22:13:20+00:00","state":{...}}
//! ```
//!
//! Archives are never resumed automatically. A later session start lists what
//! is still within the recovery TTL, purges the rest, and leaves the choice to
//! the user.

use std::path::{Path, PathBuf};

use fs_err as fs;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::kinds::StateKind;
use super::paths::sanitize_session_id;
use super::store::{modified_ms, LockedStore};
use crate::clock::to_iso;
use crate::error::{GateError, Result};
use crate::state::heartbeat::format_age;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecoveryArchive {
    pub kind: StateKind,
    pub session_id: String,
    pub archived_at: i64,
    #[serde(rename = "archivedAtISO")]
    pub archived_at_iso: String,
    pub state: Value,
}

impl RecoveryArchive {
    pub fn workflow_id(&self) -> Option<&str> {
        self.state.get("workflowId").and_then(Value::as_str)
    }
}

/// An archive on disk together with where it lives.
#[derive(Debug, Clone)]
pub struct ArchiveEntry {
    pub path: PathBuf,
    pub archive: RecoveryArchive,
}

/// What a session start can offer to resume.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumableWorkflow {
    pub kind: StateKind,
    pub session_id: String,
    pub workflow_id: Option<String>,
    pub age_ms: i64,
    pub archive_path: PathBuf,
}

/// Result of listing the recovery directory.
#[derive(Debug, Default)]
pub struct Enumeration {
    pub entries: Vec<ArchiveEntry>,
    pub purged: u32,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct RecoveryStore {
    dir: PathBuf,
    ttl_ms: i64,
    store: LockedStore,
}

impl RecoveryStore {
    pub fn new(dir: PathBuf, ttl_ms: i64, store: LockedStore) -> Self {
        Self { dir, ttl_ms, store }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Writes a snapshot of `state` and returns its path.
    pub fn archive(
        &self,
        kind: StateKind,
        session_id: &str,
        state: Value,
        now_ms: i64,
    ) -> Result<PathBuf> {
        let archive = RecoveryArchive {
            kind,
            session_id: session_id.to_string(),
            archived_at: now_ms,
            archived_at_iso: to_iso(now_ms),
            state,
        };
        let path = self.dir.join(format!(
            "{}-{}-{}.json",
            kind.slug(),
            sanitize_session_id(session_id),
            now_ms
        ));
        let content = serde_json::to_string_pretty(&archive)
            .map_err(|e| GateError::json("serializing recovery archive", e))?;
        self.store.try_write_state_with_lock(&path, &content)?;

        tracing::info!(kind = %kind, path = %path.display(), "Archived unfinished workflow");
        Ok(path)
    }

    /// Lists live archives, deleting any past the recovery TTL.
    ///
    /// An archive that cannot be parsed has no trustworthy `archivedAt`, so its
    /// file mtime decides when it is old enough to purge.
    pub fn enumerate(&self, now_ms: i64) -> Enumeration {
        let mut result = Enumeration::default();

        for path in self.list_files() {
            let archive = fs::read_to_string(&path)
                .ok()
                .and_then(|raw| serde_json::from_str::<RecoveryArchive>(&raw).ok());

            let archived_at = match &archive {
                Some(archive) => Some(archive.archived_at),
                None => modified_ms(&path),
            };
            let expired = archived_at.is_some_and(|at| now_ms - at >= self.ttl_ms);

            if expired {
                match remove_file(&path) {
                    Ok(_) => result.purged += 1,
                    Err(err) => result.errors.push(err.to_string()),
                }
                continue;
            }

            match archive {
                Some(archive) => result.entries.push(ArchiveEntry { path, archive }),
                None => tracing::warn!(path = %path.display(), "Skipping unreadable recovery archive"),
            }
        }

        if result.purged > 0 {
            tracing::info!(purged = result.purged, "Purged expired recovery archives");
        }
        result.entries.sort_by_key(|e| e.archive.archived_at);
        result
    }

    /// Workflows a session start may offer to resume, oldest first.
    pub fn resumable(&self, now_ms: i64) -> Vec<ResumableWorkflow> {
        self.enumerate(now_ms)
            .entries
            .into_iter()
            .map(|entry| ResumableWorkflow {
                kind: entry.archive.kind,
                workflow_id: entry.archive.workflow_id().map(str::to_string),
                session_id: entry.archive.session_id,
                age_ms: now_ms - entry.archive.archived_at,
                archive_path: entry.path,
            })
            .collect()
    }

    pub fn load(&self, path: &Path) -> Option<RecoveryArchive> {
        let raw = self.store.read_unlocked(path).ok()??;
        serde_json::from_str(&raw).ok()
    }

    pub fn remove(&self, path: &Path) -> Result<bool> {
        remove_file(path)
    }

    fn list_files(&self) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(&self.dir) else {
            return Vec::new();
        };
        entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.extension().is_some_and(|ext| ext == "json")
                    && path
                        .file_name()
                        .and_then(|n| n.to_str())
                        .is_some_and(|n| !n.starts_with('.'))
            })
            .collect()
    }
}

fn remove_file(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(GateError::io("removing recovery archive", err)),
    }
}

/// Multi-line notice for the host, or `None` when nothing is resumable.
pub fn format_summary(workflows: &[ResumableWorkflow]) -> Option<String> {
    if workflows.is_empty() {
        return None;
    }
    let mut lines = vec![format!(
        "Found {} unfinished workflow(s) from earlier sessions:",
        workflows.len()
    )];
    for wf in workflows {
        lines.push(format!(
            "  - {} {} (archived {} ago): {}",
            wf.kind,
            wf.workflow_id.as_deref().unwrap_or("<no id>"),
            format_age(wf.age_ms),
            wf.archive_path.display()
        ));
    }
    lines.push("Nothing was resumed. Run `gate-hook recovery restore <path>` to resume one.".into());
    Some(lines.join("\n"))
}
