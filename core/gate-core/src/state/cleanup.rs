//! Low-frequency purge of orphaned and expired state artifacts.
//!
//! Hook processes exit without ceremony, so nothing guarantees that a state
//! file, lock artifact, or temp file gets removed by whoever created it. The
//! sweep runs on a small fraction of hook invocations and removes:
//!
//! 1. Records past the workflow TTL, and inactive records past the staleness
//!    threshold.
//! 2. Corrupt records whose file mtime is past the TTL (before that they stay,
//!    so a fail-closed gate is not silently lifted).
//! 3. Lock artifacts whose holder died or that outlived the stale-lock age.
//! 4. Temp files from atomic writes that never reached the rename.
//! 5. Legacy unscoped files past the TTL.
//! 6. Recovery archives past the recovery TTL.
//!
//! Each record is re-validated inside its lock before deletion, so a record
//! refreshed by a concurrent hook between listing and deletion survives.

use fs_err as fs;

use super::heartbeat;
use super::kinds::StateKind;
use super::lock::break_if_abandoned;
use super::paths::PathResolver;
use super::recovery::RecoveryStore;
use super::schema::{validate_header, Validated};
use super::store::{file_age, modified_ms, LockedStore, Mutation};

/// Results from a cleanup operation.
#[derive(Debug, Default, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupStats {
    /// Inactive records removed after going stale.
    pub records_removed: u32,
    /// Active records removed because their TTL ran out.
    pub expired_records_removed: u32,
    /// Unparsable records removed once their mtime passed the TTL.
    pub corrupt_removed: u32,
    /// Lock artifacts broken (dead holder or older than the stale age).
    pub locks_removed: u32,
    /// Temp files from interrupted atomic writes.
    pub temp_files_removed: u32,
    /// Unscoped legacy files past the TTL.
    pub legacy_removed: u32,
    /// Recovery archives past the recovery TTL.
    pub archives_purged: u32,
    /// Errors encountered during cleanup.
    pub errors: Vec<String>,
}

impl CleanupStats {
    pub fn total_removed(&self) -> u32 {
        self.records_removed
            + self.expired_records_removed
            + self.corrupt_removed
            + self.locks_removed
            + self.temp_files_removed
            + self.legacy_removed
            + self.archives_purged
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Removal {
    Inactive,
    Expired,
    Corrupt,
}

/// Runs every sweep stage once. Never fails; problems land in `errors`.
pub fn run_sweep(
    resolver: &PathResolver,
    store: &LockedStore,
    recovery: &RecoveryStore,
    now_ms: i64,
) -> CleanupStats {
    let mut stats = CleanupStats::default();
    let settings = store.settings();

    for kind in StateKind::ALL {
        for path in resolver.list_for_kind(kind) {
            let outcome = store.modify_state_with_lock(&path, |current| {
                let removal = match validate_header(current.as_deref()) {
                    Validated::Absent => None,
                    Validated::Valid(header) => {
                        let report = heartbeat::assess(&header, now_ms, settings);
                        if report.expired {
                            Some(Removal::Expired)
                        } else if !header.active && report.stale {
                            Some(Removal::Inactive)
                        } else {
                            None
                        }
                    }
                    Validated::Corrupt { .. } => modified_ms(&path)
                        .filter(|&mtime| now_ms - mtime >= settings.workflow_ttl_ms)
                        .map(|_| Removal::Corrupt),
                };
                match removal {
                    Some(removal) => (Mutation::Delete, Some(removal)),
                    None => (Mutation::Keep, None),
                }
            });

            match outcome {
                Ok(Some(Removal::Inactive)) => stats.records_removed += 1,
                Ok(Some(Removal::Expired)) => stats.expired_records_removed += 1,
                Ok(Some(Removal::Corrupt)) => stats.corrupt_removed += 1,
                Ok(None) => {}
                // Someone is working on it right now; it is not orphaned.
                Err(err) if err.is_lock_timeout() => {}
                Err(err) => stats.errors.push(format!("{}: {}", path.display(), err)),
            }
        }

        let legacy = resolver.legacy_path(kind);
        let legacy_expired = modified_ms(&legacy)
            .is_some_and(|mtime| now_ms - mtime >= settings.workflow_ttl_ms);
        if legacy_expired {
            match store.try_delete_state_with_lock(&legacy) {
                Ok(true) => stats.legacy_removed += 1,
                Ok(false) => {}
                Err(err) => stats.errors.push(format!("{}: {}", legacy.display(), err)),
            }
        }
    }

    for lock_path in resolver.list_lock_artifacts() {
        if lock_path.exists() && break_if_abandoned(&lock_path, settings.stale_lock_age) {
            stats.locks_removed += 1;
        }
    }

    for temp_path in resolver.list_temp_files() {
        let orphaned = file_age(&temp_path).is_some_and(|age| age > settings.stale_lock_age);
        if !orphaned {
            continue;
        }
        match fs::remove_file(&temp_path) {
            Ok(()) => stats.temp_files_removed += 1,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => stats.errors.push(err.to_string()),
        }
    }

    let archives = recovery.enumerate(now_ms);
    stats.archives_purged = archives.purged;
    stats.errors.extend(archives.errors);

    tracing::info!(
        removed = stats.total_removed(),
        errors = stats.errors.len(),
        "Cleanup sweep finished"
    );
    stats
}
