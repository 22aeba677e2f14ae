//! Deterministic (kind, session) → path mapping.
//!
//! Every state file lives at `{state_root}/{prefix}-{kind}-{session}.json` and is
//! paired with a lock artifact at `{prefix}-{kind}-{session}.lock`.
//!
//! # Session Sanitization
//!
//! Session ids come from the host and may contain anything. A sanitized id keeps
//! only `[A-Za-z0-9_-]`. When sanitizing changed the id (or it was empty or too
//! long), an 8-hex MD5 suffix of the raw id is appended after a `.`. Because `.`
//! never survives sanitization, hashed and unhashed names cannot collide, and
//! two raw ids that sanitize to the same text still differ in their suffix.
//!
//! # Legacy Files
//!
//! Older hooks wrote one unscoped file per kind (`{prefix}-{kind}.json`).
//! [`PathResolver::resolve_with_migration`] copies that content into the
//! session-scoped location the first time a session asks for it.

use std::path::{Path, PathBuf};

use fs_err as fs;

use super::kinds::StateKind;
use super::store::{LockedStore, Mutation};
use crate::storage::StorageConfig;

const MAX_SESSION_LEN: usize = 64;
const HASH_SUFFIX_LEN: usize = 8;

/// Prefix for temp files created during atomic writes, so sweeps can spot orphans.
pub(crate) const TEMP_MARKER: &str = "tmp-";

/// Makes a session id safe for use in a file name. Pure and deterministic.
pub fn sanitize_session_id(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if cleaned == raw && !raw.is_empty() && raw.len() <= MAX_SESSION_LEN {
        return cleaned;
    }

    let digest = format!("{:x}", md5::compute(raw.as_bytes()));
    let mut head: String = cleaned
        .chars()
        .take(MAX_SESSION_LEN - HASH_SUFFIX_LEN - 1)
        .collect();
    if head.is_empty() {
        head.push_str("anon");
    }
    format!("{}.{}", head, &digest[..HASH_SUFFIX_LEN])
}

#[derive(Debug, Clone)]
pub struct PathResolver {
    config: StorageConfig,
}

impl PathResolver {
    pub fn new(config: StorageConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StorageConfig {
        &self.config
    }

    fn kind_stem(&self, kind: StateKind) -> String {
        format!("{}-{}", self.config.prefix(), kind.slug())
    }

    /// Session-scoped state path. Pure; does not touch the filesystem.
    pub fn resolve_path(&self, kind: StateKind, session_id: &str) -> PathBuf {
        self.config.state_root().join(format!(
            "{}-{}.json",
            self.kind_stem(kind),
            sanitize_session_id(session_id)
        ))
    }

    /// The pre-session-scoping location for a kind.
    pub fn legacy_path(&self, kind: StateKind) -> PathBuf {
        self.config
            .state_root()
            .join(format!("{}.json", self.kind_stem(kind)))
    }

    /// Like [`resolve_path`](Self::resolve_path), but first moves a legacy
    /// unscoped file into the session-scoped location if only the legacy one
    /// exists. The legacy file is removed under its own lock once the scoped
    /// copy is in place, so adoption happens at most once and a later cancel
    /// cannot be undone by adopting it again.
    pub fn resolve_with_migration(
        &self,
        store: &LockedStore,
        kind: StateKind,
        session_id: &str,
    ) -> PathBuf {
        let scoped = self.resolve_path(kind, session_id);
        if scoped.exists() {
            return scoped;
        }

        let legacy = self.legacy_path(kind);
        if !legacy.exists() {
            return scoped;
        }

        let outcome = store.modify_state_with_lock(&legacy, |content| {
            let Some(content) = content else {
                return (Mutation::Keep, Ok(false));
            };
            let copied = store.modify_state_with_lock(&scoped, |current| match current {
                Some(_) => (Mutation::Keep, false),
                None => (Mutation::Write(content), true),
            });
            match copied {
                Ok(wrote) => (Mutation::Delete, Ok(wrote)),
                Err(err) => (Mutation::Keep, Err(err)),
            }
        });
        match outcome.and_then(|copied| copied) {
            Ok(false) => {}
            Ok(true) => tracing::info!(
                kind = %kind,
                from = %legacy.display(),
                to = %scoped.display(),
                "Migrated legacy state file"
            ),
            Err(err) => tracing::warn!(
                kind = %kind,
                error = %err,
                "Legacy state migration failed"
            ),
        }

        scoped
    }

    /// Every session-scoped state file of `kind`, sorted by path.
    pub fn list_for_kind(&self, kind: StateKind) -> Vec<PathBuf> {
        let scoped_prefix = format!("{}-", self.kind_stem(kind));
        let mut paths = self.list_root(|name| {
            name.starts_with(&scoped_prefix) && name.ends_with(".json")
        });
        paths.sort();
        paths
    }

    /// Lock artifacts belonging to this namespace.
    pub fn list_lock_artifacts(&self) -> Vec<PathBuf> {
        let prefix = format!("{}-", self.config.prefix());
        self.list_root(|name| name.starts_with(&prefix) && name.ends_with(".lock"))
    }

    /// Temp files left behind by writers that died mid-write.
    pub fn list_temp_files(&self) -> Vec<PathBuf> {
        let prefix = temp_file_prefix(self.config.prefix());
        self.list_root(|name| name.starts_with(&prefix))
    }

    fn list_root(&self, keep: impl Fn(&str) -> bool) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(self.config.state_root()) else {
            return Vec::new();
        };

        entries
            .flatten()
            .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
            .filter(|entry| entry.file_name().to_str().is_some_and(&keep))
            .map(|entry| entry.path())
            .collect()
    }
}

/// Temp-file prefix used by the atomic writer for a namespace.
pub(crate) fn temp_file_prefix(namespace: &str) -> String {
    format!(".{}-{}", namespace, TEMP_MARKER)
}

/// The lock artifact paired with a state path.
pub fn lock_path_for(state_path: &Path) -> PathBuf {
    state_path.with_extension("lock")
}
