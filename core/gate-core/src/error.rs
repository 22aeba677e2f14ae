//! Error types for gate-core operations.
//!
//! These errors stay inside the crate's plumbing layers. The [`GateEngine`]
//! facade resolves every one of them locally (absent record, no-op transition,
//! fallback read) so hook processes never need defensive wrapping.
//!
//! [`GateEngine`]: crate::engine::GateEngine

use std::path::PathBuf;

/// All errors that can occur while touching state files.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    // ─────────────────────────────────────────────────────────────────────
    // Lock Errors
    // ─────────────────────────────────────────────────────────────────────
    /// Another process held the lock artifact for longer than the timeout.
    #[error("Timed out after {waited_ms}ms waiting for lock: {path}")]
    LockTimeout { path: PathBuf, waited_ms: u64 },

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("State path has no parent directory: {0}")]
    NoParentDir(PathBuf),
}

impl GateError {
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        GateError::Io {
            context: context.into(),
            source,
        }
    }

    pub(crate) fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        GateError::Json {
            context: context.into(),
            source,
        }
    }

    /// True for the contention failure, as opposed to plain I/O trouble.
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, GateError::LockTimeout { .. })
    }
}

/// Convenience type alias for Results using GateError.
pub type Result<T> = std::result::Result<T, GateError>;
