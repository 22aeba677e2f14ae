//! Storage configuration and path roots for workflow state.
//!
//! This module provides a centralized `StorageConfig` struct that owns every
//! filesystem root the engine touches, plus `GateSettings` for timing knobs.
//!
//! ## Design Principles
//!
//! - **Single source of truth**: All path decisions centralized here
//! - **Testable**: `StorageConfig::with_root()` isolates each test in a scratch dir
//! - **Overridable**: env vars redirect roots without code changes
//!
//! ## Environment Overrides
//!
//! | Variable               | Effect                                  |
//! |------------------------|-----------------------------------------|
//! | `GATE_STATE_DIR`       | Root for live state files               |
//! | `GATE_STATE_PREFIX`    | File-name namespace (default `claude`)  |
//! | `GATE_RECOVERY_DIR`    | Where session-end snapshots are kept    |
//! | `GATE_LOCK_TIMEOUT_MS` | Upper bound on lock acquisition         |

use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PREFIX: &str = "claude";

const STATE_DIR_ENV: &str = "GATE_STATE_DIR";
const PREFIX_ENV: &str = "GATE_STATE_PREFIX";
const RECOVERY_DIR_ENV: &str = "GATE_RECOVERY_DIR";
const LOCK_TIMEOUT_ENV: &str = "GATE_LOCK_TIMEOUT_MS";

/// Central configuration for all state storage paths.
///
/// Production code uses `StorageConfig::default()`, which points at the OS temp
/// dir for live state and `~/.claude/recovery` for archives.
/// Tests use `StorageConfig::with_root(temp_dir)` for isolation.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding live `{prefix}-{kind}-{session}.json` files.
    state_root: PathBuf,
    /// File-name namespace shared by every kind.
    prefix: String,
    /// Directory holding recovery archives.
    recovery_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let state_root = env::var_os(STATE_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(env::temp_dir);
        let prefix = env::var(PREFIX_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PREFIX.to_string());
        let recovery_dir = env::var_os(RECOVERY_DIR_ENV)
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|h| h.join(".claude").join("recovery")))
            .unwrap_or_else(|| state_root.join("recovery"));

        Self {
            state_root,
            prefix,
            recovery_dir,
        }
    }
}

impl StorageConfig {
    /// Creates a StorageConfig rooted entirely under `root`.
    /// Used for testing with temp directories.
    pub fn with_root(root: PathBuf) -> Self {
        let recovery_dir = root.join("recovery");
        Self {
            state_root: root,
            prefix: DEFAULT_PREFIX.to_string(),
            recovery_dir,
        }
    }

    /// Overrides the file-name namespace.
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Overrides where recovery archives live.
    pub fn with_recovery_dir(mut self, recovery_dir: PathBuf) -> Self {
        self.recovery_dir = recovery_dir;
        self
    }

    pub fn state_root(&self) -> &Path {
        &self.state_root
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn recovery_dir(&self) -> &Path {
        &self.recovery_dir
    }

    /// Path to the hook's debug log.
    pub fn log_file(&self) -> PathBuf {
        self.state_root.join(format!("{}-gate-hook.log", self.prefix))
    }
}

/// Timing configuration for locks, expiry, and sweeping.
#[derive(Debug, Clone)]
pub struct GateSettings {
    /// Hard upper bound on waiting for a lock artifact.
    pub lock_timeout: Duration,
    /// First sleep between lock attempts; doubles up to `lock_backoff_max`.
    pub lock_backoff_initial: Duration,
    pub lock_backoff_max: Duration,
    /// A lock artifact older than this is presumed abandoned by a crashed process.
    pub stale_lock_age: Duration,
    /// Workflow records expire this long after their last activity.
    pub workflow_ttl_ms: i64,
    /// Fraction of the TTL after which an advisory warning is raised.
    pub ttl_warning_ratio: f64,
    /// Advisory "no recent activity" threshold.
    pub staleness_threshold_ms: i64,
    /// Recovery archives are purged this long after they were written.
    pub recovery_ttl_ms: i64,
    /// Chance that a given hook invocation runs the cleanup sweep.
    pub sweep_probability: f64,
}

pub const HOUR_MS: i64 = 60 * 60 * 1000;
pub const MINUTE_MS: i64 = 60 * 1000;

impl Default for GateSettings {
    fn default() -> Self {
        let lock_timeout_ms = env::var(LOCK_TIMEOUT_ENV)
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(2_000);

        Self {
            lock_timeout: Duration::from_millis(lock_timeout_ms),
            lock_backoff_initial: Duration::from_millis(5),
            lock_backoff_max: Duration::from_millis(100),
            stale_lock_age: Duration::from_secs(10),
            workflow_ttl_ms: 12 * HOUR_MS,
            ttl_warning_ratio: 0.8,
            staleness_threshold_ms: 30 * MINUTE_MS,
            recovery_ttl_ms: 24 * HOUR_MS,
            sweep_probability: 0.05,
        }
    }
}

impl GateSettings {
    /// Elapsed activity age at which the TTL warning starts.
    pub fn ttl_warning_ms(&self) -> i64 {
        (self.workflow_ttl_ms as f64 * self.ttl_warning_ratio) as i64
    }
}
