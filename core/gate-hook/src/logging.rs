//! File logging for the hook process.
//!
//! stdout carries the hook protocol, so diagnostics only ever go to
//! `{state_root}/{prefix}-gate-hook.log`. `GATE_DEBUG_LOG=1` forces debug
//! output; otherwise `RUST_LOG` applies, defaulting to `info`.

use std::env;

use gate_core::storage::StorageConfig;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{Builder, Rotation};
use tracing_subscriber::EnvFilter;

const DEBUG_ENV: &str = "GATE_DEBUG_LOG";

/// Installs the global subscriber. Returns `None` (and logs nothing) when the
/// log file cannot be opened; the hook still answers.
pub fn init(storage: &StorageConfig) -> Option<WorkerGuard> {
    let path = storage.log_file();
    let dir = path.parent()?;
    let name = path.file_name()?.to_str()?;

    let appender = Builder::new()
        .rotation(Rotation::NEVER)
        .filename_prefix(name)
        .build(dir)
        .ok()?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::fmt()
        .with_env_filter(filter())
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .ok()?;
    Some(guard)
}

fn filter() -> EnvFilter {
    let debug_enabled = env::var(DEBUG_ENV)
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    }
}
