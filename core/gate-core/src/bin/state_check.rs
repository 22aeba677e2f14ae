//! Debug utility for inspecting workflow state, locks, and archives on this machine.

use gate_core::clock::{Clock, SystemClock};
use gate_core::state::heartbeat::{self, format_age};
use gate_core::state::lock::{artifact_age, is_pid_alive, LockMeta};
use gate_core::state::schema::validate_header;
use gate_core::state::{PathResolver, StateKind, Validated};
use gate_core::storage::{GateSettings, StorageConfig};

fn main() {
    let storage = StorageConfig::default();
    let settings = GateSettings::default();
    let now = SystemClock.now_ms();
    let resolver = PathResolver::new(storage.clone());

    println!("═══════════════════════════════════════════════════════════");
    println!("  Gate State Check");
    println!("═══════════════════════════════════════════════════════════");
    println!();
    println!("State root:    {}", storage.state_root().display());
    println!("Prefix:        {}", storage.prefix());
    println!("Recovery dir:  {}", storage.recovery_dir().display());
    println!();

    for kind in StateKind::ALL {
        println!("── {} ─────────────────────────────────────────", kind);
        let files = resolver.list_for_kind(kind);
        if files.is_empty() {
            println!("  (none)");
        }
        for path in files {
            let raw = std::fs::read_to_string(&path).ok();
            let label = match validate_header(raw.as_deref()) {
                Validated::Absent => "vanished".to_string(),
                Validated::Corrupt { reason } => format!("✗ CORRUPT ({})", reason),
                Validated::Valid(header) => {
                    let report = heartbeat::assess(&header, now, &settings);
                    let state = match (header.active, report.expired) {
                        (false, _) => "inactive",
                        (true, true) => "expired",
                        (true, false) if report.stale => "stale",
                        (true, false) => "✓ active",
                    };
                    format!("{} │ idle {}", state, format_age(report.elapsed_ms))
                }
            };
            println!("  {} │ {}", label, path.display());
        }
        let legacy = resolver.legacy_path(kind);
        if legacy.exists() {
            println!("  legacy │ {}", legacy.display());
        }
        println!();
    }

    println!("── Lock Artifacts ────────────────────────────────────────");
    let locks = resolver.list_lock_artifacts();
    if locks.is_empty() {
        println!("  (no lock files found)");
    }
    for path in locks {
        let meta = std::fs::read_to_string(&path)
            .ok()
            .and_then(|c| serde_json::from_str::<LockMeta>(&c).ok());
        let age = artifact_age(&path)
            .map(|d| format_age(d.as_millis() as i64))
            .unwrap_or_else(|| "?".to_string());
        match meta {
            Some(meta) => {
                let status = if is_pid_alive(meta.pid) {
                    "✓ ALIVE"
                } else {
                    "✗ DEAD"
                };
                println!("  {} PID {} │ age {} │ {}", status, meta.pid, age, path.display());
            }
            None => println!("  ? unreadable │ age {} │ {}", age, path.display()),
        }
    }
    println!();

    println!("── Temp Files ────────────────────────────────────────────");
    let temps = resolver.list_temp_files();
    if temps.is_empty() {
        println!("  (none)");
    }
    for path in temps {
        println!("  {}", path.display());
    }
    println!();

    println!("── Recovery Archives ─────────────────────────────────────");
    match std::fs::read_dir(storage.recovery_dir()) {
        Ok(entries) => {
            let mut found = false;
            for entry in entries.flatten() {
                let path = entry.path();
                if path.extension().is_some_and(|e| e == "json") {
                    found = true;
                    println!("  {}", path.display());
                }
            }
            if !found {
                println!("  (none)");
            }
        }
        Err(_) => println!("  (recovery directory doesn't exist)"),
    }
    println!();

    println!("═══════════════════════════════════════════════════════════");
    println!("  Check complete");
    println!("═══════════════════════════════════════════════════════════");
}
