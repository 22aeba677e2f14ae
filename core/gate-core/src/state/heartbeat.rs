//! Elapsed-since-activity checks.
//!
//! Two thresholds are measured against the same number, the epoch-ms effective
//! activity from [`RecordHeader::effective_activity`]:
//!
//! - **Stale** (30 min by default): advisory only.
//! - **Expired** (12 h TTL by default): the record is treated as inactive.
//!
//! Neither ever looks at `lastActivityISO`.

use super::kinds::StateKind;
use super::records::RecordHeader;
use crate::storage::GateSettings;

/// Outcome of comparing a record's activity against the thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityReport {
    pub elapsed_ms: i64,
    pub stale: bool,
    pub ttl_warning: bool,
    pub expired: bool,
}

pub fn elapsed_ms(effective_activity: i64, now_ms: i64) -> i64 {
    now_ms.saturating_sub(effective_activity)
}

pub fn is_stale(effective_activity: i64, now_ms: i64, threshold_ms: i64) -> bool {
    elapsed_ms(effective_activity, now_ms) >= threshold_ms
}

pub fn assess(header: &RecordHeader, now_ms: i64, settings: &GateSettings) -> ActivityReport {
    let elapsed = elapsed_ms(header.effective_activity(), now_ms);
    let expired = elapsed >= settings.workflow_ttl_ms;
    ActivityReport {
        elapsed_ms: elapsed,
        stale: elapsed >= settings.staleness_threshold_ms,
        ttl_warning: !expired && elapsed >= settings.ttl_warning_ms(),
        expired,
    }
}

impl ActivityReport {
    /// Human-readable advisories for an active record of `kind`.
    pub fn warnings(&self, kind: StateKind) -> Vec<String> {
        let mut out = Vec::new();
        if self.ttl_warning {
            out.push(format!(
                "{} workflow has been idle for {} and will expire soon; finish or cancel it.",
                kind,
                format_age(self.elapsed_ms)
            ));
        } else if self.stale {
            out.push(format!(
                "{} workflow has had no activity for {}.",
                kind,
                format_age(self.elapsed_ms)
            ));
        }
        out
    }
}

/// Compact `2h 05m` / `12m` / `40s` rendering.
pub fn format_age(ms: i64) -> String {
    let secs = ms.max(0) / 1000;
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}h {:02}m", h, m)
    } else if m > 0 {
        format!("{}m", m)
    } else {
        format!("{}s", s)
    }
}
