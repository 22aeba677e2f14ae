//! GateEngine - The caller-facing facade over state storage and workflows.
//!
//! The engine is designed to be:
//! - **Synchronous**: No async runtime required
//! - **Infallible at the boundary**: Every plumbing fault is resolved here
//!   (absent record, no-op transition, fallback read) and logged, never returned
//! - **Stateless between calls**: Each hook process builds one, uses it, exits
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use gate_core::GateEngine;
//!
//! let engine = GateEngine::new();
//! let verdict = engine.check_file_edit("session-1", "src/main.ts");
//! if let Some(denial) = verdict.decision.denial() {
//!     println!("{}", denial);
//! }
//! ```

use std::path::{Path, PathBuf};

use rand::Rng;
use serde::Serialize;

use crate::clock::{to_iso, Clock, SystemClock};
use crate::state::heartbeat::{self, format_age};
use crate::state::recovery::{format_summary, ResumableWorkflow};
use crate::state::schema::{corruption_policy, validate, CorruptionPolicy, Validated};
use crate::state::store::modified_ms;
use crate::state::{
    run_sweep, CleanupStats, LockedStore, Mutation, PathResolver, PlanApprovalMarker,
    RecordHeader, RecoveryStore, StateKind, StateRecord, TestRunMarker,
};
use crate::storage::{GateSettings, StorageConfig};
use crate::workflow::classifier::{IntentClassifier, PatternClassifier, TransitionIntent};
use crate::workflow::delegation::{self, DelegationEvent, DelegationState, TaskSummary};
use crate::workflow::orchestration::{self, OrchestrationState, Phase, TaskType};
use crate::workflow::policy::{self, Verdict};
use crate::workflow::{GateView, Notice, Transition};

/// Outcome of a requested transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum Applied<T> {
    Persisted { record: T, notice: Option<Notice> },
    Deleted,
    NoOp { reason: String },
}

impl<T> Applied<T> {
    pub fn record(&self) -> Option<&T> {
        match self {
            Applied::Persisted { record, .. } => Some(record),
            _ => None,
        }
    }

    pub fn notice(&self) -> Option<&Notice> {
        match self {
            Applied::Persisted { notice, .. } => notice.as_ref(),
            _ => None,
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self, Applied::NoOp { .. })
    }
}

/// What happened to each kind when a session ended.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionEndReport {
    pub archived: Vec<PathBuf>,
    pub deleted: Vec<StateKind>,
    /// Unreadable files are left for the TTL or a human to clear.
    pub kept_corrupt: Vec<StateKind>,
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStartReport {
    pub resumable: Vec<ResumableWorkflow>,
    pub summary: Option<String>,
    pub sweep: Option<CleanupStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum RestoreOutcome {
    Restored { kind: StateKind, path: PathBuf },
    /// The session already has a live record of that kind.
    Conflict { kind: StateKind },
    Unavailable { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationStatus {
    pub phase: Phase,
    pub task_type: TaskType,
    pub workflow_id: Option<String>,
    pub idle: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationStatus {
    pub workflow_id: Option<String>,
    pub summary: TaskSummary,
    pub progress: String,
    pub ready: Vec<String>,
    pub idle: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusReport {
    pub session_id: String,
    pub orchestration: Option<OrchestrationStatus>,
    pub delegation: Option<DelegationStatus>,
    pub unreadable: Vec<StateKind>,
    pub plan_approved: bool,
    pub last_test_run: Option<TestRunMarker>,
    pub warnings: Vec<String>,
}

/// The main engine for gate operations.
pub struct GateEngine<C: Clock = SystemClock> {
    resolver: PathResolver,
    store: LockedStore,
    recovery: RecoveryStore,
    clock: C,
    classifier: Box<dyn IntentClassifier + Send + Sync>,
}

impl GateEngine<SystemClock> {
    /// Engine over the environment-derived storage locations.
    pub fn new() -> Self {
        Self::with_storage(StorageConfig::default(), GateSettings::default())
    }

    pub fn with_storage(storage: StorageConfig, settings: GateSettings) -> Self {
        Self::with_clock(storage, settings, SystemClock)
    }
}

impl Default for GateEngine<SystemClock> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Clock> GateEngine<C> {
    /// Engine with an injected time source. Used by tests to simulate hours passing.
    pub fn with_clock(storage: StorageConfig, settings: GateSettings, clock: C) -> Self {
        let store = LockedStore::new(settings).with_namespace(storage.prefix());
        let recovery = RecoveryStore::new(
            storage.recovery_dir().to_path_buf(),
            store.settings().recovery_ttl_ms,
            store.clone(),
        );
        Self {
            resolver: PathResolver::new(storage),
            store,
            recovery,
            clock,
            classifier: Box::new(PatternClassifier::default()),
        }
    }

    /// Replaces the free-text classifier used by [`Self::classify_and_apply`].
    pub fn with_classifier(mut self, classifier: Box<dyn IntentClassifier + Send + Sync>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn storage(&self) -> &StorageConfig {
        self.resolver.config()
    }

    pub fn settings(&self) -> &GateSettings {
        self.store.settings()
    }

    pub fn resolver(&self) -> &PathResolver {
        &self.resolver
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Reading State
    // ─────────────────────────────────────────────────────────────────────────────

    /// Locked read, retried once on contention, then a lockless snapshot.
    fn read_raw(&self, path: &Path) -> Option<String> {
        for _ in 0..2 {
            match self.store.try_read_state_with_lock(path) {
                Ok(content) => return content,
                Err(err) if err.is_lock_timeout() => {
                    tracing::debug!(path = %path.display(), "Lock busy, retrying read");
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), error = %err, "State read failed");
                    return None;
                }
            }
        }
        tracing::warn!(path = %path.display(), "Lock still busy, falling back to snapshot read");
        self.store.read_unlocked(path).ok().flatten()
    }

    fn corrupt_past_ttl(&self, path: &Path, now_ms: i64) -> bool {
        modified_ms(path).is_some_and(|mtime| now_ms - mtime >= self.settings().workflow_ttl_ms)
    }

    fn corrupt_view<T: StateRecord>(&self, path: &Path, now_ms: i64) -> GateView<T> {
        match corruption_policy(T::KIND) {
            CorruptionPolicy::FailOpen => GateView::Inactive,
            CorruptionPolicy::FailClosed if self.corrupt_past_ttl(path, now_ms) => {
                tracing::info!(kind = %T::KIND, path = %path.display(), "Corrupt record past TTL, no longer enforced");
                GateView::Inactive
            }
            CorruptionPolicy::FailClosed => GateView::Unreadable {
                path: path.to_path_buf(),
            },
        }
    }

    fn is_live(&self, header: &RecordHeader, now_ms: i64) -> bool {
        header.active && !heartbeat::assess(header, now_ms, self.settings()).expired
    }

    /// Current state of `T` for a session, without touching its activity.
    pub fn load_view<T: StateRecord>(&self, session_id: &str) -> GateView<T> {
        let path = self
            .resolver
            .resolve_with_migration(&self.store, T::KIND, session_id);
        let now = self.now_ms();
        match validate::<T>(self.read_raw(&path).as_deref(), session_id) {
            Validated::Absent => GateView::Inactive,
            Validated::Valid(record) if self.is_live(record.header(), now) => {
                GateView::Active(record)
            }
            Validated::Valid(_) => GateView::Inactive,
            Validated::Corrupt { .. } => self.corrupt_view(&path, now),
        }
    }

    /// The live record of `T`, if any.
    pub fn get<T: StateRecord>(&self, session_id: &str) -> Option<T> {
        match self.load_view::<T>(session_id) {
            GateView::Active(record) => Some(record),
            _ => None,
        }
    }

    /// Reads `T` for an enforcement check and refreshes its activity stamp if
    /// it is live. Warnings reflect the idle time before the refresh.
    fn touch_view<T: StateRecord>(&self, session_id: &str) -> (GateView<T>, Vec<String>) {
        let path = self
            .resolver
            .resolve_with_migration(&self.store, T::KIND, session_id);
        if !path.exists() {
            return (GateView::Inactive, Vec::new());
        }
        let now = self.now_ms();
        let settings = self.settings();

        let touched = self.store.modify_state_with_lock(&path, |raw| {
            match validate::<T>(raw.as_deref(), session_id) {
                Validated::Valid(mut record) if record.header().active => {
                    let report = heartbeat::assess(record.header(), now, settings);
                    if report.expired {
                        return (Mutation::Keep, (GateView::Inactive, Vec::new()));
                    }
                    let warnings = report.warnings(T::KIND);
                    record.header_mut().touch(now);
                    let mutation = match serde_json::to_string_pretty(&record) {
                        Ok(json) => Mutation::Write(json),
                        Err(err) => {
                            tracing::warn!(error = %err, "Failed to serialize heartbeat");
                            Mutation::Keep
                        }
                    };
                    (mutation, (GateView::Active(record), warnings))
                }
                Validated::Valid(_) | Validated::Absent => {
                    (Mutation::Keep, (GateView::Inactive, Vec::new()))
                }
                Validated::Corrupt { .. } => {
                    (Mutation::Keep, (self.corrupt_view(&path, now), Vec::new()))
                }
            }
        });

        match touched {
            Ok(view) => view,
            Err(err) => {
                tracing::debug!(kind = %T::KIND, error = %err, "Heartbeat skipped");
                (self.load_view::<T>(session_id), Vec::new())
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────────────────

    /// Runs `step` on the live record of `T` inside one lock and carries out
    /// its directive. A fail-closed record that cannot be parsed only accepts
    /// deletion, so it cannot be silently replaced.
    fn apply<T: StateRecord>(
        &self,
        session_id: &str,
        step: impl FnOnce(Option<&T>, i64) -> Transition<T>,
    ) -> Applied<T> {
        let path = self
            .resolver
            .resolve_with_migration(&self.store, T::KIND, session_id);
        let now = self.now_ms();

        let outcome = self.store.modify_state_with_lock(&path, |raw| {
            let existed = raw.is_some();
            let validated = validate::<T>(raw.as_deref(), session_id);
            let guarded = matches!(validated, Validated::Corrupt { .. })
                && corruption_policy(T::KIND) == CorruptionPolicy::FailClosed
                && !self.corrupt_past_ttl(&path, now);
            let current = match &validated {
                Validated::Valid(record) if self.is_live(record.header(), now) => Some(record),
                _ => None,
            };

            match step(current, now) {
                Transition::Delete if existed => (Mutation::Delete, Applied::Deleted),
                Transition::Delete => (
                    Mutation::Keep,
                    Applied::NoOp {
                        reason: format!("no {} record to remove", T::KIND),
                    },
                ),
                Transition::NoOp { reason } => (Mutation::Keep, Applied::NoOp { reason }),
                Transition::Persist { .. } if guarded => (
                    Mutation::Keep,
                    Applied::NoOp {
                        reason: format!("{} state is unreadable; cancel it to start over", T::KIND),
                    },
                ),
                Transition::Persist { record, notice } => {
                    match serde_json::to_string_pretty(&record) {
                        Ok(json) => (Mutation::Write(json), Applied::Persisted { record, notice }),
                        Err(err) => (
                            Mutation::Keep,
                            Applied::NoOp {
                                reason: format!("failed to serialize {}: {}", T::KIND, err),
                            },
                        ),
                    }
                }
            }
        });

        match outcome {
            Ok(applied) => {
                tracing::debug!(kind = %T::KIND, session_id = %session_id, outcome = ?applied_label(&applied), "Transition applied");
                applied
            }
            Err(err) => {
                tracing::warn!(kind = %T::KIND, error = %err, "Transition dropped");
                Applied::NoOp {
                    reason: format!("state unavailable: {}", err),
                }
            }
        }
    }

    pub fn apply_orchestration(
        &self,
        session_id: &str,
        intent: TransitionIntent,
    ) -> Applied<OrchestrationState> {
        let applied = self.apply::<OrchestrationState>(session_id, |current, now| {
            orchestration::transition(current, &intent, session_id, now)
        });

        match (&intent, &applied) {
            (TransitionIntent::PlanApproved, Applied::Persisted { record, .. }) => {
                let marker =
                    PlanApprovalMarker::new(session_id, record.workflow_id.clone(), self.now_ms());
                self.write_marker(session_id, &marker);
            }
            (TransitionIntent::Cancel, _) => self.clear_marker(StateKind::PlanApproval, session_id),
            _ => {}
        }
        applied
    }

    /// Classifies free text and applies the resulting intent, if any.
    pub fn classify_and_apply(
        &self,
        session_id: &str,
        input: &str,
    ) -> Option<(TransitionIntent, Applied<OrchestrationState>)> {
        let intent = self.classifier.classify(input)?;
        Some((intent, self.apply_orchestration(session_id, intent)))
    }

    pub fn apply_delegation(
        &self,
        session_id: &str,
        event: DelegationEvent,
    ) -> Applied<DelegationState> {
        self.apply::<DelegationState>(session_id, |current, now| {
            delegation::transition(current, &event, session_id, now)
        })
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Enforcement Checks
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn check_file_edit(&self, session_id: &str, file_path: &str) -> Verdict {
        let (orchestration, mut warnings) = self.touch_view::<OrchestrationState>(session_id);
        let (delegation, more) = self.touch_view::<DelegationState>(session_id);
        warnings.extend(more);
        Verdict {
            decision: policy::decide_file_edit(&orchestration, &delegation, file_path),
            warnings,
        }
    }

    pub fn check_command(&self, session_id: &str, command: &str) -> Verdict {
        let (delegation, warnings) = self.touch_view::<DelegationState>(session_id);
        Verdict {
            decision: policy::decide_command(&delegation, command),
            warnings,
        }
    }

    pub fn check_agent_spawn(&self, session_id: &str, agent_type: &str) -> Verdict {
        let (orchestration, warnings) = self.touch_view::<OrchestrationState>(session_id);
        Verdict {
            decision: policy::decide_agent_spawn(&orchestration, agent_type),
            warnings,
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Advisory Markers
    // ─────────────────────────────────────────────────────────────────────────────

    fn write_marker<T: StateRecord>(&self, session_id: &str, marker: &T) -> bool {
        let path = self.resolver.resolve_path(T::KIND, session_id);
        match serde_json::to_string_pretty(marker) {
            Ok(json) => self.store.write_state(&path, &json),
            Err(err) => {
                tracing::warn!(kind = %T::KIND, error = %err, "Failed to serialize marker");
                false
            }
        }
    }

    fn clear_marker(&self, kind: StateKind, session_id: &str) {
        let path = self.resolver.resolve_path(kind, session_id);
        if let Err(err) = self.store.try_delete_state_with_lock(&path) {
            tracing::warn!(kind = %kind, error = %err, "Failed to clear marker");
        }
    }

    /// Records a verification command run. Returns whether the marker was written.
    pub fn record_test_run(&self, session_id: &str, command: &str, passed: Option<bool>) -> bool {
        let path = self
            .resolver
            .resolve_with_migration(&self.store, StateKind::TestRun, session_id);
        let now = self.now_ms();

        let written = self.store.modify_state_with_lock(&path, |raw| {
            // Advisory: an unreadable marker is simply replaced.
            let previous = validate::<TestRunMarker>(raw.as_deref(), session_id).valid();
            let marker = TestRunMarker {
                header: RecordHeader::activated(session_id, now),
                command: Some(command.to_string()),
                passed,
                run_count: previous.map_or(0, |m| m.run_count) + 1,
            };
            match serde_json::to_string_pretty(&marker) {
                Ok(json) => (Mutation::Write(json), true),
                Err(_) => (Mutation::Keep, false),
            }
        });

        written.unwrap_or_else(|err| {
            tracing::warn!(error = %err, "Failed to record test run");
            false
        })
    }

    pub fn plan_approval(&self, session_id: &str) -> Option<PlanApprovalMarker> {
        self.get(session_id)
    }

    pub fn last_test_run(&self, session_id: &str) -> Option<TestRunMarker> {
        self.get(session_id)
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Session Boundaries
    // ─────────────────────────────────────────────────────────────────────────────

    /// Maybe sweeps, then lists archived workflows. Never resumes anything.
    pub fn start_session(&self) -> SessionStartReport {
        let sweep = self.maybe_sweep();
        let resumable = self.recovery.resumable(self.now_ms());
        SessionStartReport {
            summary: format_summary(&resumable),
            resumable,
            sweep,
        }
    }

    pub fn resumable_workflows(&self) -> Vec<ResumableWorkflow> {
        self.recovery.resumable(self.now_ms())
    }

    /// Archives active, unfinished records and deletes the rest.
    pub fn end_session(&self, session_id: &str) -> SessionEndReport {
        let mut report = SessionEndReport::default();
        self.end_kind::<DelegationState>(session_id, &mut report);
        self.end_kind::<OrchestrationState>(session_id, &mut report);
        self.end_kind::<PlanApprovalMarker>(session_id, &mut report);
        self.end_kind::<TestRunMarker>(session_id, &mut report);
        tracing::info!(
            session_id = %session_id,
            archived = report.archived.len(),
            deleted = report.deleted.len(),
            "Session ended"
        );
        report
    }

    fn end_kind<T: StateRecord>(&self, session_id: &str, report: &mut SessionEndReport) {
        enum Ended {
            Nothing,
            Archived(PathBuf),
            Deleted,
            KeptCorrupt,
            ArchiveFailed(String),
        }

        let path = self.resolver.resolve_path(T::KIND, session_id);
        if !path.exists() {
            return;
        }
        let now = self.now_ms();

        let outcome = self.store.modify_state_with_lock(&path, |raw| {
            let record = match validate::<T>(raw.as_deref(), session_id) {
                Validated::Absent => return (Mutation::Keep, Ended::Nothing),
                Validated::Corrupt { .. } => return (Mutation::Keep, Ended::KeptCorrupt),
                Validated::Valid(record) => record,
            };
            if !(self.is_live(record.header(), now) && record.is_incomplete()) {
                return (Mutation::Delete, Ended::Deleted);
            }
            let archived = serde_json::to_value(&record)
                .map_err(|e| e.to_string())
                .and_then(|snapshot| {
                    self.recovery
                        .archive(T::KIND, session_id, snapshot, now)
                        .map_err(|e| e.to_string())
                });
            match archived {
                Ok(path) => (Mutation::Delete, Ended::Archived(path)),
                // Keep the live record rather than lose the only copy.
                Err(err) => (Mutation::Keep, Ended::ArchiveFailed(err)),
            }
        });

        match outcome {
            Ok(Ended::Nothing) => {}
            Ok(Ended::Archived(path)) => {
                report.archived.push(path);
                report.deleted.push(T::KIND);
            }
            Ok(Ended::Deleted) => report.deleted.push(T::KIND),
            Ok(Ended::KeptCorrupt) => report.kept_corrupt.push(T::KIND),
            Ok(Ended::ArchiveFailed(err)) => report.errors.push(format!("{}: {}", T::KIND, err)),
            Err(err) => report.errors.push(format!("{}: {}", T::KIND, err)),
        }
    }

    /// Copies an archived snapshot into `session_id`'s live location and
    /// removes the archive. Only ever called on explicit user request.
    pub fn restore_archive(&self, archive_path: &Path, session_id: &str) -> RestoreOutcome {
        let Some(archive) = self.recovery.load(archive_path) else {
            return RestoreOutcome::Unavailable {
                reason: format!("no readable archive at {}", archive_path.display()),
            };
        };
        let kind = archive.kind;
        let now = self.now_ms();

        let mut state = archive.state;
        if let Some(object) = state.as_object_mut() {
            object.insert("sessionId".into(), session_id.into());
            object.insert("lastActivity".into(), now.into());
            object.insert("lastActivityISO".into(), to_iso(now).into());
        } else {
            return RestoreOutcome::Unavailable {
                reason: "archived state is not an object".into(),
            };
        }
        let content = match serde_json::to_string_pretty(&state) {
            Ok(content) => content,
            Err(err) => {
                return RestoreOutcome::Unavailable {
                    reason: err.to_string(),
                }
            }
        };

        let path = self.resolver.resolve_path(kind, session_id);
        let written = self.store.modify_state_with_lock(&path, |raw| match raw {
            Some(_) => (Mutation::Keep, false),
            None => (Mutation::Write(content), true),
        });

        match written {
            Ok(true) => {
                if let Err(err) = self.recovery.remove(archive_path) {
                    tracing::warn!(error = %err, "Restored archive could not be removed");
                }
                tracing::info!(kind = %kind, session_id = %session_id, "Restored archived workflow");
                RestoreOutcome::Restored { kind, path }
            }
            Ok(false) => RestoreOutcome::Conflict { kind },
            Err(err) => RestoreOutcome::Unavailable {
                reason: err.to_string(),
            },
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Cleanup
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn sweep(&self) -> CleanupStats {
        run_sweep(&self.resolver, &self.store, &self.recovery, self.now_ms())
    }

    /// Sweeps on roughly `sweep_probability` of calls.
    pub fn maybe_sweep(&self) -> Option<CleanupStats> {
        let probability = sweep_chance(self.settings().sweep_probability);
        if rand::thread_rng().gen_bool(probability) {
            Some(self.sweep())
        } else {
            None
        }
    }

    // ─────────────────────────────────────────────────────────────────────────────
    // Status
    // ─────────────────────────────────────────────────────────────────────────────

    pub fn status(&self, session_id: &str) -> StatusReport {
        let now = self.now_ms();
        let mut unreadable = Vec::new();
        let mut warnings = Vec::new();

        let orchestration = match self.load_view::<OrchestrationState>(session_id) {
            GateView::Active(state) => {
                let report = heartbeat::assess(&state.header, now, self.settings());
                warnings.extend(report.warnings(StateKind::Orchestration));
                Some(OrchestrationStatus {
                    phase: state.phase(),
                    task_type: state.task_type,
                    workflow_id: state.workflow_id.clone(),
                    idle: format_age(report.elapsed_ms),
                })
            }
            GateView::Unreadable { .. } => {
                unreadable.push(StateKind::Orchestration);
                None
            }
            GateView::Inactive => None,
        };

        let delegation = match self.load_view::<DelegationState>(session_id) {
            GateView::Active(state) => {
                let report = heartbeat::assess(&state.header, now, self.settings());
                warnings.extend(report.warnings(StateKind::Delegation));
                Some(DelegationStatus {
                    workflow_id: state.workflow_id.clone(),
                    summary: state.summary(),
                    progress: state.progress_line(20),
                    ready: state.ready_tasks().iter().map(|t| t.id.clone()).collect(),
                    idle: format_age(report.elapsed_ms),
                })
            }
            GateView::Unreadable { .. } => {
                unreadable.push(StateKind::Delegation);
                None
            }
            GateView::Inactive => None,
        };

        StatusReport {
            session_id: session_id.to_string(),
            orchestration,
            delegation,
            unreadable,
            plan_approved: self.plan_approval(session_id).is_some(),
            last_test_run: self.last_test_run(session_id),
            warnings,
        }
    }
}

/// A probability `gen_bool` accepts. Non-finite values disable sweeping.
fn sweep_chance(configured: f64) -> f64 {
    if configured.is_finite() {
        configured.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn applied_label<T>(applied: &Applied<T>) -> &'static str {
    match applied {
        Applied::Persisted { .. } => "persisted",
        Applied::Deleted => "deleted",
        Applied::NoOp { .. } => "noop",
    }
}
