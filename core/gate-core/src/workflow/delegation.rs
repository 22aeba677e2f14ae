//! Delegated-execution mode: a task queue with retry escalation.
//!
//! # Task Status
//!
//! ```text
//! pending ──start──► in_progress ──complete──► complete
//!    ▲                    │
//!    │                  fail
//!    │                    ▼
//!    └──pop retry──── failed (attempt + 1 < ceiling: queued for retry)
//!                      failed (otherwise: terminal, needs a human)
//! ```
//!
//! # Escalation Ladder
//!
//! Who runs a retry depends only on the attempt number:
//!
//! | attempt | agent                   |
//! |---------|-------------------------|
//! | 0       | the task's own agent    |
//! | 1       | [`QUICK_FIX_AGENT`]     |
//! | 2       | [`DIAGNOSTIC_AGENT`]    |
//! | 3+      | [`ESCALATE_TO_HUMAN`]   |

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::{Notice, Transition};
use crate::state::{RecordHeader, StateKind, StateRecord};

/// Attempts at or past this number are never retried automatically.
pub const RETRY_CEILING: u32 = 3;
pub const QUICK_FIX_AGENT: &str = "quick-fix-agent";
pub const DIAGNOSTIC_AGENT: &str = "diagnostic-agent";
pub const ESCALATE_TO_HUMAN: &str = "ESCALATE";

/// Agent responsible for `attempt` of a task originally given to `agent`.
pub fn escalate(attempt: u32, agent: &str) -> String {
    match attempt {
        0 => agent.to_string(),
        1 => QUICK_FIX_AGENT.to_string(),
        2 => DIAGNOSTIC_AGENT.to_string(),
        _ => ESCALATE_TO_HUMAN.to_string(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Complete,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub status: TaskStatus,
    /// The originally assigned agent. Retries go to [`Task::assigned_agent`].
    #[serde(default)]
    pub agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<String>,
    #[serde(default)]
    pub attempt: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<i64>,
}

impl Task {
    pub fn assigned_agent(&self) -> String {
        escalate(self.attempt, &self.agent)
    }

    /// Failed with no automatic retry left.
    pub fn needs_human(&self) -> bool {
        self.status == TaskStatus::Failed && self.attempt + 1 >= RETRY_CEILING
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryEntry {
    pub task_id: String,
    pub attempt: u32,
    #[serde(default)]
    pub last_error: String,
    #[serde(default)]
    pub original_agent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued_at: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegationState {
    #[serde(flatten)]
    pub header: RecordHeader,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub retry_queue: Vec<RetryEntry>,
    #[serde(default)]
    pub checkpoints: Vec<Checkpoint>,
}

impl StateRecord for DelegationState {
    const KIND: StateKind = StateKind::Delegation;

    fn header(&self) -> &RecordHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut RecordHeader {
        &mut self.header
    }

    fn workflow_id(&self) -> Option<&str> {
        self.workflow_id.as_deref()
    }

    fn is_incomplete(&self) -> bool {
        let all_done =
            !self.tasks.is_empty() && self.tasks.iter().all(|t| t.status == TaskStatus::Complete);
        self.header.active && !all_done
    }

    /// Keeps the first task for each id and drops retry entries whose task is gone.
    fn sanitize(&mut self) {
        let mut seen = HashSet::new();
        let before = self.tasks.len();
        self.tasks.retain(|t| seen.insert(t.id.clone()));
        if self.tasks.len() != before {
            tracing::warn!(
                dropped = before - self.tasks.len(),
                "Dropped duplicate task ids from delegation record"
            );
        }
        self.retry_queue.retain(|entry| seen.contains(&entry.task_id));
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewTask {
    pub id: String,
    pub agent: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub files: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DelegationEvent {
    Activate { workflow_id: Option<String> },
    AddTask(NewTask),
    StartTask { task_id: String },
    CompleteTask { task_id: String, commit: Option<String> },
    FailTask { task_id: String, error: String },
    PopRetry,
    Checkpoint {
        commit: Option<String>,
        task_id: Option<String>,
        message: Option<String>,
    },
    Deactivate,
    Cancel,
}

impl DelegationState {
    pub fn activate(workflow_id: Option<String>, session_id: &str, now_ms: i64) -> Self {
        Self {
            header: RecordHeader::activated(session_id, now_ms),
            workflow_id: Some(workflow_id.unwrap_or_else(|| ulid::Ulid::new().to_string())),
            tasks: Vec::new(),
            retry_queue: Vec::new(),
            checkpoints: Vec::new(),
        }
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    fn task_mut(&mut self, id: &str) -> Option<&mut Task> {
        self.tasks.iter_mut().find(|t| t.id == id)
    }

    fn dependencies_met(&self, task: &Task) -> bool {
        task.depends_on.iter().all(|dep| {
            self.task(dep)
                .is_some_and(|d| d.status == TaskStatus::Complete)
        })
    }

    /// Pending tasks whose dependencies are all complete, in queue order.
    pub fn ready_tasks(&self) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Pending && self.dependencies_met(t))
            .collect()
    }

    /// Ready tasks that can run side by side: no two touch the same file.
    pub fn parallel_batch(&self) -> Vec<&Task> {
        let mut claimed: HashSet<&str> = HashSet::new();
        let mut batch = Vec::new();
        for task in self.ready_tasks() {
            if task.files.iter().any(|f| claimed.contains(f.as_str())) {
                continue;
            }
            claimed.extend(task.files.iter().map(String::as_str));
            batch.push(task);
        }
        batch
    }

    pub fn summary(&self) -> TaskSummary {
        let mut summary = TaskSummary {
            total: self.tasks.len(),
            queued_retries: self.retry_queue.len(),
            ..TaskSummary::default()
        };
        for task in &self.tasks {
            match task.status {
                TaskStatus::Pending => summary.pending += 1,
                TaskStatus::InProgress => summary.in_progress += 1,
                TaskStatus::Complete => summary.complete += 1,
                TaskStatus::Failed => summary.failed += 1,
            }
            if task.needs_human() {
                summary.needs_human += 1;
            }
        }
        summary
    }

    /// `[########------------] 4/10 complete, 1 in progress, 1 failed`
    pub fn progress_line(&self, width: usize) -> String {
        let s = self.summary();
        let filled = if s.total == 0 {
            0
        } else {
            s.complete * width / s.total
        };
        let mut line = format!(
            "[{}{}] {}/{} complete",
            "#".repeat(filled),
            "-".repeat(width - filled),
            s.complete,
            s.total
        );
        if s.in_progress > 0 {
            line.push_str(&format!(", {} in progress", s.in_progress));
        }
        if s.failed > 0 {
            line.push_str(&format!(", {} failed", s.failed));
        }
        if s.needs_human > 0 {
            line.push_str(&format!(", {} need a human", s.needs_human));
        }
        line
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub complete: usize,
    pub failed: usize,
    pub needs_human: usize,
    pub queued_retries: usize,
}

/// Applies `event` to `current`. `current` is `None` when no live record exists.
pub fn transition(
    current: Option<&DelegationState>,
    event: &DelegationEvent,
    session_id: &str,
    now_ms: i64,
) -> Transition<DelegationState> {
    match event {
        DelegationEvent::Cancel => return Transition::Delete,
        DelegationEvent::Activate { workflow_id } => {
            return match current.filter(|s| s.header.active) {
                Some(_) => Transition::noop("delegation already active"),
                None => Transition::persist(DelegationState::activate(
                    workflow_id.clone(),
                    session_id,
                    now_ms,
                )),
            };
        }
        _ => {}
    }

    let Some(state) = current.filter(|s| s.header.active) else {
        return Transition::noop("delegation is not active");
    };
    let mut next = state.clone();
    let mut notice = None;

    match event {
        DelegationEvent::AddTask(new) => {
            if next.task(&new.id).is_some() {
                return Transition::noop(format!("task {} already exists", new.id));
            }
            next.tasks.push(Task {
                id: new.id.clone(),
                status: TaskStatus::Pending,
                agent: new.agent.clone(),
                name: new.name.clone(),
                depends_on: new.depends_on.clone(),
                files: new.files.clone(),
                attempt: 0,
                last_error: None,
                commit: None,
                started_at: None,
                completed_at: None,
            });
        }
        DelegationEvent::StartTask { task_id } => {
            let Some(task) = state.task(task_id) else {
                return Transition::noop(format!("no task {}", task_id));
            };
            if task.status != TaskStatus::Pending {
                return Transition::noop(format!("task {} is {:?}", task_id, task.status));
            }
            if !state.dependencies_met(task) {
                return Transition::noop(format!("task {} has unfinished dependencies", task_id));
            }
            if let Some(task) = next.task_mut(task_id) {
                task.status = TaskStatus::InProgress;
                task.started_at = Some(now_ms);
            }
        }
        DelegationEvent::CompleteTask { task_id, commit } => {
            match next.task_mut(task_id) {
                Some(task) if task.status == TaskStatus::InProgress => {
                    task.status = TaskStatus::Complete;
                    task.completed_at = Some(now_ms);
                    task.commit = commit.clone();
                    task.last_error = None;
                }
                Some(task) => {
                    return Transition::noop(format!("task {} is {:?}", task_id, task.status))
                }
                None => return Transition::noop(format!("no task {}", task_id)),
            }
        }
        DelegationEvent::FailTask { task_id, error } => {
            let (attempt, agent) = match next.task_mut(task_id) {
                Some(task) if task.status == TaskStatus::InProgress => {
                    task.status = TaskStatus::Failed;
                    task.completed_at = Some(now_ms);
                    task.last_error = Some(error.clone());
                    (task.attempt, task.agent.clone())
                }
                Some(task) => {
                    return Transition::noop(format!("task {} is {:?}", task_id, task.status))
                }
                None => return Transition::noop(format!("no task {}", task_id)),
            };

            let next_attempt = attempt + 1;
            if next_attempt < RETRY_CEILING {
                next.retry_queue.push(RetryEntry {
                    task_id: task_id.clone(),
                    attempt: next_attempt,
                    last_error: error.clone(),
                    original_agent: agent.clone(),
                    queued_at: Some(now_ms),
                });
                notice = Some(Notice::RetryQueued {
                    task_id: task_id.clone(),
                    attempt: next_attempt,
                    agent: escalate(next_attempt, &agent),
                });
            } else {
                notice = Some(Notice::EscalatedToHuman {
                    task_id: task_id.clone(),
                    attempts: next_attempt,
                });
            }
        }
        DelegationEvent::PopRetry => {
            if next.retry_queue.is_empty() {
                return Transition::noop("retry queue is empty");
            }
            let entry = next.retry_queue.remove(0);
            match next.task_mut(&entry.task_id) {
                Some(task) if task.status == TaskStatus::Failed => {
                    task.status = TaskStatus::Pending;
                    task.attempt = entry.attempt;
                    task.started_at = None;
                    task.completed_at = None;
                    notice = Some(Notice::RetryDispatched {
                        task_id: entry.task_id.clone(),
                        attempt: entry.attempt,
                        agent: escalate(entry.attempt, &entry.original_agent),
                    });
                }
                // Entry no longer matches a failed task; dropping it is the repair.
                _ => tracing::debug!(task_id = %entry.task_id, "Discarding orphaned retry entry"),
            }
        }
        DelegationEvent::Checkpoint {
            commit,
            task_id,
            message,
        } => next.checkpoints.push(Checkpoint {
            timestamp: now_ms,
            commit: commit.clone(),
            task_id: task_id.clone(),
            message: message.clone(),
        }),
        DelegationEvent::Deactivate => next.header.active = false,
        DelegationEvent::Activate { .. } | DelegationEvent::Cancel => {}
    }

    next.header.touch(now_ms);
    Transition::Persist {
        record: next,
        notice,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(state: DelegationState, event: DelegationEvent) -> (DelegationState, Option<Notice>) {
        match transition(Some(&state), &event, "s1", 10) {
            Transition::Persist { record, notice } => (record, notice),
            other => panic!("expected persist for {:?}, got {:?}", event, other),
        }
    }

    fn task(id: &str, deps: &[&str], files: &[&str]) -> NewTask {
        NewTask {
            id: id.to_string(),
            agent: "agentA".into(),
            name: None,
            depends_on: deps.iter().map(|s| s.to_string()).collect(),
            files: files.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn active_with(tasks: Vec<NewTask>) -> DelegationState {
        let mut state = DelegationState::activate(Some("wf".into()), "s1", 0);
        for new in tasks {
            state = step(state, DelegationEvent::AddTask(new)).0;
        }
        state
    }

    fn start(state: DelegationState, id: &str) -> DelegationState {
        step(state, DelegationEvent::StartTask { task_id: id.into() }).0
    }

    fn fail(state: DelegationState, id: &str) -> (DelegationState, Option<Notice>) {
        step(
            state,
            DelegationEvent::FailTask {
                task_id: id.into(),
                error: "boom".into(),
            },
        )
    }

    #[test]
    fn escalation_is_a_function_of_attempt() {
        assert_eq!(escalate(0, "agentA"), "agentA");
        assert_eq!(escalate(1, "agentA"), QUICK_FIX_AGENT);
        assert_eq!(escalate(1, "agentB"), QUICK_FIX_AGENT);
        assert_eq!(escalate(2, "agentB"), DIAGNOSTIC_AGENT);
        for n in [3, 4, 100] {
            assert_eq!(escalate(n, "agentA"), ESCALATE_TO_HUMAN);
        }
    }

    #[test]
    fn task_runs_to_completion() {
        let state = start(active_with(vec![task("t1", &[], &[])]), "t1");
        assert_eq!(state.task("t1").unwrap().status, TaskStatus::InProgress);

        let (state, _) = step(
            state,
            DelegationEvent::CompleteTask {
                task_id: "t1".into(),
                commit: Some("abc123".into()),
            },
        );
        let task = state.task("t1").unwrap();
        assert_eq!(task.status, TaskStatus::Complete);
        assert_eq!(task.commit.as_deref(), Some("abc123"));
        assert!(!state.is_incomplete());
    }

    #[test]
    fn failures_climb_the_ladder_then_stop() {
        let mut state = start(active_with(vec![task("t1", &[], &[])]), "t1");
        let expected = [(1, QUICK_FIX_AGENT), (2, DIAGNOSTIC_AGENT)];

        for (attempt, agent) in expected {
            let (failed, notice) = fail(state, "t1");
            assert_eq!(
                notice,
                Some(Notice::RetryQueued {
                    task_id: "t1".into(),
                    attempt,
                    agent: agent.into(),
                })
            );
            let (popped, notice) = step(failed, DelegationEvent::PopRetry);
            assert!(matches!(notice, Some(Notice::RetryDispatched { .. })));
            let task = popped.task("t1").unwrap();
            assert_eq!(task.status, TaskStatus::Pending);
            assert_eq!(task.assigned_agent(), agent);
            state = start(popped, "t1");
        }

        let (state, notice) = fail(state, "t1");
        assert_eq!(
            notice,
            Some(Notice::EscalatedToHuman {
                task_id: "t1".into(),
                attempts: 3
            })
        );
        assert!(state.retry_queue.is_empty());
        assert!(state.task("t1").unwrap().needs_human());
        assert_eq!(state.summary().needs_human, 1);
    }

    #[test]
    fn status_machine_rejects_skips() {
        let state = active_with(vec![task("t1", &[], &[])]);
        for event in [
            DelegationEvent::CompleteTask {
                task_id: "t1".into(),
                commit: None,
            },
            DelegationEvent::FailTask {
                task_id: "t1".into(),
                error: "x".into(),
            },
            DelegationEvent::StartTask {
                task_id: "missing".into(),
            },
        ] {
            assert!(matches!(
                transition(Some(&state), &event, "s1", 1),
                Transition::NoOp { .. }
            ));
        }
    }

    #[test]
    fn duplicate_task_ids_are_rejected_and_sanitized() {
        let state = active_with(vec![task("t1", &[], &[])]);
        let dup = DelegationEvent::AddTask(NewTask {
            id: "t1".into(),
            agent: "other".into(),
            ..NewTask::default()
        });
        assert!(matches!(
            transition(Some(&state), &dup, "s1", 1),
            Transition::NoOp { .. }
        ));

        let mut raw = state.clone();
        raw.tasks.push(raw.tasks[0].clone());
        raw.retry_queue.push(RetryEntry {
            task_id: "ghost".into(),
            attempt: 1,
            last_error: String::new(),
            original_agent: String::new(),
            queued_at: None,
        });
        raw.sanitize();
        assert_eq!(raw.tasks.len(), 1);
        assert!(raw.retry_queue.is_empty());
    }

    #[test]
    fn dependencies_gate_readiness_and_start() {
        let state = active_with(vec![task("a", &[], &[]), task("b", &["a"], &[])]);
        let ready: Vec<_> = state.ready_tasks().iter().map(|t| t.id.clone()).collect();
        assert_eq!(ready, vec!["a"]);
        assert!(matches!(
            transition(
                Some(&state),
                &DelegationEvent::StartTask {
                    task_id: "b".into()
                },
                "s1",
                1
            ),
            Transition::NoOp { .. }
        ));
    }

    #[test]
    fn parallel_batch_avoids_file_overlap() {
        let state = active_with(vec![
            task("a", &[], &["src/x.rs"]),
            task("b", &[], &["src/x.rs", "src/y.rs"]),
            task("c", &[], &["src/z.rs"]),
        ]);
        let batch: Vec<_> = state.parallel_batch().iter().map(|t| t.id.clone()).collect();
        assert_eq!(batch, vec!["a", "c"]);
    }

    #[test]
    fn inactive_or_missing_state_ignores_task_events() {
        let event = DelegationEvent::StartTask {
            task_id: "t1".into(),
        };
        assert!(matches!(
            transition(None, &event, "s1", 1),
            Transition::NoOp { .. }
        ));

        let (inactive, _) = step(active_with(vec![task("t1", &[], &[])]), DelegationEvent::Deactivate);
        assert!(!inactive.header.active);
        assert!(!inactive.is_incomplete());
        assert!(matches!(
            transition(Some(&inactive), &event, "s1", 1),
            Transition::NoOp { .. }
        ));
    }

    #[test]
    fn cancel_always_deletes() {
        assert_eq!(
            transition(None, &DelegationEvent::Cancel, "s1", 1),
            Transition::Delete
        );
    }

    #[test]
    fn checkpoint_and_progress() {
        let state = active_with(vec![task("a", &[], &[]), task("b", &[], &[])]);
        let (state, _) = step(
            state,
            DelegationEvent::Checkpoint {
                commit: Some("c0ffee".into()),
                task_id: None,
                message: Some("baseline".into()),
            },
        );
        assert_eq!(state.checkpoints.len(), 1);
        assert_eq!(state.checkpoints[0].timestamp, 10);

        let state = start(state, "a");
        let (state, _) = step(
            state,
            DelegationEvent::CompleteTask {
                task_id: "a".into(),
                commit: None,
            },
        );
        assert_eq!(state.progress_line(10), "[#####-----] 1/2 complete");
    }

    #[test]
    fn serialized_field_names_are_camel_case() {
        let (state, _) = fail(start(active_with(vec![task("t1", &[], &[])]), "t1"), "t1");
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["retryQueue"][0]["taskId"], "t1");
        assert_eq!(json["retryQueue"][0]["originalAgent"], "agentA");
        assert_eq!(json["tasks"][0]["status"], "failed");
        assert_eq!(json["workflowId"], "wf");
    }
}
