//! Scripting subcommands: drive workflows and inspect state from a shell.
//!
//! Every command prints one JSON document on stdout. A transition that does
//! not apply exits non-zero with the reason on stderr.

use std::io::{self, Write};
use std::path::PathBuf;

use clap::{Subcommand, ValueEnum};
use gate_core::clock::Clock;
use gate_core::{
    Applied, DelegationEvent, DelegationState, GateEngine, NewTask, RestoreOutcome, TaskType,
    TransitionIntent,
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HookError {
    #[error("failed to read stdin: {0}")]
    Stdin(#[source] io::Error),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to write output: {0}")]
    Output(#[source] io::Error),

    #[error("not applied: {0}")]
    NotApplied(String),
}

#[derive(Debug, Subcommand)]
pub enum DelegationOp {
    /// Start a delegation workflow
    Activate {
        #[arg(long)]
        workflow_id: Option<String>,
    },
    /// Queue a task
    AddTask {
        id: String,
        agent: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long = "depends-on", value_delimiter = ',')]
        depends_on: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        files: Vec<String>,
    },
    Start {
        task_id: String,
    },
    Complete {
        task_id: String,
        #[arg(long)]
        commit: Option<String>,
    },
    Fail {
        task_id: String,
        #[arg(long)]
        error: String,
    },
    /// Re-queue the oldest failed task with its escalated agent
    PopRetry,
    Checkpoint {
        #[arg(long)]
        commit: Option<String>,
        #[arg(long)]
        task_id: Option<String>,
        #[arg(long)]
        message: Option<String>,
    },
    /// Ready tasks whose file sets do not overlap
    Batch,
    Deactivate,
    Cancel,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum TaskTypeArg {
    Implementation,
    Research,
    Unknown,
}

impl From<TaskTypeArg> for TaskType {
    fn from(arg: TaskTypeArg) -> Self {
        match arg {
            TaskTypeArg::Implementation => TaskType::Implementation,
            TaskTypeArg::Research => TaskType::Research,
            TaskTypeArg::Unknown => TaskType::Unknown,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum OrchestrationOp {
    Activate {
        #[arg(long, value_enum, default_value = "unknown")]
        task_type: TaskTypeArg,
    },
    ReconComplete,
    InterviewComplete,
    Approve,
    Cancel,
}

#[derive(Debug, Subcommand)]
pub enum RecoveryOp {
    /// List archived workflows that can be resumed
    List,
    /// Move an archive back into a session's live state
    Restore {
        path: PathBuf,
        #[arg(long)]
        session: String,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BatchEntry<'a> {
    id: &'a str,
    agent: String,
    files: &'a [String],
}

pub fn print_json<T: Serialize>(value: &T) -> Result<(), HookError> {
    let json = serde_json::to_string_pretty(value)?;
    let mut stdout = io::stdout().lock();
    writeln!(stdout, "{}", json).map_err(HookError::Output)
}

fn finish<T: Serialize>(applied: Applied<T>) -> Result<(), HookError> {
    print_json(&applied)?;
    match applied {
        Applied::NoOp { reason } => Err(HookError::NotApplied(reason)),
        _ => Ok(()),
    }
}

pub fn delegation<C: Clock>(
    engine: &GateEngine<C>,
    session: &str,
    op: DelegationOp,
) -> Result<(), HookError> {
    let event = match op {
        DelegationOp::Batch => {
            let state = engine.get::<DelegationState>(session);
            let batch: Vec<BatchEntry> = state
                .as_ref()
                .map(|s| {
                    s.parallel_batch()
                        .into_iter()
                        .map(|task| BatchEntry {
                            id: &task.id,
                            agent: task.assigned_agent(),
                            files: &task.files,
                        })
                        .collect()
                })
                .unwrap_or_default();
            return print_json(&batch);
        }
        DelegationOp::Activate { workflow_id } => DelegationEvent::Activate { workflow_id },
        DelegationOp::AddTask {
            id,
            agent,
            name,
            depends_on,
            files,
        } => DelegationEvent::AddTask(NewTask {
            id,
            agent,
            name,
            depends_on,
            files,
        }),
        DelegationOp::Start { task_id } => DelegationEvent::StartTask { task_id },
        DelegationOp::Complete { task_id, commit } => {
            DelegationEvent::CompleteTask { task_id, commit }
        }
        DelegationOp::Fail { task_id, error } => DelegationEvent::FailTask { task_id, error },
        DelegationOp::PopRetry => DelegationEvent::PopRetry,
        DelegationOp::Checkpoint {
            commit,
            task_id,
            message,
        } => DelegationEvent::Checkpoint {
            commit,
            task_id,
            message,
        },
        DelegationOp::Deactivate => DelegationEvent::Deactivate,
        DelegationOp::Cancel => DelegationEvent::Cancel,
    };
    finish(engine.apply_delegation(session, event))
}

pub fn orchestration<C: Clock>(
    engine: &GateEngine<C>,
    session: &str,
    op: OrchestrationOp,
) -> Result<(), HookError> {
    let intent = match op {
        OrchestrationOp::Activate { task_type } => TransitionIntent::Activate {
            task_type: task_type.into(),
        },
        OrchestrationOp::ReconComplete => TransitionIntent::ReconComplete,
        OrchestrationOp::InterviewComplete => TransitionIntent::InterviewComplete,
        OrchestrationOp::Approve => TransitionIntent::PlanApproved,
        OrchestrationOp::Cancel => TransitionIntent::Cancel,
    };
    finish(engine.apply_orchestration(session, intent))
}

pub fn recovery<C: Clock>(engine: &GateEngine<C>, op: RecoveryOp) -> Result<(), HookError> {
    match op {
        RecoveryOp::List => print_json(&engine.resumable_workflows()),
        RecoveryOp::Restore { path, session } => {
            let outcome = engine.restore_archive(&path, &session);
            print_json(&outcome)?;
            match outcome {
                RestoreOutcome::Restored { .. } => Ok(()),
                RestoreOutcome::Conflict { kind } => Err(HookError::NotApplied(format!(
                    "session {} already has live {} state",
                    session, kind
                ))),
                RestoreOutcome::Unavailable { reason } => Err(HookError::NotApplied(reason)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gate_core::storage::{GateSettings, StorageConfig};
    use gate_core::ManualClock;
    use tempfile::tempdir;

    fn engine(root: &std::path::Path) -> GateEngine<ManualClock> {
        GateEngine::with_clock(
            StorageConfig::with_root(root.to_path_buf()),
            GateSettings::default(),
            ManualClock::at(1_700_000_000_000),
        )
    }

    #[test]
    fn test_delegation_commands_round_through_engine() {
        let temp = tempdir().unwrap();
        let engine = engine(temp.path());
        delegation(&engine, "s1", DelegationOp::Activate { workflow_id: None }).unwrap();
        delegation(
            &engine,
            "s1",
            DelegationOp::AddTask {
                id: "t1".into(),
                agent: "builder".into(),
                name: None,
                depends_on: vec![],
                files: vec!["a.rs".into()],
            },
        )
        .unwrap();
        delegation(&engine, "s1", DelegationOp::Batch).unwrap();

        let err = delegation(
            &engine,
            "s1",
            DelegationOp::Complete {
                task_id: "t1".into(),
                commit: None,
            },
        )
        .unwrap_err();
        assert!(matches!(err, HookError::NotApplied(_)));
    }

    #[test]
    fn test_orchestration_cancel_without_state_is_not_applied() {
        let temp = tempdir().unwrap();
        let engine = engine(temp.path());
        assert!(orchestration(&engine, "s1", OrchestrationOp::Cancel).is_err());
        orchestration(
            &engine,
            "s1",
            OrchestrationOp::Activate {
                task_type: TaskTypeArg::Research,
            },
        )
        .unwrap();
        orchestration(&engine, "s1", OrchestrationOp::Cancel).unwrap();
    }

    #[test]
    fn test_restore_of_missing_archive_fails() {
        let temp = tempdir().unwrap();
        let engine = engine(temp.path());
        let result = recovery(
            &engine,
            RecoveryOp::Restore {
                path: temp.path().join("nope.json"),
                session: "s1".into(),
            },
        );
        assert!(result.is_err());
    }
}
