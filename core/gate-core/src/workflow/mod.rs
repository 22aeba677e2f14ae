//! Workflow state machines and the capability policy built on them.
//!
//! Transitions are pure: `(current record, event, now) → Transition`. Nothing
//! in here touches the filesystem. The engine runs a transition inside the
//! store's read-modify-write lock and carries out its directive.
//!
//! Races between hook processes resolve as last-writer-wins per record. That is
//! benign because every persisted transition only moves forward (phase flags
//! never clear, task statuses only advance) and cancel is a delete.

pub mod classifier;
pub mod delegation;
pub mod orchestration;
pub mod policy;

use std::path::PathBuf;

use serde::Serialize;

/// What the engine should do with the record after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition<T> {
    /// Write `record` back, optionally telling the caller something happened.
    Persist { record: T, notice: Option<Notice> },
    /// Remove the record outright.
    Delete,
    /// Leave the file untouched.
    NoOp { reason: String },
}

impl<T> Transition<T> {
    pub(crate) fn noop(reason: impl Into<String>) -> Self {
        Transition::NoOp {
            reason: reason.into(),
        }
    }

    pub(crate) fn persist(record: T) -> Self {
        Transition::Persist {
            record,
            notice: None,
        }
    }
}

/// Side information about a delegation transition, for the caller to relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Notice {
    #[serde(rename_all = "camelCase")]
    RetryQueued {
        task_id: String,
        attempt: u32,
        agent: String,
    },
    #[serde(rename_all = "camelCase")]
    EscalatedToHuman { task_id: String, attempts: u32 },
    #[serde(rename_all = "camelCase")]
    RetryDispatched {
        task_id: String,
        attempt: u32,
        agent: String,
    },
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notice::RetryQueued {
                task_id,
                attempt,
                agent,
            } => write!(f, "Task {} queued for retry #{} with {}", task_id, attempt, agent),
            Notice::EscalatedToHuman { task_id, attempts } => write!(
                f,
                "Task {} failed {} times; needs human attention",
                task_id, attempts
            ),
            Notice::RetryDispatched {
                task_id,
                attempt,
                agent,
            } => write!(f, "Task {} re-queued as attempt #{} for {}", task_id, attempt, agent),
        }
    }
}

/// An enforcement record as seen by a policy check.
#[derive(Debug, Clone, PartialEq)]
pub enum GateView<T> {
    /// No file, an inactive record, or one past its TTL.
    Inactive,
    Active(T),
    /// Present but unreadable. Enforcement treats this as active.
    Unreadable { path: PathBuf },
}

impl<T> GateView<T> {
    pub fn active(&self) -> Option<&T> {
        match self {
            GateView::Active(record) => Some(record),
            _ => None,
        }
    }

    /// Whether enforcement should consider the gate up.
    pub fn is_enforcing(&self) -> bool {
        !matches!(self, GateView::Inactive)
    }
}
