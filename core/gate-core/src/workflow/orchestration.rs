//! Discovery-gated orchestration mode.
//!
//! ```text
//!            Activate(impl/unknown)        ReconComplete
//! Inactive ─────────────────────────► Recon ─────────────► Interview
//!     │      Activate(research)                                │ InterviewComplete
//!     └──────────────────────────────────────────────────► PlanProposed
//!                                                              │ PlanApproved
//!                                                              ▼
//!                                                           Approved
//! Cancel from anywhere deletes the record.
//! ```
//!
//! The phase is derived from three monotonic flags rather than stored, so a
//! lost update can at worst fail to advance a flag; it can never regress one.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::classifier::TransitionIntent;
use super::Transition;
use crate::state::{RecordHeader, StateKind, StateRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskType {
    Implementation,
    Research,
    /// Classifier could not tell. Treated like implementation: recon required.
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Recon,
    Interview,
    PlanProposed,
    Approved,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Recon => "recon",
            Phase::Interview => "interview",
            Phase::PlanProposed => "plan-proposed",
            Phase::Approved => "approved",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrchestrationState {
    #[serde(flatten)]
    pub header: RecordHeader,
    #[serde(default)]
    pub task_type: TaskType,
    #[serde(default)]
    pub recon_complete: bool,
    #[serde(default)]
    pub interview_complete: bool,
    #[serde(default)]
    pub plan_approved: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<String>,
}

impl OrchestrationState {
    pub fn activate(task_type: TaskType, session_id: &str, now_ms: i64) -> Self {
        Self {
            header: RecordHeader::activated(session_id, now_ms),
            task_type,
            recon_complete: false,
            interview_complete: false,
            plan_approved: false,
            workflow_id: Some(ulid::Ulid::new().to_string()),
        }
    }

    pub fn phase(&self) -> Phase {
        if self.plan_approved {
            Phase::Approved
        } else if self.interview_complete {
            Phase::PlanProposed
        } else if self.recon_complete || self.task_type == TaskType::Research {
            Phase::Interview
        } else {
            Phase::Recon
        }
    }
}

impl StateRecord for OrchestrationState {
    const KIND: StateKind = StateKind::Orchestration;

    fn header(&self) -> &RecordHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut RecordHeader {
        &mut self.header
    }

    fn workflow_id(&self) -> Option<&str> {
        self.workflow_id.as_deref()
    }

    /// Orchestration has no terminal success state of its own; an active
    /// record is always mid-workflow.
    fn is_incomplete(&self) -> bool {
        self.header.active
    }
}

/// Applies `intent` to `current`. `current` is `None` when no live record
/// exists (absent, inactive, or expired).
pub fn transition(
    current: Option<&OrchestrationState>,
    intent: &TransitionIntent,
    session_id: &str,
    now_ms: i64,
) -> Transition<OrchestrationState> {
    let current = current.filter(|state| state.header.active);

    let Some(state) = current else {
        return match intent {
            TransitionIntent::Activate { task_type } => {
                Transition::persist(OrchestrationState::activate(*task_type, session_id, now_ms))
            }
            TransitionIntent::Cancel => Transition::Delete,
            _ => Transition::noop("orchestration is not active"),
        };
    };

    let phase = state.phase();
    let mut next = state.clone();
    match intent {
        TransitionIntent::Activate { .. } => {
            return Transition::noop(format!("orchestration already active ({})", phase))
        }
        TransitionIntent::Cancel => return Transition::Delete,
        TransitionIntent::ReconComplete if phase == Phase::Recon => next.recon_complete = true,
        TransitionIntent::InterviewComplete if phase == Phase::Interview => {
            next.interview_complete = true
        }
        TransitionIntent::PlanApproved if phase == Phase::PlanProposed => next.plan_approved = true,
        other => {
            return Transition::noop(format!("{:?} does not apply in phase {}", other, phase))
        }
    }

    next.header.touch(now_ms);
    Transition::persist(next)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(
        state: Option<OrchestrationState>,
        intent: TransitionIntent,
    ) -> Option<OrchestrationState> {
        match transition(state.as_ref(), &intent, "s1", 100) {
            Transition::Persist { record, .. } => Some(record),
            Transition::Delete => None,
            Transition::NoOp { .. } => state,
        }
    }

    fn activate(task_type: TaskType) -> OrchestrationState {
        apply(None, TransitionIntent::Activate { task_type }).unwrap()
    }

    #[test]
    fn implementation_walks_every_phase() {
        let s = activate(TaskType::Implementation);
        assert_eq!(s.phase(), Phase::Recon);
        assert!(s.workflow_id.is_some());

        let s = apply(Some(s), TransitionIntent::ReconComplete).unwrap();
        assert_eq!(s.phase(), Phase::Interview);
        let s = apply(Some(s), TransitionIntent::InterviewComplete).unwrap();
        assert_eq!(s.phase(), Phase::PlanProposed);
        let s = apply(Some(s), TransitionIntent::PlanApproved).unwrap();
        assert_eq!(s.phase(), Phase::Approved);
    }

    #[test]
    fn research_skips_recon() {
        let s = activate(TaskType::Research);
        assert_eq!(s.phase(), Phase::Interview);
        assert!(matches!(
            transition(Some(&s), &TransitionIntent::ReconComplete, "s1", 1),
            Transition::NoOp { .. }
        ));
    }

    #[test]
    fn unknown_requires_recon() {
        assert_eq!(activate(TaskType::Unknown).phase(), Phase::Recon);
    }

    #[test]
    fn out_of_order_intents_are_noops() {
        let s = activate(TaskType::Implementation);
        for intent in [TransitionIntent::InterviewComplete, TransitionIntent::PlanApproved] {
            assert!(matches!(
                transition(Some(&s), &intent, "s1", 1),
                Transition::NoOp { .. }
            ));
        }
    }

    #[test]
    fn reactivation_keeps_existing_workflow() {
        let s = activate(TaskType::Implementation);
        assert!(matches!(
            transition(
                Some(&s),
                &TransitionIntent::Activate {
                    task_type: TaskType::Research
                },
                "s1",
                1
            ),
            Transition::NoOp { .. }
        ));
    }

    #[test]
    fn cancel_deletes_from_any_phase() {
        let mut s = Some(activate(TaskType::Implementation));
        for intent in [
            TransitionIntent::ReconComplete,
            TransitionIntent::InterviewComplete,
            TransitionIntent::PlanApproved,
        ] {
            assert_eq!(
                transition(s.as_ref(), &TransitionIntent::Cancel, "s1", 1),
                Transition::Delete
            );
            s = apply(s, intent);
        }
        assert_eq!(
            transition(s.as_ref(), &TransitionIntent::Cancel, "s1", 1),
            Transition::Delete
        );
    }

    #[test]
    fn flags_never_regress_over_any_intent_sequence() {
        let intents = [
            TransitionIntent::Activate {
                task_type: TaskType::Implementation,
            },
            TransitionIntent::ReconComplete,
            TransitionIntent::PlanApproved,
            TransitionIntent::InterviewComplete,
            TransitionIntent::Activate {
                task_type: TaskType::Research,
            },
            TransitionIntent::ReconComplete,
            TransitionIntent::PlanApproved,
            TransitionIntent::InterviewComplete,
        ];

        let mut state: Option<OrchestrationState> = None;
        let mut seen = (false, false, false);
        for intent in intents {
            state = apply(state, intent);
            let s = state.as_ref().unwrap();
            let now = (s.recon_complete, s.interview_complete, s.plan_approved);
            assert!(now.0 >= seen.0 && now.1 >= seen.1 && now.2 >= seen.2);
            seen = now;
        }
        assert_eq!(state.unwrap().phase(), Phase::Approved);
    }

    #[test]
    fn persisted_transitions_touch_activity() {
        let s = activate(TaskType::Implementation);
        match transition(Some(&s), &TransitionIntent::ReconComplete, "s1", 5_000) {
            Transition::Persist { record, .. } => {
                assert_eq!(record.header.last_activity, Some(5_000))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn inactive_record_is_treated_as_absent() {
        let mut s = activate(TaskType::Implementation);
        s.header.active = false;
        assert!(matches!(
            transition(Some(&s), &TransitionIntent::ReconComplete, "s1", 1),
            Transition::NoOp { .. }
        ));
        assert!(matches!(
            transition(
                Some(&s),
                &TransitionIntent::Activate {
                    task_type: TaskType::Research
                },
                "s1",
                1
            ),
            Transition::Persist { .. }
        ));
    }
}
