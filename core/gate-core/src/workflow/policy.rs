//! Allow/deny decisions for prospective actions.
//!
//! Policy only reads workflow state; it never transitions it. Each check is a
//! pure function of the current [`GateView`]s and the action, so the same
//! inputs always produce the same decision.
//!
//! | Action            | Delegation active       | Orchestration active           |
//! |-------------------|-------------------------|--------------------------------|
//! | edit code file    | deny                    | deny (every phase)             |
//! | edit config/docs  | allow                   | allow                          |
//! | verification cmd  | deny (delegate it)      | allow                          |
//! | other command     | allow                   | allow                          |
//! | spawn agent       | allow                   | per phase, see [`phase_permits`] |
//!
//! An unreadable enforcement record counts as active.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use super::delegation::DelegationState;
use super::orchestration::{OrchestrationState, Phase};
use super::GateView;
use crate::patterns::{RE_CODE_EXT, RE_CONFIG_SCRIPT, RE_EXPLORATORY_AGENT, RE_VERIFICATION_COMMAND};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    Code,
    ConfigOrDocs,
}

pub fn classify_file(path: &str) -> FileClass {
    let name = Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path);
    if RE_CONFIG_SCRIPT.is_match(name) {
        FileClass::ConfigOrDocs
    } else if RE_CODE_EXT.is_match(name) {
        FileClass::Code
    } else {
        FileClass::ConfigOrDocs
    }
}

pub fn is_verification_command(command: &str) -> bool {
    RE_VERIFICATION_COMMAND.is_match(command)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentCategory {
    /// Read-only discovery: scouts, researchers, analysts.
    Exploratory,
    /// Anything that may change the codebase.
    Execution,
}

pub fn classify_agent(agent_type: &str) -> AgentCategory {
    if RE_EXPLORATORY_AGENT.is_match(agent_type) {
        AgentCategory::Exploratory
    } else {
        AgentCategory::Execution
    }
}

pub fn phase_permits(phase: Phase, category: AgentCategory) -> bool {
    match phase {
        Phase::Recon => category == AgentCategory::Exploratory,
        Phase::Interview | Phase::PlanProposed => false,
        Phase::Approved => true,
    }
}

/// User-facing explanation of a blocked action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Denial {
    pub blocked: String,
    pub reason: String,
    pub remedy: String,
}

impl fmt::Display for Denial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Blocked: {}\nWhy: {}\nNext step: {}",
            self.blocked, self.reason, self.remedy
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(Denial),
}

impl Decision {
    pub fn is_allow(&self) -> bool {
        matches!(self, Decision::Allow)
    }

    pub fn denial(&self) -> Option<&Denial> {
        match self {
            Decision::Deny(denial) => Some(denial),
            Decision::Allow => None,
        }
    }
}

/// A decision plus advisory warnings gathered while making it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub decision: Decision,
    pub warnings: Vec<String>,
}

impl Verdict {
    pub fn allow() -> Self {
        Self {
            decision: Decision::Allow,
            warnings: Vec::new(),
        }
    }
}

fn deny(blocked: String, reason: impl Into<String>, remedy: impl Into<String>) -> Decision {
    Decision::Deny(Denial {
        blocked,
        reason: reason.into(),
        remedy: remedy.into(),
    })
}

pub fn decide_file_edit(
    orchestration: &GateView<OrchestrationState>,
    delegation: &GateView<DelegationState>,
    path: &str,
) -> Decision {
    if classify_file(path) == FileClass::ConfigOrDocs {
        return Decision::Allow;
    }
    let blocked = format!("direct edit of {}", path);

    match delegation {
        GateView::Active(_) => {
            return deny(
                blocked,
                "The delegation workflow is active, so source changes go through delegated tasks.",
                "Add a delegation task for this change and let its agent make the edit.",
            )
        }
        GateView::Unreadable { path: state } => {
            return deny(
                blocked,
                format!(
                    "The delegation workflow state at {} is unreadable and is treated as active.",
                    state.display()
                ),
                "Cancel the delegation workflow to clear it: `gate-hook delegation cancel`.",
            )
        }
        GateView::Inactive => {}
    }

    match orchestration {
        GateView::Active(state) if state.phase() == Phase::Approved => deny(
            blocked,
            "The orchestration plan is approved; implementation runs through the delegation workflow, not direct edits.",
            "Activate the delegation workflow and add the planned changes as tasks.",
        ),
        GateView::Active(state) => deny(
            blocked,
            format!(
                "Orchestration is in the {} phase; nothing is implemented before the plan is approved.",
                state.phase()
            ),
            "Finish discovery and get the plan approved, or cancel orchestration.",
        ),
        GateView::Unreadable { path: state } => deny(
            blocked,
            format!(
                "The orchestration state at {} is unreadable and is treated as active.",
                state.display()
            ),
            "Cancel orchestration to clear it: `gate-hook orchestration cancel`.",
        ),
        GateView::Inactive => Decision::Allow,
    }
}

pub fn decide_command(delegation: &GateView<DelegationState>, command: &str) -> Decision {
    if delegation.is_enforcing() && is_verification_command(command) {
        return deny(
            format!("running `{}` directly", command),
            "Verification commands are part of delegated tasks while the delegation workflow is active.",
            "Have the task's agent run the tests and report the result.",
        );
    }
    Decision::Allow
}

pub fn decide_agent_spawn(orchestration: &GateView<OrchestrationState>, agent_type: &str) -> Decision {
    let category = classify_agent(agent_type);
    // Unreadable: apply recon rules.
    let phase = match orchestration {
        GateView::Inactive => return Decision::Allow,
        GateView::Active(state) => state.phase(),
        GateView::Unreadable { .. } => Phase::Recon,
    };
    if phase_permits(phase, category) {
        return Decision::Allow;
    }

    let reason = match phase {
        Phase::Recon => format!(
            "Orchestration is in the recon phase; only exploratory agents may run, and {} is not one.",
            agent_type
        ),
        _ => format!(
            "Orchestration is in the {} phase; no agents run until the plan is approved.",
            phase
        ),
    };
    deny(
        format!("spawning agent {}", agent_type),
        reason,
        "Complete the current orchestration phase first, or cancel orchestration.",
    )
}
