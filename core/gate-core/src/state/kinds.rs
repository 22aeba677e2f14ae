//! The closed set of state kinds and their corruption policy.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// What a state file holds. The slug is part of the on-disk file name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StateKind {
    /// Delegated-execution workflow (task queue + retry escalation).
    Delegation,
    /// Discovery-gated orchestration workflow.
    Orchestration,
    /// Advisory marker written when a plan is approved.
    PlanApproval,
    /// Advisory marker for the last verification command.
    TestRun,
}

impl StateKind {
    pub const ALL: [StateKind; 4] = [
        StateKind::Delegation,
        StateKind::Orchestration,
        StateKind::PlanApproval,
        StateKind::TestRun,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            StateKind::Delegation => "delegation",
            StateKind::Orchestration => "orchestration",
            StateKind::PlanApproval => "plan-approval",
            StateKind::TestRun => "test-run",
        }
    }

    /// Enforcement kinds gate user actions and fail closed when their file is
    /// present but unreadable. Advisory kinds fail open.
    pub fn is_enforcement(self) -> bool {
        matches!(self, StateKind::Delegation | StateKind::Orchestration)
    }
}

impl fmt::Display for StateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

impl FromStr for StateKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StateKind::ALL
            .into_iter()
            .find(|k| k.slug() == s)
            .ok_or_else(|| format!("Unknown state kind: {}", s))
    }
}
