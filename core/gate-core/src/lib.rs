//! # gate-core
//!
//! Workflow state and enforcement for hook processes that gate what an AI
//! coding assistant may do while an orchestration or delegation workflow runs.
//!
//! ## Design Principles
//!
//! - **Synchronous**: No async runtime dependency. Every hook is a short-lived process.
//! - **Files are the only shared memory**: Concurrent invocations coordinate
//!   through lock artifacts and atomic renames in a shared directory.
//! - **Graceful degradation**: Missing files read as "no workflow"; plumbing
//!   faults become no-ops and log lines, never errors at the hook boundary.
//! - **Fail closed where it matters**: An unreadable enforcement record keeps
//!   blocking until it is cancelled or ages out.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use gate_core::GateEngine;
//!
//! let engine = GateEngine::new();
//! let verdict = engine.check_command(session_id, "cargo test");
//! let start = engine.start_session();
//! ```

pub mod clock;
pub mod engine;
pub mod error;
pub mod patterns;
pub mod state;
pub mod storage;
pub mod workflow;

pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{
    Applied, DelegationStatus, GateEngine, OrchestrationStatus, RestoreOutcome,
    SessionEndReport, SessionStartReport, StatusReport,
};
pub use error::{GateError, Result};
pub use state::{CleanupStats, ResumableWorkflow, StateKind};
pub use storage::{GateSettings, StorageConfig};
pub use workflow::classifier::{IntentClassifier, PatternClassifier, TransitionIntent};
pub use workflow::delegation::{DelegationEvent, DelegationState, NewTask, Task, TaskStatus};
pub use workflow::orchestration::{OrchestrationState, Phase, TaskType};
pub use workflow::policy::{Decision, Denial, Verdict};
pub use workflow::{GateView, Notice};
