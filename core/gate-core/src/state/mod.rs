//! Workflow State Storage
//!
//! Durable, process-safe storage for the records every hook invocation shares.
//!
//! # Architecture: Files Are the Only Shared Memory
//!
//! Each hook firing is a fresh process. The only thing two invocations share is
//! the filesystem, so every read-modify-write crosses it:
//!
//! ```text
//! hook process → PathResolver → LockedStore (lock artifact + atomic rename) → schema
//!   (event)        (where)          (serialize across processes)              (typed record)
//! ```
//!
//! # Module Structure
//!
//! - [`kinds`]: The closed set of record kinds and which of them enforce
//! - [`paths`]: Session-scoped paths, sanitization, legacy migration
//! - [`lock`]: Exclusive-create lock artifacts with stale takeover
//! - [`store`]: Atomic writes and locked reads
//! - [`records`]: Shared header and advisory marker types
//! - [`schema`]: Absent / valid / corrupt classification and corruption policy
//! - [`heartbeat`]: Staleness and TTL assessment
//! - [`recovery`]: Session-end archives and session-start enumeration
//! - [`cleanup`]: Probabilistic sweep of orphaned artifacts

pub mod cleanup;
pub mod heartbeat;
pub mod kinds;
pub mod lock;
pub mod paths;
pub mod records;
pub mod recovery;
pub mod schema;
pub mod store;


pub use cleanup::{run_sweep, CleanupStats};
pub use heartbeat::ActivityReport;
pub use kinds::StateKind;
pub use lock::FileLock;
pub use paths::{sanitize_session_id, PathResolver};
pub use records::{PlanApprovalMarker, RecordHeader, StateRecord, TestRunMarker};
pub use recovery::{RecoveryArchive, RecoveryStore, ResumableWorkflow};
pub use schema::{corruption_policy, validate, CorruptionPolicy, Validated};
pub use store::{LockedStore, Mutation};
