//! casedesk-assign — the workload-aware work-assignment engine.
//!
//! The engine distributes pending work items across the active agent pool
//! under capacity constraints:
//!
//! - [`workload`] derives each worker's current load by scanning in-flight
//!   items (never a stored counter, so counts cannot drift)
//! - [`planner`] is the pure planning core: round-robin and load-balanced
//!   policies over a workload snapshot
//! - [`committer`] applies a plan as bounded atomic batches and invalidates
//!   the affected cache scopes chunk by chunk
//! - [`service`] orchestrates a run end to end and records an audit entry
//! - [`stats`] is the cached read side, sharing key namespaces with the
//!   committer's invalidation

pub mod committer;
pub mod error;
pub mod planner;
pub mod service;
pub mod stats;
pub mod workload;

pub use committer::{BatchCommitter, CommitHalt, CommitOutcome};
pub use error::{AssignError, AssignResult};
pub use planner::{plan_assignments, PlanEntry, PlanOutcome};
pub use service::{AssignmentReport, AssignmentService};
pub use stats::AdminCache;
pub use workload::{compute_workload, WorkloadSnapshot};
