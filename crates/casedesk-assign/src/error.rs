//! Assignment engine error types.
//!
//! Lower components return typed results; only the service decides
//! abort-vs-continue. Every failure that can follow a commit carries the
//! partial-progress counts, so a caller always sees "38 of 50 assigned"
//! rather than an opaque failure.

use std::collections::HashMap;

use thiserror::Error;

use casedesk_store::{StoreError, WorkerId};

/// Result type alias for assignment operations.
pub type AssignResult<T> = Result<T, AssignError>;

/// Errors that can abort or truncate an assignment run.
#[derive(Debug, Error)]
pub enum AssignError {
    /// No active workers exist. An expected operational state, recoverable
    /// by the caller (retry later, alert an operator); never retried here.
    #[error("no eligible workers")]
    NoEligibleWorkers,

    /// The workload derivation read failed. The run aborts entirely rather
    /// than planning against a possibly-incomplete view.
    #[error("workload read failed: {0}")]
    WorkloadReadFailed(#[source] StoreError),

    /// The in-flight scan hit its result cap. Planning from an under-count
    /// could overload a worker, so the run fails closed.
    #[error("workload scan truncated at {scanned} items")]
    WorkloadTruncated { scanned: u32 },

    /// The initial item/worker fetch failed.
    #[error("candidate read failed: {0}")]
    CandidateReadFailed(#[source] StoreError),

    /// A chunk's batch commit failed after earlier chunks landed. Not
    /// retried automatically: committed items left `Unassigned`, so a
    /// caller-initiated re-run only picks up the remainder.
    #[error("partial commit: {assigned_count} items assigned before a batch failed: {source}")]
    PartialCommit {
        assigned_count: u32,
        per_worker: HashMap<WorkerId, u32>,
        #[source]
        source: StoreError,
    },

    /// The caller's deadline passed between chunks; the committed prefix of
    /// the plan stands.
    #[error("deadline exceeded after {assigned_count} items were assigned")]
    DeadlineExceeded {
        assigned_count: u32,
        per_worker: HashMap<WorkerId, u32>,
    },
}

impl AssignError {
    /// Items durably assigned before the run stopped. Zero for aborts that
    /// happen before any commit.
    pub fn assigned_count(&self) -> u32 {
        match self {
            AssignError::PartialCommit { assigned_count, .. }
            | AssignError::DeadlineExceeded { assigned_count, .. } => *assigned_count,
            _ => 0,
        }
    }
}
