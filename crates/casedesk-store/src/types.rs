//! Domain records for the CaseDesk document store.
//!
//! These are the explicit, typed forms of the back-office documents: work
//! items awaiting processing, the agents that process them, and the audit
//! trail of assignment runs. Optional document fields get their defaults
//! here via serde, at the adapter boundary.

use serde::{Deserialize, Serialize};

/// Unique identifier for a work item.
pub type WorkItemId = String;

/// Unique identifier for a worker (processing agent).
pub type WorkerId = String;

// ── Work items ─────────────────────────────────────────────────────

/// Lifecycle status of a work item.
///
/// Only `Unassigned` items are eligible for planning. Items move to
/// `Assigned` exclusively through the assignment service; `InProgress` and
/// `Completed` transitions happen elsewhere in the back office.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemStatus {
    Unassigned,
    Assigned,
    InProgress,
    Completed,
}

impl WorkItemStatus {
    /// Attributed to a worker and not yet finished; counts toward that
    /// worker's derived workload.
    pub fn is_in_flight(self) -> bool {
        matches!(self, WorkItemStatus::Assigned | WorkItemStatus::InProgress)
    }
}

/// One unit of assignable work.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkItem {
    pub id: WorkItemId,
    pub status: WorkItemStatus,
    /// The worker this item is attributed to; at most one at any instant.
    #[serde(default)]
    pub assigned_worker_id: Option<WorkerId>,
    /// Unix timestamp (seconds) of the assignment, if any.
    #[serde(default)]
    pub assigned_at: Option<u64>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl WorkItem {
    /// A fresh, unassigned item.
    pub fn unassigned(id: impl Into<WorkItemId>, created_at: u64) -> Self {
        Self {
            id: id.into(),
            status: WorkItemStatus::Unassigned,
            assigned_worker_id: None,
            assigned_at: None,
            created_at,
            updated_at: created_at,
        }
    }
}

// ── Workers ────────────────────────────────────────────────────────

/// Capacity ceiling applied to worker documents that carry none.
pub fn default_max_workload() -> u32 {
    8
}

/// An assignable processing agent.
///
/// Workload is always derived by counting in-flight items; it is never
/// stored on this record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Worker {
    pub id: WorkerId,
    /// Inactive workers are never planning candidates.
    pub is_active: bool,
    /// Capacity ceiling. Documents without one default to
    /// [`default_max_workload`].
    #[serde(default = "default_max_workload")]
    pub max_workload: u32,
    /// Tie-breaker for planning; `None` (never assigned) sorts first.
    #[serde(default)]
    pub last_assigned_at: Option<u64>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl Worker {
    /// An active worker with the default capacity ceiling.
    pub fn active(id: impl Into<WorkerId>, created_at: u64) -> Self {
        Self {
            id: id.into(),
            is_active: true,
            max_workload: default_max_workload(),
            last_assigned_at: None,
            created_at,
            updated_at: created_at,
        }
    }
}

// ── Audit trail ────────────────────────────────────────────────────

/// Per-worker slice of an assignment run's outcome.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkerAssignmentCount {
    pub worker_id: WorkerId,
    pub count: u32,
}

/// Summary record appended after an assignment run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditRecord {
    /// Store-assigned on append (`run:{seq}`); empty until then.
    #[serde(default)]
    pub id: String,
    pub policy: String,
    /// Candidate items pulled for the run.
    pub requested: u32,
    /// Items actually committed as assigned.
    pub assigned: u32,
    pub per_worker: Vec<WorkerAssignmentCount>,
    /// `completed`, `partial`, or `aborted`.
    pub outcome: String,
    pub at: u64,
}

impl AuditRecord {
    pub fn new(
        policy: impl Into<String>,
        requested: u32,
        assigned: u32,
        per_worker: Vec<WorkerAssignmentCount>,
        outcome: impl Into<String>,
        at: u64,
    ) -> Self {
        Self {
            id: String::new(),
            policy: policy.into(),
            requested,
            assigned,
            per_worker,
            outcome: outcome.into(),
            at,
        }
    }
}

// ── Batch writes ───────────────────────────────────────────────────

/// One operation inside an atomic batch write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOp {
    /// Attribute an item to a worker: `status → Assigned`, set
    /// `assigned_worker_id` and `assigned_at`.
    AssignItem {
        item_id: WorkItemId,
        worker_id: WorkerId,
        at: u64,
    },
    /// Return an item to the pool: `status → Unassigned`, clear the
    /// assignment fields.
    ClearAssignment { item_id: WorkItemId, at: u64 },
    /// Record that a worker just received work (`last_assigned_at`).
    TouchWorker { worker_id: WorkerId, at: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_document_without_capacity_gets_default() {
        let json = r#"{"id":"w1","is_active":true,"created_at":10,"updated_at":10}"#;
        let worker: Worker = serde_json::from_str(json).unwrap();
        assert_eq!(worker.max_workload, default_max_workload());
        assert_eq!(worker.last_assigned_at, None);
    }

    #[test]
    fn item_document_without_assignment_fields_deserializes() {
        let json = r#"{"id":"f1","status":"unassigned","created_at":5,"updated_at":5}"#;
        let item: WorkItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.status, WorkItemStatus::Unassigned);
        assert_eq!(item.assigned_worker_id, None);
    }

    #[test]
    fn status_serializes_snake_case() {
        let json = serde_json::to_string(&WorkItemStatus::InProgress).unwrap();
        assert_eq!(json, r#""in_progress""#);
    }

    #[test]
    fn in_flight_covers_assigned_and_in_progress() {
        assert!(WorkItemStatus::Assigned.is_in_flight());
        assert!(WorkItemStatus::InProgress.is_in_flight());
        assert!(!WorkItemStatus::Unassigned.is_in_flight());
        assert!(!WorkItemStatus::Completed.is_in_flight());
    }
}
