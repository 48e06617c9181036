//! Assignment orchestration.
//!
//! `AssignmentService` is the entry point the back office calls: it pulls
//! the backlog and roster, derives workload, plans, commits, and records an
//! audit entry. Runs within one process are serialized by an internal
//! mutex. Two *processes* can still race the workload read and over-assign;
//! that is a known limitation of the store's non-transactional read/write
//! split, documented rather than papered over with distributed locking.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use casedesk_core::config::AssignmentConfig;
use casedesk_core::AssignmentPolicy;
use casedesk_store::{
    AuditRecord, DocumentStore, WorkerAssignmentCount, WorkerId,
};

use crate::committer::{BatchCommitter, CommitHalt, CommitOutcome};
use crate::error::{AssignError, AssignResult};
use crate::planner::{plan_assignments, PlanOutcome};
use crate::stats::AdminCache;
use crate::workload::compute_workload;

/// Outcome of a successful assignment run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct AssignmentReport {
    pub policy: AssignmentPolicy,
    /// Candidate items pulled for the run.
    pub requested: u32,
    /// Items durably assigned.
    pub assigned_count: u32,
    pub per_worker: HashMap<WorkerId, u32>,
}

/// Orchestrates assignment runs against a document store and the shared
/// back-office cache.
pub struct AssignmentService {
    store: Arc<dyn DocumentStore>,
    cache: Arc<AdminCache>,
    config: AssignmentConfig,
    /// Serializes runs within this process.
    run_guard: Mutex<()>,
}

impl AssignmentService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        cache: Arc<AdminCache>,
        config: AssignmentConfig,
    ) -> Self {
        Self {
            store,
            cache,
            config,
            run_guard: Mutex::new(()),
        }
    }

    /// Run one assignment pass under the given policy.
    pub async fn run_assignment(&self, policy: AssignmentPolicy) -> AssignResult<AssignmentReport> {
        self.run_assignment_with_deadline(policy, None).await
    }

    /// Run one assignment pass, halting cleanly between chunks if the
    /// deadline passes. Whatever prefix of the plan committed before the
    /// halt stands and is reported.
    pub async fn run_assignment_with_deadline(
        &self,
        policy: AssignmentPolicy,
        deadline: Option<Instant>,
    ) -> AssignResult<AssignmentReport> {
        let _guard = self.run_guard.lock().await;

        let workers = self
            .store
            .list_active_workers()
            .map_err(AssignError::CandidateReadFailed)?;
        if workers.is_empty() {
            warn!("assignment requested with no active workers");
            return Err(AssignError::NoEligibleWorkers);
        }

        let items = self
            .store
            .list_unassigned_items(self.config.page_size)
            .map_err(AssignError::CandidateReadFailed)?;
        if items.is_empty() {
            debug!("no unassigned items, nothing to do");
            return Ok(AssignmentReport {
                policy,
                requested: 0,
                assigned_count: 0,
                per_worker: HashMap::new(),
            });
        }
        let requested = items.len() as u32;

        let worker_ids: Vec<WorkerId> = workers.iter().map(|w| w.id.clone()).collect();
        let snapshot = compute_workload(
            self.store.as_ref(),
            &worker_ids,
            self.config.workload_scan_cap,
        )
        .map_err(AssignError::WorkloadReadFailed)?;
        if snapshot.truncated {
            error!(
                scan_cap = self.config.workload_scan_cap,
                "workload scan truncated, refusing to plan from an under-count"
            );
            return Err(AssignError::WorkloadTruncated {
                scanned: self.config.workload_scan_cap,
            });
        }

        let item_ids: Vec<String> = items.iter().map(|item| item.id.clone()).collect();
        let plan = match plan_assignments(&item_ids, &workers, &snapshot.counts, policy) {
            PlanOutcome::Planned(plan) => plan,
            PlanOutcome::NoEligibleWorkers => return Err(AssignError::NoEligibleWorkers),
        };

        let at = epoch_secs();
        let committer = BatchCommitter::new(self.store.as_ref(), self.cache.as_ref());
        let outcome = committer.commit(&plan, at, deadline);

        match outcome.halt {
            None => {
                self.append_audit(policy, requested, &outcome, "completed", at);
                info!(
                    %policy,
                    requested,
                    assigned = outcome.assigned_count,
                    workers = outcome.per_worker.len(),
                    "assignment run completed"
                );
                Ok(AssignmentReport {
                    policy,
                    requested,
                    assigned_count: outcome.assigned_count,
                    per_worker: outcome.per_worker,
                })
            }
            Some(CommitHalt::BatchFailed(_)) => {
                self.append_audit(policy, requested, &outcome, "partial", at);
                let source = match outcome.halt {
                    Some(CommitHalt::BatchFailed(source)) => source,
                    _ => unreachable!("halt variant checked above"),
                };
                Err(AssignError::PartialCommit {
                    assigned_count: outcome.assigned_count,
                    per_worker: outcome.per_worker,
                    source,
                })
            }
            Some(CommitHalt::DeadlineExceeded) => {
                self.append_audit(policy, requested, &outcome, "aborted", at);
                Err(AssignError::DeadlineExceeded {
                    assigned_count: outcome.assigned_count,
                    per_worker: outcome.per_worker,
                })
            }
        }
    }

    /// Append the run's audit record. The assignments are already durable
    /// by this point, so a failed append is logged and swallowed; failing
    /// the run here would invite a retry that double-reports.
    fn append_audit(
        &self,
        policy: AssignmentPolicy,
        requested: u32,
        outcome: &CommitOutcome,
        run_outcome: &str,
        at: u64,
    ) {
        let mut per_worker: Vec<WorkerAssignmentCount> = outcome
            .per_worker
            .iter()
            .map(|(worker_id, count)| WorkerAssignmentCount {
                worker_id: worker_id.clone(),
                count: *count,
            })
            .collect();
        per_worker.sort_by(|a, b| a.worker_id.cmp(&b.worker_id));

        let record = AuditRecord::new(
            policy.to_string(),
            requested,
            outcome.assigned_count,
            per_worker,
            run_outcome,
            at,
        );
        if let Err(e) = self.store.append_audit(&record) {
            warn!(error = %e, "audit append failed; assignments remain committed");
        }
    }
}

/// Current Unix epoch in seconds.
fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
