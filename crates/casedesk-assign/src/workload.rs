//! Workload derivation.
//!
//! A worker's workload is always recomputed from item state: one capped
//! scan of in-flight items folded into a per-worker count map. Storing a
//! counter instead would reintroduce drift whenever an item changes state
//! outside the assignment path.

use std::collections::HashMap;

use tracing::debug;

use casedesk_store::{DocumentStore, StoreResult, WorkerId};

/// Per-worker counts of in-flight items at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkloadSnapshot {
    /// Every requested worker is present; zero when no items matched.
    pub counts: HashMap<WorkerId, u32>,
    /// Set when the scan hit its result cap. A truncated snapshot may
    /// under-count and must not be planned from.
    pub truncated: bool,
}

impl WorkloadSnapshot {
    /// Count for one worker (zero for workers outside the snapshot).
    pub fn count(&self, worker_id: &str) -> u32 {
        self.counts.get(worker_id).copied().unwrap_or(0)
    }
}

/// Derive the current workload for `worker_ids` with a single store scan of
/// items in `Assigned`/`InProgress` status, capped at `scan_cap` results.
///
/// Items attributed to workers outside the requested set still consume scan
/// budget but do not appear in the map. A scan returning exactly `scan_cap`
/// rows is reported as truncated; a false positive at the boundary is
/// accepted in exchange for never under-counting silently.
pub fn compute_workload(
    store: &dyn DocumentStore,
    worker_ids: &[WorkerId],
    scan_cap: u32,
) -> StoreResult<WorkloadSnapshot> {
    let mut counts: HashMap<WorkerId, u32> = worker_ids
        .iter()
        .map(|id| (id.clone(), 0))
        .collect();

    let in_flight = store.list_in_flight_items(scan_cap)?;
    let truncated = in_flight.len() as u32 >= scan_cap;

    for item in &in_flight {
        if let Some(worker_id) = &item.assigned_worker_id {
            if let Some(count) = counts.get_mut(worker_id) {
                *count += 1;
            }
        }
    }

    debug!(
        workers = worker_ids.len(),
        in_flight = in_flight.len(),
        truncated,
        "workload derived"
    );
    Ok(WorkloadSnapshot { counts, truncated })
}
