//! Cached read paths and the cache key namespaces.
//!
//! Keys are hierarchical (`namespace:resource:param…`) and the write side
//! (the committer) invalidates by the same prefix constants, so reads stay
//! consistent with writes without a dependency graph between cache keys.

use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;

use casedesk_cache::CacheStore;
use casedesk_store::DocumentStore;

use crate::error::{AssignError, AssignResult};
use crate::workload::compute_workload;

/// Scope prefix for cached work-item listings.
pub const FILES_LIST_PREFIX: &str = "files:list:";

/// Scope prefix for cached assignment statistics.
pub const ASSIGN_STATS_PREFIX: &str = "assign:stats:";

/// The shared back-office cache: JSON aggregate snapshots keyed by scope.
pub type AdminCache = CacheStore<Value>;

/// Key for the roster-wide workload snapshot.
pub fn workload_stats_key() -> String {
    format!("{ASSIGN_STATS_PREFIX}workload")
}

/// Key for one page of the unassigned-item listing.
pub fn unassigned_page_key(page: u32) -> String {
    format!("{FILES_LIST_PREFIX}unassigned:{page}")
}

/// Per-worker workload statistics, cache-aside.
///
/// On a miss the snapshot is recomputed from the active roster and cached
/// for `ttl`. A truncated scan is served with its `truncated` flag set:
/// staleness here is display-only, and the assignment path does its own
/// fail-closed derivation.
pub fn workload_stats(
    store: &dyn DocumentStore,
    cache: &AdminCache,
    scan_cap: u32,
    ttl: Duration,
) -> AssignResult<Value> {
    let key = workload_stats_key();
    if let Some(cached) = cache.get(&key) {
        return Ok(cached);
    }

    let mut workers = store
        .list_active_workers()
        .map_err(AssignError::CandidateReadFailed)?;
    workers.sort_by(|a, b| a.id.cmp(&b.id));

    let worker_ids: Vec<String> = workers.iter().map(|w| w.id.clone()).collect();
    let snapshot =
        compute_workload(store, &worker_ids, scan_cap).map_err(AssignError::WorkloadReadFailed)?;

    let rows: Vec<Value> = workers
        .iter()
        .map(|w| {
            let active = snapshot.count(&w.id);
            json!({
                "worker_id": w.id,
                "active": active,
                "max_workload": w.max_workload,
                "utilization": f64::from(active) / f64::from(w.max_workload.max(1)),
            })
        })
        .collect();
    let total_active: u32 = workers.iter().map(|w| snapshot.count(&w.id)).sum();

    let value = json!({
        "workers": rows,
        "total_active": total_active,
        "truncated": snapshot.truncated,
    });
    cache.set(&key, value.clone(), ttl);
    debug!(workers = workers.len(), total_active, "workload stats recomputed");
    Ok(value)
}

/// One page of unassigned work-item ids, cache-aside.
pub fn unassigned_page(
    store: &dyn DocumentStore,
    cache: &AdminCache,
    page: u32,
    page_size: u32,
    ttl: Duration,
) -> AssignResult<Value> {
    let key = unassigned_page_key(page);
    if let Some(cached) = cache.get(&key) {
        return Ok(cached);
    }

    let fetch = (page + 1).saturating_mul(page_size);
    let items = store
        .list_unassigned_items(fetch)
        .map_err(AssignError::CandidateReadFailed)?;
    let ids: Vec<&str> = items
        .iter()
        .skip(page as usize * page_size as usize)
        .map(|item| item.id.as_str())
        .collect();

    let value = json!({ "page": page, "item_ids": ids });
    cache.set(&key, value.clone(), ttl);
    Ok(value)
}
