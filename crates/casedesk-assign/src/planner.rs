//! Assignment planning.
//!
//! Pure compute: no I/O, no clock. Given the unassigned backlog, the active
//! roster, and a workload snapshot, produce one plan entry per item under
//! the selected policy. The planner never drops an item: when every worker
//! is at capacity, load-balanced mode overflows onto the least-loaded one
//! instead of leaving work unplanned.

use std::collections::HashMap;

use casedesk_core::AssignmentPolicy;
use casedesk_store::{WorkItemId, Worker, WorkerId};

/// One pairing of the plan: not yet committed, not persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanEntry {
    pub item_id: WorkItemId,
    pub worker_id: WorkerId,
}

/// Result of a planning pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlanOutcome {
    /// Exactly one entry per input item, in input order.
    Planned(Vec<PlanEntry>),
    /// The roster held no active workers. An expected operational state,
    /// distinguishable from an empty plan over an empty backlog.
    NoEligibleWorkers,
}

/// Planning view of one worker: stored tie-breakers plus the in-pass load
/// counter that spreads a single run's assignments.
struct Candidate {
    id: WorkerId,
    max_workload: u32,
    last_assigned_at: Option<u64>,
    load: u32,
}

impl Candidate {
    /// Least-loaded first; ties to the longest-idle worker (never-assigned
    /// sorts before any timestamp), then id for determinism.
    fn order_key(&self) -> (u32, Option<u64>, &str) {
        (self.load, self.last_assigned_at, self.id.as_str())
    }

    fn has_capacity(&self) -> bool {
        self.load < self.max_workload
    }
}

/// Plan an assignment for every item in `item_ids`.
///
/// `workload` is the derived per-worker count snapshot; workers absent from
/// it start at zero. Inactive workers are never candidates.
pub fn plan_assignments(
    item_ids: &[WorkItemId],
    workers: &[Worker],
    workload: &HashMap<WorkerId, u32>,
    policy: AssignmentPolicy,
) -> PlanOutcome {
    let mut candidates: Vec<Candidate> = workers
        .iter()
        .filter(|w| w.is_active)
        .map(|w| Candidate {
            id: w.id.clone(),
            max_workload: w.max_workload,
            last_assigned_at: w.last_assigned_at,
            load: workload.get(&w.id).copied().unwrap_or(0),
        })
        .collect();

    if candidates.is_empty() {
        return PlanOutcome::NoEligibleWorkers;
    }
    if item_ids.is_empty() {
        return PlanOutcome::Planned(Vec::new());
    }

    let entries = match policy {
        AssignmentPolicy::RoundRobin => plan_round_robin(item_ids, &mut candidates),
        AssignmentPolicy::LoadBalanced => plan_load_balanced(item_ids, &mut candidates),
    };
    PlanOutcome::Planned(entries)
}

/// Cycle through a fixed worker order established once at planning start.
/// Capacity influences only the starting order, never exclusion.
fn plan_round_robin(item_ids: &[WorkItemId], candidates: &mut [Candidate]) -> Vec<PlanEntry> {
    candidates.sort_by(|a, b| a.order_key().cmp(&b.order_key()));

    item_ids
        .iter()
        .enumerate()
        .map(|(cursor, item_id)| PlanEntry {
            item_id: item_id.clone(),
            worker_id: candidates[cursor % candidates.len()].id.clone(),
        })
        .collect()
}

/// Pick the least-loaded worker with spare capacity for each item,
/// overflowing to the globally least-loaded worker when no one has room.
/// Each decision bumps the chosen worker's in-pass load so one run spreads
/// work instead of piling onto the initially-least-loaded worker.
fn plan_load_balanced(item_ids: &[WorkItemId], candidates: &mut [Candidate]) -> Vec<PlanEntry> {
    let mut entries = Vec::with_capacity(item_ids.len());
    for item_id in item_ids {
        let chosen = least_loaded(candidates, true)
            .or_else(|| least_loaded(candidates, false))
            .unwrap_or_default();
        candidates[chosen].load += 1;
        entries.push(PlanEntry {
            item_id: item_id.clone(),
            worker_id: candidates[chosen].id.clone(),
        });
    }
    entries
}

fn least_loaded(candidates: &[Candidate], under_cap_only: bool) -> Option<usize> {
    candidates
        .iter()
        .enumerate()
        .filter(|(_, c)| !under_cap_only || c.has_capacity())
        .min_by(|(_, a), (_, b)| a.order_key().cmp(&b.order_key()))
        .map(|(idx, _)| idx)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn worker(id: &str, max_workload: u32, last_assigned_at: Option<u64>) -> Worker {
        Worker {
            id: id.to_string(),
            is_active: true,
            max_workload,
            last_assigned_at,
            created_at: 0,
            updated_at: 0,
        }
    }

    fn items(n: usize) -> Vec<WorkItemId> {
        (0..n).map(|i| format!("f{i}")).collect()
    }

    fn counts(plan: &[PlanEntry]) -> HashMap<String, u32> {
        let mut map = HashMap::new();
        for entry in plan {
            *map.entry(entry.worker_id.clone()).or_insert(0) += 1;
        }
        map
    }

    fn planned(outcome: PlanOutcome) -> Vec<PlanEntry> {
        match outcome {
            PlanOutcome::Planned(entries) => entries,
            PlanOutcome::NoEligibleWorkers => panic!("expected a plan"),
        }
    }

    // ── Completeness ─────────────────────────────────────────────────

    #[test]
    fn one_entry_per_item_no_drops_no_duplicates() {
        let workers = vec![worker("w1", 2, None), worker("w2", 2, None)];
        let backlog = items(7);

        for policy in [AssignmentPolicy::RoundRobin, AssignmentPolicy::LoadBalanced] {
            let plan = planned(plan_assignments(&backlog, &workers, &HashMap::new(), policy));
            assert_eq!(plan.len(), 7);
            let planned_ids: Vec<&str> = plan.iter().map(|e| e.item_id.as_str()).collect();
            let expected: Vec<&str> = backlog.iter().map(|s| s.as_str()).collect();
            assert_eq!(planned_ids, expected);
        }
    }

    #[test]
    fn empty_backlog_plans_nothing() {
        let workers = vec![worker("w1", 2, None)];
        let outcome = plan_assignments(&[], &workers, &HashMap::new(), AssignmentPolicy::LoadBalanced);
        assert_eq!(outcome, PlanOutcome::Planned(Vec::new()));
    }

    #[test]
    fn no_active_workers_is_distinguishable() {
        let mut retired = worker("w1", 2, None);
        retired.is_active = false;
        let outcome = plan_assignments(
            &items(3),
            &[retired],
            &HashMap::new(),
            AssignmentPolicy::LoadBalanced,
        );
        assert_eq!(outcome, PlanOutcome::NoEligibleWorkers);
    }

    // ── Load-balanced ────────────────────────────────────────────────

    #[test]
    fn load_balanced_respects_capacity_at_planning_start() {
        let workers = vec![worker("a", 2, None), worker("b", 2, None)];
        let plan = planned(plan_assignments(
            &items(4),
            &workers,
            &HashMap::new(),
            AssignmentPolicy::LoadBalanced,
        ));

        let by_worker = counts(&plan);
        assert_eq!(by_worker.get("a"), Some(&2));
        assert_eq!(by_worker.get("b"), Some(&2));
    }

    #[test]
    fn load_balanced_prefers_less_loaded_worker() {
        let workers = vec![worker("a", 10, None), worker("b", 10, None)];
        let workload = HashMap::from([("a".to_string(), 3), ("b".to_string(), 0)]);

        let plan = planned(plan_assignments(
            &items(3),
            &workers,
            &workload,
            AssignmentPolicy::LoadBalanced,
        ));
        // b takes everything until it catches up to a's load.
        assert!(plan.iter().all(|e| e.worker_id == "b"));
    }

    #[test]
    fn load_balanced_spreads_within_one_pass() {
        let workers = vec![worker("a", 10, None), worker("b", 10, None)];
        let plan = planned(plan_assignments(
            &items(6),
            &workers,
            &HashMap::new(),
            AssignmentPolicy::LoadBalanced,
        ));

        let by_worker = counts(&plan);
        assert_eq!(by_worker.get("a"), Some(&3));
        assert_eq!(by_worker.get("b"), Some(&3));
    }

    #[test]
    fn overflow_falls_back_to_least_loaded_instead_of_dropping() {
        let workers = vec![worker("a", 2, None)];
        let workload = HashMap::from([("a".to_string(), 2)]);

        let plan = planned(plan_assignments(
            &items(1),
            &workers,
            &workload,
            AssignmentPolicy::LoadBalanced,
        ));
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].worker_id, "a");
    }

    #[test]
    fn overflow_still_picks_the_least_loaded_of_the_full_pool() {
        let workers = vec![worker("a", 1, None), worker("b", 1, None)];
        let workload = HashMap::from([("a".to_string(), 5), ("b".to_string(), 2)]);

        let plan = planned(plan_assignments(
            &items(2),
            &workers,
            &workload,
            AssignmentPolicy::LoadBalanced,
        ));
        assert!(plan.iter().all(|e| e.worker_id == "b"));
    }

    #[test]
    fn ties_break_to_never_assigned_then_oldest() {
        let workers = vec![
            worker("recent", 10, Some(900)),
            worker("older", 10, Some(100)),
            worker("fresh", 10, None),
        ];
        let plan = planned(plan_assignments(
            &items(3),
            &workers,
            &HashMap::new(),
            AssignmentPolicy::LoadBalanced,
        ));

        assert_eq!(plan[0].worker_id, "fresh");
        assert_eq!(plan[1].worker_id, "older");
        assert_eq!(plan[2].worker_id, "recent");
    }

    // ── Round-robin ──────────────────────────────────────────────────

    #[test]
    fn round_robin_is_fair_over_equal_loads() {
        let workers = vec![
            worker("a", 10, None),
            worker("b", 10, None),
            worker("c", 10, None),
        ];
        let plan = planned(plan_assignments(
            &items(9),
            &workers,
            &HashMap::new(),
            AssignmentPolicy::RoundRobin,
        ));

        let by_worker = counts(&plan);
        assert_eq!(by_worker.get("a"), Some(&3));
        assert_eq!(by_worker.get("b"), Some(&3));
        assert_eq!(by_worker.get("c"), Some(&3));
    }

    #[test]
    fn round_robin_order_is_fixed_at_planning_start() {
        // b starts less loaded, so the cycle is b, a, b, a, … even as b's
        // share grows past a's during the pass.
        let workers = vec![worker("a", 10, None), worker("b", 10, None)];
        let workload = HashMap::from([("a".to_string(), 1)]);

        let plan = planned(plan_assignments(
            &items(4),
            &workers,
            &workload,
            AssignmentPolicy::RoundRobin,
        ));
        let order: Vec<&str> = plan.iter().map(|e| e.worker_id.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "b", "a"]);
    }

    #[test]
    fn round_robin_ignores_capacity() {
        let workers = vec![worker("a", 1, None)];
        let workload = HashMap::from([("a".to_string(), 1)]);

        let plan = planned(plan_assignments(
            &items(3),
            &workers,
            &workload,
            AssignmentPolicy::RoundRobin,
        ));
        assert_eq!(plan.len(), 3);
        assert!(plan.iter().all(|e| e.worker_id == "a"));
    }

    #[test]
    fn round_robin_starts_with_longest_idle_on_ties() {
        let workers = vec![worker("recent", 10, Some(500)), worker("idle", 10, Some(10))];
        let plan = planned(plan_assignments(
            &items(2),
            &workers,
            &HashMap::new(),
            AssignmentPolicy::RoundRobin,
        ));
        assert_eq!(plan[0].worker_id, "idle");
        assert_eq!(plan[1].worker_id, "recent");
    }
}
