//! Plan commitment.
//!
//! Applies an assignment plan to the store as a sequence of bounded atomic
//! batches, invalidating the affected cache scopes after every chunk rather
//! than only at the end, so a crash after a partial commit leaves no stale
//! cached reads for the chunks that did land.

use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use tracing::{debug, error, warn};

use casedesk_store::{DocumentStore, StoreError, WorkerId, WriteOp};

use crate::planner::PlanEntry;
use crate::stats::{AdminCache, ASSIGN_STATS_PREFIX, FILES_LIST_PREFIX};

/// Why a commit stopped before processing the whole plan.
#[derive(Debug)]
pub enum CommitHalt {
    /// A chunk's batch write failed; later chunks were not attempted.
    BatchFailed(StoreError),
    /// The caller's deadline passed between chunks.
    DeadlineExceeded,
}

/// What a commit achieved, complete or not.
#[derive(Debug)]
pub struct CommitOutcome {
    /// Items durably assigned across all committed chunks.
    pub assigned_count: u32,
    /// Per-worker breakdown of the committed assignments.
    pub per_worker: HashMap<WorkerId, u32>,
    /// `None` when every chunk landed.
    pub halt: Option<CommitHalt>,
}

impl CommitOutcome {
    pub fn is_complete(&self) -> bool {
        self.halt.is_none()
    }
}

/// Applies plans to the store in chunks sized to the store's per-batch
/// ceiling, one atomic batch per chunk.
///
/// No automatic retry: blind retry of a partially-failed multi-item batch
/// could double-assign items that did commit. Retry is a caller policy,
/// and is safe at the item level because committed items are no longer
/// `Unassigned` and drop out of the next run's candidate set.
pub struct BatchCommitter<'a> {
    store: &'a dyn DocumentStore,
    cache: &'a AdminCache,
}

impl<'a> BatchCommitter<'a> {
    pub fn new(store: &'a dyn DocumentStore, cache: &'a AdminCache) -> Self {
        Self { store, cache }
    }

    /// Commit `plan`, stamping assignments with `at` (unix seconds).
    ///
    /// The deadline is checked between chunks only; a chunk commit is
    /// atomic and never interrupted mid-flight.
    pub fn commit(
        &self,
        plan: &[PlanEntry],
        at: u64,
        deadline: Option<Instant>,
    ) -> CommitOutcome {
        let chunk_size = self.store.max_batch_ops().max(1);
        let mut outcome = CommitOutcome {
            assigned_count: 0,
            per_worker: HashMap::new(),
            halt: None,
        };

        for chunk in plan.chunks(chunk_size) {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                warn!(
                    committed = outcome.assigned_count,
                    remaining = plan.len() as u32 - outcome.assigned_count,
                    "deadline passed, halting between chunks"
                );
                outcome.halt = Some(CommitHalt::DeadlineExceeded);
                break;
            }

            let ops = chunk_ops(chunk, at);
            match self.store.batch_write(&ops) {
                Ok(()) => {
                    outcome.assigned_count += chunk.len() as u32;
                    for entry in chunk {
                        *outcome.per_worker.entry(entry.worker_id.clone()).or_insert(0) += 1;
                    }
                    let invalidated = self.cache.delete_by_prefix(FILES_LIST_PREFIX)
                        + self.cache.delete_by_prefix(ASSIGN_STATS_PREFIX);
                    debug!(
                        chunk = chunk.len(),
                        committed = outcome.assigned_count,
                        invalidated,
                        "chunk committed"
                    );
                }
                Err(e) => {
                    error!(
                        error = %e,
                        committed = outcome.assigned_count,
                        "batch commit failed, halting"
                    );
                    outcome.halt = Some(CommitHalt::BatchFailed(e));
                    break;
                }
            }
        }
        outcome
    }
}

/// Build one chunk's batch: an assignment op per entry plus one coalesced
/// timestamp touch per distinct worker in the chunk.
fn chunk_ops(chunk: &[PlanEntry], at: u64) -> Vec<WriteOp> {
    let mut ops = Vec::with_capacity(chunk.len() * 2);
    let mut touched: BTreeSet<&str> = BTreeSet::new();
    for entry in chunk {
        ops.push(WriteOp::AssignItem {
            item_id: entry.item_id.clone(),
            worker_id: entry.worker_id.clone(),
            at,
        });
        touched.insert(entry.worker_id.as_str());
    }
    for worker_id in touched {
        ops.push(WriteOp::TouchWorker {
            worker_id: worker_id.to_string(),
            at,
        });
    }
    ops
}
