//! RedbStore — the embedded document-store adapter.
//!
//! Implements [`DocumentStore`] over redb with typed CRUD, capped listing
//! scans, atomic bounded batch writes, and an append-only audit log whose
//! sequence counter advances in the same transaction as the append.

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StoreError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StoreError::$variant(e.to_string())
    };
}

/// Per-batch ceiling on work-item operations, mirroring the managed
/// document store's atomic batch limit. Committers chunk plans to this.
pub const MAX_BATCH_OPS: usize = 500;

/// Hard cap on operations accepted by one `batch_write` call: a full chunk
/// of item updates plus one coalesced worker touch per entry always fits.
pub const MAX_BATCH_WRITE_OPS: usize = MAX_BATCH_OPS * 2;

/// The minimal storage abstraction the assignment engine consumes.
///
/// All listings take an explicit result cap; `batch_write` is all-or-nothing
/// per call. Implementations must be shareable across tasks.
pub trait DocumentStore: Send + Sync {
    /// Unassigned items in id order, at most `limit`.
    fn list_unassigned_items(&self, limit: u32) -> StoreResult<Vec<WorkItem>>;

    /// Items currently attributed to a worker (`Assigned` or `InProgress`),
    /// at most `limit`. A result of exactly `limit` rows may be truncated.
    fn list_in_flight_items(&self, limit: u32) -> StoreResult<Vec<WorkItem>>;

    fn get_item(&self, id: &str) -> StoreResult<Option<WorkItem>>;

    fn put_item(&self, item: &WorkItem) -> StoreResult<()>;

    /// Every worker, active or not.
    fn list_workers(&self) -> StoreResult<Vec<Worker>>;

    /// Only workers eligible for planning.
    fn list_active_workers(&self) -> StoreResult<Vec<Worker>>;

    fn get_worker(&self, id: &str) -> StoreResult<Option<Worker>>;

    fn put_worker(&self, worker: &Worker) -> StoreResult<()>;

    /// Apply the operations atomically: either every op lands or none do.
    /// Rejects batches larger than [`MAX_BATCH_WRITE_OPS`].
    fn batch_write(&self, ops: &[WriteOp]) -> StoreResult<()>;

    /// The per-batch ceiling on plan entries a committer may pack into one
    /// `batch_write` call.
    fn max_batch_ops(&self) -> usize {
        MAX_BATCH_OPS
    }

    /// Append an audit record, assigning its id. Returns the id.
    fn append_audit(&self, record: &AuditRecord) -> StoreResult<String>;

    /// Most recent audit records, newest first, at most `limit`.
    fn recent_audits(&self, limit: u32) -> StoreResult<Vec<AuditRecord>>;
}

/// Thread-safe document store backed by redb.
#[derive(Clone)]
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "document store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StoreResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory document store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StoreResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(WORK_ITEMS).map_err(map_err!(Table))?;
        txn.open_table(WORKERS).map_err(map_err!(Table))?;
        txn.open_table(AUDITS).map_err(map_err!(Table))?;
        txn.open_table(COUNTERS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Scan work items in key order, keeping those matching `keep`, up to
    /// `limit` results.
    fn scan_items<F>(&self, limit: u32, keep: F) -> StoreResult<Vec<WorkItem>>
    where
        F: Fn(&WorkItem) -> bool,
    {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(WORK_ITEMS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            if results.len() as u32 >= limit {
                break;
            }
            let (_, value) = entry.map_err(map_err!(Read))?;
            let item: WorkItem =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if keep(&item) {
                results.push(item);
            }
        }
        Ok(results)
    }

    fn scan_workers<F>(&self, keep: F) -> StoreResult<Vec<Worker>>
    where
        F: Fn(&Worker) -> bool,
    {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(WORKERS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let worker: Worker =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if keep(&worker) {
                results.push(worker);
            }
        }
        Ok(results)
    }
}

impl DocumentStore for RedbStore {
    fn list_unassigned_items(&self, limit: u32) -> StoreResult<Vec<WorkItem>> {
        self.scan_items(limit, |item| item.status == WorkItemStatus::Unassigned)
    }

    fn list_in_flight_items(&self, limit: u32) -> StoreResult<Vec<WorkItem>> {
        self.scan_items(limit, |item| item.status.is_in_flight())
    }

    fn get_item(&self, id: &str) -> StoreResult<Option<WorkItem>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(WORK_ITEMS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let item: WorkItem =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(item))
            }
            None => Ok(None),
        }
    }

    fn put_item(&self, item: &WorkItem) -> StoreResult<()> {
        let value = serde_json::to_vec(item).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(WORK_ITEMS).map_err(map_err!(Table))?;
            table
                .insert(item.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(item_id = %item.id, status = ?item.status, "work item stored");
        Ok(())
    }

    fn list_workers(&self) -> StoreResult<Vec<Worker>> {
        self.scan_workers(|_| true)
    }

    fn list_active_workers(&self) -> StoreResult<Vec<Worker>> {
        self.scan_workers(|worker| worker.is_active)
    }

    fn get_worker(&self, id: &str) -> StoreResult<Option<Worker>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(WORKERS).map_err(map_err!(Table))?;
        match table.get(id).map_err(map_err!(Read))? {
            Some(guard) => {
                let worker: Worker =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(worker))
            }
            None => Ok(None),
        }
    }

    fn put_worker(&self, worker: &Worker) -> StoreResult<()> {
        let value = serde_json::to_vec(worker).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(WORKERS).map_err(map_err!(Table))?;
            table
                .insert(worker.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(worker_id = %worker.id, active = worker.is_active, "worker stored");
        Ok(())
    }

    fn batch_write(&self, ops: &[WriteOp]) -> StoreResult<()> {
        if ops.len() > MAX_BATCH_WRITE_OPS {
            return Err(StoreError::BatchTooLarge {
                ops: ops.len(),
                max: MAX_BATCH_WRITE_OPS,
            });
        }
        if ops.is_empty() {
            return Ok(());
        }

        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut items = txn.open_table(WORK_ITEMS).map_err(map_err!(Table))?;
            let mut workers = txn.open_table(WORKERS).map_err(map_err!(Table))?;

            for op in ops {
                match op {
                    WriteOp::AssignItem {
                        item_id,
                        worker_id,
                        at,
                    } => {
                        let mut item = {
                            let guard = items.get(item_id.as_str()).map_err(map_err!(Read))?;
                            match guard {
                                Some(g) => serde_json::from_slice::<WorkItem>(g.value())
                                    .map_err(map_err!(Deserialize))?,
                                None => {
                                    return Err(StoreError::NotFound(format!(
                                        "work item {item_id}"
                                    )));
                                }
                            }
                        };
                        item.status = WorkItemStatus::Assigned;
                        item.assigned_worker_id = Some(worker_id.clone());
                        item.assigned_at = Some(*at);
                        item.updated_at = *at;
                        let value = serde_json::to_vec(&item).map_err(map_err!(Serialize))?;
                        items
                            .insert(item_id.as_str(), value.as_slice())
                            .map_err(map_err!(Write))?;
                    }
                    WriteOp::ClearAssignment { item_id, at } => {
                        let mut item = {
                            let guard = items.get(item_id.as_str()).map_err(map_err!(Read))?;
                            match guard {
                                Some(g) => serde_json::from_slice::<WorkItem>(g.value())
                                    .map_err(map_err!(Deserialize))?,
                                None => {
                                    return Err(StoreError::NotFound(format!(
                                        "work item {item_id}"
                                    )));
                                }
                            }
                        };
                        item.status = WorkItemStatus::Unassigned;
                        item.assigned_worker_id = None;
                        item.assigned_at = None;
                        item.updated_at = *at;
                        let value = serde_json::to_vec(&item).map_err(map_err!(Serialize))?;
                        items
                            .insert(item_id.as_str(), value.as_slice())
                            .map_err(map_err!(Write))?;
                    }
                    WriteOp::TouchWorker { worker_id, at } => {
                        let mut worker = {
                            let guard = workers.get(worker_id.as_str()).map_err(map_err!(Read))?;
                            match guard {
                                Some(g) => serde_json::from_slice::<Worker>(g.value())
                                    .map_err(map_err!(Deserialize))?,
                                None => {
                                    return Err(StoreError::NotFound(format!(
                                        "worker {worker_id}"
                                    )));
                                }
                            }
                        };
                        worker.last_assigned_at = Some(*at);
                        worker.updated_at = *at;
                        let value = serde_json::to_vec(&worker).map_err(map_err!(Serialize))?;
                        workers
                            .insert(worker_id.as_str(), value.as_slice())
                            .map_err(map_err!(Write))?;
                    }
                }
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(ops = ops.len(), "batch committed");
        Ok(())
    }

    fn append_audit(&self, record: &AuditRecord) -> StoreResult<String> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let id;
        {
            let mut counters = txn.open_table(COUNTERS).map_err(map_err!(Table))?;
            let seq = {
                let guard = counters.get("audit_seq").map_err(map_err!(Read))?;
                guard.map(|g| g.value()).unwrap_or(0) + 1
            };
            counters
                .insert("audit_seq", seq)
                .map_err(map_err!(Write))?;

            id = format!("run:{seq:08}");
            let mut stored = record.clone();
            stored.id = id.clone();
            let value = serde_json::to_vec(&stored).map_err(map_err!(Serialize))?;
            let mut audits = txn.open_table(AUDITS).map_err(map_err!(Table))?;
            audits
                .insert(id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%id, outcome = %record.outcome, "audit record appended");
        Ok(id)
    }

    fn recent_audits(&self, limit: u32) -> StoreResult<Vec<AuditRecord>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(AUDITS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        // Keys are zero-padded sequence numbers, so reverse key order is
        // newest-first.
        for entry in table.iter().map_err(map_err!(Read))?.rev() {
            if results.len() as u32 >= limit {
                break;
            }
            let (_, value) = entry.map_err(map_err!(Read))?;
            let record: AuditRecord =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> RedbStore {
        RedbStore::open_in_memory().unwrap()
    }

    fn seed_worker(store: &RedbStore, id: &str) {
        store.put_worker(&Worker::active(id, 100)).unwrap();
    }

    fn seed_item(store: &RedbStore, id: &str) {
        store.put_item(&WorkItem::unassigned(id, 100)).unwrap();
    }

    #[test]
    fn item_round_trip() {
        let store = test_store();
        seed_item(&store, "f1");

        let item = store.get_item("f1").unwrap().unwrap();
        assert_eq!(item.status, WorkItemStatus::Unassigned);
        assert_eq!(item.assigned_worker_id, None);
    }

    #[test]
    fn get_missing_item_returns_none() {
        let store = test_store();
        assert!(store.get_item("nope").unwrap().is_none());
    }

    #[test]
    fn unassigned_listing_filters_and_caps() {
        let store = test_store();
        for i in 0..5 {
            seed_item(&store, &format!("f{i}"));
        }
        // Assign one out of band.
        seed_worker(&store, "w1");
        store
            .batch_write(&[WriteOp::AssignItem {
                item_id: "f0".to_string(),
                worker_id: "w1".to_string(),
                at: 200,
            }])
            .unwrap();

        let unassigned = store.list_unassigned_items(10).unwrap();
        assert_eq!(unassigned.len(), 4);
        assert!(unassigned.iter().all(|i| i.status == WorkItemStatus::Unassigned));

        let capped = store.list_unassigned_items(2).unwrap();
        assert_eq!(capped.len(), 2);
        // Key order: f1 before f2.
        assert_eq!(capped[0].id, "f1");
        assert_eq!(capped[1].id, "f2");
    }

    #[test]
    fn active_worker_listing_excludes_inactive() {
        let store = test_store();
        seed_worker(&store, "w1");
        let mut retired = Worker::active("w2", 100);
        retired.is_active = false;
        store.put_worker(&retired).unwrap();

        let active = store.list_active_workers().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, "w1");

        let all = store.list_workers().unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn batch_assign_updates_item_and_worker() {
        let store = test_store();
        seed_item(&store, "f1");
        seed_worker(&store, "w1");

        store
            .batch_write(&[
                WriteOp::AssignItem {
                    item_id: "f1".to_string(),
                    worker_id: "w1".to_string(),
                    at: 500,
                },
                WriteOp::TouchWorker {
                    worker_id: "w1".to_string(),
                    at: 500,
                },
            ])
            .unwrap();

        let item = store.get_item("f1").unwrap().unwrap();
        assert_eq!(item.status, WorkItemStatus::Assigned);
        assert_eq!(item.assigned_worker_id.as_deref(), Some("w1"));
        assert_eq!(item.assigned_at, Some(500));

        let worker = store.get_worker("w1").unwrap().unwrap();
        assert_eq!(worker.last_assigned_at, Some(500));
    }

    #[test]
    fn batch_is_all_or_nothing() {
        let store = test_store();
        seed_item(&store, "f1");
        seed_worker(&store, "w1");

        let result = store.batch_write(&[
            WriteOp::AssignItem {
                item_id: "f1".to_string(),
                worker_id: "w1".to_string(),
                at: 500,
            },
            WriteOp::AssignItem {
                item_id: "ghost".to_string(),
                worker_id: "w1".to_string(),
                at: 500,
            },
        ]);
        assert!(matches!(result, Err(StoreError::NotFound(_))));

        // The first op must not have landed.
        let item = store.get_item("f1").unwrap().unwrap();
        assert_eq!(item.status, WorkItemStatus::Unassigned);
    }

    #[test]
    fn oversized_batch_is_rejected_before_writing() {
        let store = test_store();
        seed_worker(&store, "w1");
        let ops: Vec<WriteOp> = (0..MAX_BATCH_WRITE_OPS + 1)
            .map(|_| WriteOp::TouchWorker {
                worker_id: "w1".to_string(),
                at: 500,
            })
            .collect();

        let result = store.batch_write(&ops);
        assert!(matches!(result, Err(StoreError::BatchTooLarge { .. })));

        let worker = store.get_worker("w1").unwrap().unwrap();
        assert_eq!(worker.last_assigned_at, None);
    }

    #[test]
    fn clear_assignment_returns_item_to_pool() {
        let store = test_store();
        seed_item(&store, "f1");
        seed_worker(&store, "w1");
        store
            .batch_write(&[WriteOp::AssignItem {
                item_id: "f1".to_string(),
                worker_id: "w1".to_string(),
                at: 500,
            }])
            .unwrap();

        store
            .batch_write(&[WriteOp::ClearAssignment {
                item_id: "f1".to_string(),
                at: 600,
            }])
            .unwrap();

        let item = store.get_item("f1").unwrap().unwrap();
        assert_eq!(item.status, WorkItemStatus::Unassigned);
        assert_eq!(item.assigned_worker_id, None);
        assert_eq!(item.assigned_at, None);
        assert_eq!(item.updated_at, 600);
    }

    #[test]
    fn empty_batch_is_noop() {
        let store = test_store();
        store.batch_write(&[]).unwrap();
    }

    #[test]
    fn audit_ids_are_sequential_and_newest_first() {
        let store = test_store();
        let record = AuditRecord::new("load_balanced", 10, 10, Vec::new(), "completed", 100);

        let id1 = store.append_audit(&record).unwrap();
        let id2 = store.append_audit(&record).unwrap();
        assert_eq!(id1, "run:00000001");
        assert_eq!(id2, "run:00000002");

        let recent = store.recent_audits(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].id, id2);
        assert_eq!(recent[1].id, id1);

        let capped = store.recent_audits(1).unwrap();
        assert_eq!(capped.len(), 1);
        assert_eq!(capped[0].id, id2);
    }

    #[test]
    fn persistent_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("casedesk.redb");
        {
            let store = RedbStore::open(&path).unwrap();
            store.put_item(&WorkItem::unassigned("f1", 100)).unwrap();
        }
        let store = RedbStore::open(&path).unwrap();
        assert!(store.get_item("f1").unwrap().is_some());
    }

    #[test]
    fn in_flight_listing_sees_assigned_items() {
        let store = test_store();
        seed_item(&store, "f1");
        seed_item(&store, "f2");
        seed_worker(&store, "w1");
        store
            .batch_write(&[WriteOp::AssignItem {
                item_id: "f2".to_string(),
                worker_id: "w1".to_string(),
                at: 500,
            }])
            .unwrap();

        let in_flight = store.list_in_flight_items(10).unwrap();
        assert_eq!(in_flight.len(), 1);
        assert_eq!(in_flight[0].id, "f2");
    }
}
