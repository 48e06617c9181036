//! redb table definitions for the CaseDesk document store.
//!
//! Work items and workers use `&str` keys (the record id) and `&[u8]`
//! values (JSON-serialized domain types). Audit records use zero-padded
//! sequence keys (`run:{seq:08}`) so key order is append order.

use redb::TableDefinition;

/// Work items keyed by `{item_id}`.
pub const WORK_ITEMS: TableDefinition<&str, &[u8]> = TableDefinition::new("work_items");

/// Workers keyed by `{worker_id}`.
pub const WORKERS: TableDefinition<&str, &[u8]> = TableDefinition::new("workers");

/// Assignment-run audit records keyed by `run:{seq:08}`.
pub const AUDITS: TableDefinition<&str, &[u8]> = TableDefinition::new("audits");

/// Monotonic counters (currently only `audit_seq`).
pub const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");
