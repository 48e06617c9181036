//! casedesk-store — the document-store boundary for CaseDesk.
//!
//! The assignment engine consumes a minimal storage abstraction, the
//! [`DocumentStore`] trait: capped listings of work items and workers,
//! atomic bounded batch writes, and an append-only audit log. [`RedbStore`]
//! implements it over [redb](https://docs.rs/redb) with on-disk and
//! in-memory backends (the latter for tests).
//!
//! # Architecture
//!
//! Domain records are explicit serde types, JSON-serialized into redb's
//! `&[u8]` value columns. Optional document fields receive their documented
//! defaults here, at the adapter boundary, so business logic never deals in
//! missing fields. Batch writes are one redb write transaction per call:
//! all-or-nothing, capped at the managed store's per-batch op ceiling.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StoreError, StoreResult};
pub use store::{DocumentStore, RedbStore, MAX_BATCH_OPS, MAX_BATCH_WRITE_OPS};
pub use types::*;
