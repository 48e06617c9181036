//! casedesk-cache — the in-process cache for expensive aggregate reads.
//!
//! A [`CacheStore`] is a bounded key/value cache with per-entry TTLs, strict
//! least-recently-used eviction, and prefix-based bulk invalidation. It is a
//! performance layer only: it is never the source of truth, it cannot fail,
//! and staleness is bounded by TTL plus explicit invalidation from write
//! paths.
//!
//! Keys are built hierarchically (`namespace:resource:param…`) so a write
//! path can clear a whole logical scope with one
//! [`CacheStore::delete_by_prefix`] call instead of enumerating every
//! parameter combination that was ever cached.

pub mod cache;

pub use cache::{CacheStats, CacheStore};
