//! Bounded TTL cache with LRU eviction and prefix invalidation.
//!
//! Entries live in a slot arena threaded with an intrusive doubly-linked
//! list (most-recently-used at the head), indexed by a key → slot map, so
//! touch and evict are O(1) regardless of entry count. A single mutex guards
//! the whole structure; critical sections are small.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

/// Sentinel slot index for "no neighbor".
const NIL: usize = usize::MAX;

struct Entry<T> {
    key: String,
    value: T,
    expires_at: Instant,
    prev: usize,
    next: usize,
}

struct Inner<T> {
    /// Key → slot index.
    map: HashMap<String, usize>,
    /// Slot arena; `None` slots are on the free list.
    slots: Vec<Option<Entry<T>>>,
    /// Reusable slot indices.
    free: Vec<usize>,
    /// Most-recently-used slot, or `NIL` when empty.
    head: usize,
    /// Least-recently-used slot, or `NIL` when empty.
    tail: usize,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Accumulated cache statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

/// Thread-safe bounded TTL cache with strict LRU eviction.
///
/// Both `get` and `set` count as access for LRU purposes. Expired entries
/// are treated as absent and purged eagerly on lookup. Returned values are
/// clones, read-only snapshots; callers never hold references into the
/// cache's backing storage.
///
/// Capacity is a fixed entry count, not a byte size: entries are small
/// structured aggregates, not raw file bytes.
pub struct CacheStore<T> {
    inner: Mutex<Inner<T>>,
    max_entries: usize,
}

impl<T: Clone> CacheStore<T> {
    /// Create a cache holding at most `max_entries` entries.
    ///
    /// A capacity of zero yields a cache that accepts writes and retains
    /// nothing.
    pub fn new(max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                map: HashMap::new(),
                slots: Vec::new(),
                free: Vec::new(),
                head: NIL,
                tail: NIL,
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
            max_entries,
        }
    }

    /// Look up a key, returning a snapshot of the value if present and
    /// unexpired. A hit marks the entry most-recently-used; an expired
    /// entry is purged and counted as a miss.
    pub fn get(&self, key: &str) -> Option<T> {
        let mut inner = self.lock();
        let idx = match inner.map.get(key).copied() {
            Some(idx) => idx,
            None => {
                inner.misses += 1;
                return None;
            }
        };

        let expired = inner.entry(idx).expires_at <= Instant::now();
        if expired {
            inner.remove_slot(idx);
            inner.misses += 1;
            debug!(%key, "cache entry expired, purged");
            return None;
        }

        inner.detach(idx);
        inner.push_front(idx);
        inner.hits += 1;
        Some(inner.entry(idx).value.clone())
    }

    /// Insert or replace an entry with `expires_at = now + ttl` and mark it
    /// most-recently-used. Evicts least-recently-used entries until the
    /// cache is within its capacity bound. Always succeeds.
    pub fn set(&self, key: &str, value: T, ttl: Duration) {
        let expires_at = Instant::now() + ttl;
        let mut inner = self.lock();

        if let Some(idx) = inner.map.get(key).copied() {
            let entry = inner.entry_mut(idx);
            entry.value = value;
            entry.expires_at = expires_at;
            inner.detach(idx);
            inner.push_front(idx);
            return;
        }

        let idx = inner.alloc(Entry {
            key: key.to_string(),
            value,
            expires_at,
            prev: NIL,
            next: NIL,
        });
        inner.map.insert(key.to_string(), idx);
        inner.push_front(idx);

        while inner.map.len() > self.max_entries {
            let tail = inner.tail;
            let evicted_key = inner.entry(tail).key.clone();
            inner.remove_slot(tail);
            inner.evictions += 1;
            debug!(key = %evicted_key, "cache LRU eviction");
        }
    }

    /// Remove a single entry. Returns whether it existed.
    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.lock();
        match inner.map.get(key).copied() {
            Some(idx) => {
                inner.remove_slot(idx);
                true
            }
            None => false,
        }
    }

    /// Remove every entry whose key starts with `prefix`. Returns the count
    /// removed. This is how write paths invalidate an entire logical scope
    /// without knowing every exact key that was cached under it.
    pub fn delete_by_prefix(&self, prefix: &str) -> usize {
        let mut inner = self.lock();
        let doomed: Vec<usize> = inner
            .map
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(_, &idx)| idx)
            .collect();
        for idx in &doomed {
            inner.remove_slot(*idx);
        }
        if !doomed.is_empty() {
            debug!(%prefix, removed = doomed.len(), "cache prefix invalidation");
        }
        doomed.len()
    }

    /// Number of live entries (expired-but-unpurged entries count until
    /// their next lookup).
    pub fn len(&self) -> usize {
        self.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().map.is_empty()
    }

    /// Current hit/miss/eviction counters.
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        CacheStats {
            hits: inner.hits,
            misses: inner.misses,
            evictions: inner.evictions,
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<T>> {
        // A panic while holding the lock cannot leave entries half-linked:
        // every mutation completes before the guard drops. Recover instead
        // of propagating poison.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ── Slot arena + intrusive list plumbing ───────────────────────────

impl<T> Inner<T> {
    fn entry(&self, idx: usize) -> &Entry<T> {
        self.slots[idx].as_ref().expect("occupied slot")
    }

    fn entry_mut(&mut self, idx: usize) -> &mut Entry<T> {
        self.slots[idx].as_mut().expect("occupied slot")
    }

    fn alloc(&mut self, entry: Entry<T>) -> usize {
        match self.free.pop() {
            Some(idx) => {
                self.slots[idx] = Some(entry);
                idx
            }
            None => {
                self.slots.push(Some(entry));
                self.slots.len() - 1
            }
        }
    }

    /// Unlink a slot from the recency list without freeing it.
    fn detach(&mut self, idx: usize) {
        let (prev, next) = {
            let entry = self.entry(idx);
            (entry.prev, entry.next)
        };
        if prev != NIL {
            self.entry_mut(prev).next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.entry_mut(next).prev = prev;
        } else {
            self.tail = prev;
        }
    }

    /// Link a detached slot in at the most-recently-used end.
    fn push_front(&mut self, idx: usize) {
        let old_head = self.head;
        {
            let entry = self.entry_mut(idx);
            entry.prev = NIL;
            entry.next = old_head;
        }
        if old_head != NIL {
            self.entry_mut(old_head).prev = idx;
        } else {
            self.tail = idx;
        }
        self.head = idx;
    }

    /// Unlink a slot, drop its entry, and recycle the slot index.
    fn remove_slot(&mut self, idx: usize) {
        self.detach(idx);
        let entry = self.slots[idx].take().expect("occupied slot");
        self.map.remove(&entry.key);
        self.free.push(idx);
    }
}
