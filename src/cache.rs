//! The shared, concurrency-safe response cache.
//!
//! `CacheStore` is the plain data structure (§3 of the design doc); `ProxyCache`
//! wraps it in the readers-writer gate described as the Cache Concurrency Gate.
//! Lookups may run in parallel with each other; admission and eviction are
//! mutually exclusive with everything else.

use crate::error::ProxyError;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// Bodies larger than this are never admitted to the cache.
pub const MAX_OBJECT_SIZE: usize = 102_400;
/// Total bytes the cache may hold across all entries at once.
pub const MAX_CACHE_SIZE: usize = 1_049_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    pub body: Bytes,
    pub size: usize,
    pub last_access: u64,
}

/// The fingerprint-to-object map plus capacity bookkeeping. Kept separate
/// from `ProxyCache` so its invariants (I1-I5) can be unit tested without
/// going through the async lock.
#[derive(Default)]
struct CacheStore {
    entries: HashMap<String, CacheEntry>,
    current_size: usize,
}

impl CacheStore {
    fn find(&self, query_key: &str) -> Option<&CacheEntry> {
        if let Some(entry) = self.entries.get(query_key) {
            return Some(entry);
        }
        if let Some(stripped) = query_key.strip_suffix('/') {
            return self.entries.get(stripped);
        }
        None
    }

    fn find_key(&self, query_key: &str) -> Option<String> {
        if self.entries.contains_key(query_key) {
            return Some(query_key.to_string());
        }
        if let Some(stripped) = query_key.strip_suffix('/') {
            if self.entries.contains_key(stripped) {
                return Some(stripped.to_string());
            }
        }
        None
    }

    fn evict_one(&mut self) -> Option<CacheEntry> {
        let victim_key = self
            .entries
            .values()
            .min_by_key(|e| e.last_access)
            .map(|e| e.key.clone())?;
        let victim = self.entries.remove(&victim_key)?;
        self.current_size -= victim.size;
        Some(victim)
    }

    fn insert(&mut self, entry: CacheEntry) {
        if let Some(old) = self.entries.remove(&entry.key) {
            self.current_size -= old.size;
        }
        self.current_size += entry.size;
        self.entries.insert(entry.key.clone(), entry);
    }
}

/// Shared process-wide cache handle. Cheap to clone: the store lives behind
/// an `Arc`, so every connection's pipeline holds an equally-valid handle.
#[derive(Clone)]
pub struct ProxyCache {
    store: Arc<RwLock<CacheStore>>,
    tick: Arc<AtomicU64>,
}

impl ProxyCache {
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(CacheStore::default())),
            tick: Arc::new(AtomicU64::new(0)),
        }
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Reader operation. Matches `query_key` exactly or, failing that, with
    /// its trailing slash stripped (the one normalization the gate performs).
    /// A hit refreshes `last_access` to a fresh tick before returning.
    pub async fn lookup(&self, query_key: &str) -> Option<Bytes> {
        {
            let store = self.store.read().await;
            if store.find(query_key).is_none() {
                return None;
            }
        }
        // Re-acquire for write to refresh last_access (§4.4 option (a): the
        // refresh is a write-visible effect taken under the writer side).
        let mut store = self.store.write().await;
        let key = store.find_key(query_key)?;
        let tick = self.next_tick();
        let entry = store.entries.get_mut(&key)?;
        entry.last_access = tick;
        debug!(key = %key, "cache hit");
        Some(entry.body.clone())
    }

    /// Mutator. No-op if `body` exceeds `MAX_OBJECT_SIZE`. Evicts the
    /// least-recently-used entry, one at a time, until there is room.
    /// A duplicate key replaces the existing entry rather than producing a
    /// second entry under the same key (preserving I4; see DESIGN.md).
    pub async fn admit(&self, key: &str, body: Bytes) {
        if body.len() > MAX_OBJECT_SIZE {
            let kind = ProxyError::AdmissionSkipped("object exceeds MAX_OBJECT_SIZE");
            debug!(key, size = body.len(), %kind);
            return;
        }

        let mut store = self.store.write().await;
        let incoming_size = body.len();

        while {
            let already_present = store.entries.get(key).map(|e| e.size).unwrap_or(0);
            store.current_size - already_present + incoming_size > MAX_CACHE_SIZE
        } {
            match store.evict_one() {
                Some(evicted) => debug!(key = %evicted.key, size = evicted.size, "evicted"),
                None => break,
            }
        }

        let tick = self.next_tick();
        store.insert(CacheEntry {
            key: key.to_string(),
            body,
            size: incoming_size,
            last_access: tick,
        });
    }

    pub async fn current_size(&self) -> usize {
        self.store.read().await.current_size
    }

    pub async fn len(&self) -> usize {
        self.store.read().await.entries.len()
    }
}

impl Default for ProxyCache {
    fn default() -> Self {
        Self::new()
    }
}
