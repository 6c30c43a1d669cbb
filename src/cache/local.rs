//! Local bounded cache tier (in-memory).
//!
//! A strict LRU keyed on the BLAKE3 hash of the canonical URL, guarded by a
//! `parking_lot` mutex. Capacity-bounded (least-recently-read entry evicted
//! first) and time-bounded through each entry's absolute expiry; a read
//! refreshes recency but never the expiry deadline.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use super::types::CachedResponse;
use crate::hashing::hash_key;

/// In-process cache tier with (TTL, capacity) policy.
pub struct LocalCache {
    entries: Mutex<LruCache<[u8; 32], CachedResponse>>,
}

impl LocalCache {
    /// Creates a tier bounded by `capacity` entries. A zero capacity is
    /// clamped to one; configuration validation rejects it earlier.
    pub fn new(capacity: u64) -> Self {
        let capacity = NonZeroUsize::new(capacity as usize)
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Looks up a canonical URL key, refreshing its recency. Expired entries
    /// are dropped and reported absent.
    pub fn lookup(&self, key: &str) -> Option<CachedResponse> {
        let hash = hash_key(key);
        let mut entries = self.entries.lock();
        match entries.get(&hash) {
            Some(entry) if entry.is_expired() => {
                entries.pop(&hash);
                None
            }
            Some(entry) => Some(entry.clone()),
            None => None,
        }
    }

    /// Inserts an entry, replacing any previous one for the key wholesale.
    /// At capacity this evicts the least-recently-read entry.
    pub fn insert(&self, key: &str, entry: CachedResponse) {
        self.entries.lock().put(hash_key(key), entry);
    }

    /// Removes an entry by key.
    pub fn remove(&self, key: &str) -> Option<CachedResponse> {
        self.entries.lock().pop(&hash_key(key))
    }

    /// Returns `true` if the cache holds an unexpired entry for `key`,
    /// without touching recency.
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries
            .lock()
            .peek(&hash_key(key))
            .is_some_and(|entry| !entry.is_expired())
    }

    /// Number of cached entries (including any not yet observed as expired).
    pub fn len(&self) -> u64 {
        self.entries.lock().len() as u64
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Clears all entries.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}

impl std::fmt::Debug for LocalCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCache")
            .field("entries", &self.entries.lock().len())
            .finish()
    }
}

/// Shared handle to a [`LocalCache`].
#[derive(Clone)]
pub struct LocalCacheHandle {
    inner: Arc<LocalCache>,
}

impl LocalCacheHandle {
    pub fn new(capacity: u64) -> Self {
        Self {
            inner: Arc::new(LocalCache::new(capacity)),
        }
    }

    #[inline]
    pub fn lookup(&self, key: &str) -> Option<CachedResponse> {
        self.inner.lookup(key)
    }

    #[inline]
    pub fn insert(&self, key: &str, entry: CachedResponse) {
        self.inner.insert(key, entry)
    }

    #[inline]
    pub fn remove(&self, key: &str) -> Option<CachedResponse> {
        self.inner.remove(key)
    }

    #[inline]
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.contains_key(key)
    }

    #[inline]
    pub fn len(&self) -> u64 {
        self.inner.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    #[inline]
    pub fn clear(&self) {
        self.inner.clear()
    }

    #[inline]
    pub fn strong_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

impl std::fmt::Debug for LocalCacheHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalCacheHandle")
            .field("strong_count", &self.strong_count())
            .finish()
    }
}
