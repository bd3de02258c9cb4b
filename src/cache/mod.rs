//! Capacity-bounded text cache with write-through persistence.
//! Eviction is FIFO by last write: reads never reorder entries, and
//! rewriting a key makes it the newest.

pub mod sqlite_store;

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::RwLock;
use tracing::{debug, warn};

pub use sqlite_store::{CacheStore, MemoryCacheStore, SqliteCacheStore, StoredEntry};

pub const FORECAST_NAMESPACE: &str = "forecast";
pub const TRANSLATION_NAMESPACE: &str = "translation";

struct CacheInner {
    entries: LruCache<String, String>,
    next_seq: u64,
}

pub struct BoundedCache {
    namespace: &'static str,
    inner: RwLock<CacheInner>,
    store: Arc<dyn CacheStore>,
}

impl BoundedCache {
    /// Build the cache and load its namespace from `store`, oldest first.
    /// A failed load starts empty.
    pub fn new(namespace: &'static str, capacity: usize, store: Arc<dyn CacheStore>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        let mut entries = LruCache::new(capacity);
        let mut next_seq = 1;

        match store.load(namespace) {
            Ok(stored) => {
                for entry in stored {
                    next_seq = next_seq.max(entry.seq + 1);
                    let key = entry.key.clone();
                    if let Some((evicted, _)) = entries.push(entry.key, entry.value) {
                        if evicted != key {
                            // Capacity shrank since the entries were written.
                            if let Err(e) = store.remove(namespace, &evicted) {
                                warn!(namespace, error = %e, "cache store remove failed");
                            }
                        }
                    }
                }
                debug!(namespace, loaded = entries.len(), "cache loaded");
            }
            Err(e) => {
                warn!(namespace, error = %e, "cache load failed, starting empty");
            }
        }

        Self {
            namespace,
            inner: RwLock::new(CacheInner { entries, next_seq }),
            store,
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.inner.read().entries.peek(key).cloned()
    }

    /// Insert or replace, evicting the oldest write when over capacity.
    /// Persistence failures are logged; the in-memory state stays authoritative.
    pub fn set(&self, key: &str, value: &str) {
        let mut inner = self.inner.write();
        let seq = inner.next_seq;
        inner.next_seq += 1;

        let evicted = match inner.entries.push(key.to_string(), value.to_string()) {
            Some((old_key, _)) if old_key != key => Some(old_key),
            _ => None,
        };

        if let Err(e) = self.store.upsert(self.namespace, key, value, seq) {
            warn!(namespace = self.namespace, error = %e, "cache store write failed");
        }
        if let Some(evicted) = evicted {
            debug!(namespace = self.namespace, key = %evicted, "cache entry evicted");
            if let Err(e) = self.store.remove(self.namespace, &evicted) {
                warn!(namespace = self.namespace, error = %e, "cache store remove failed");
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.read().entries.cap().get()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner.read().entries.contains(key)
    }
}
