use lru::LruCache;
use std::{fmt, sync::Mutex};

use super::{CacheKey, QueryHandle};
use crate::{Result, common::verbose};

type EvictFn = Box<dyn Fn(QueryHandle) + Send + Sync>;

/// Bounded cache of parsed queries.
///
/// A borrowed handle is removed from the cache, so two statements never
/// share one. Returning it may evict the least recently used handles,
/// which are passed to the eviction hook to release their server side
/// statement.
pub struct QueryCache {
    inner: Mutex<Inner>,
    max_queries: usize,
    max_bytes: usize,
    on_evict: EvictFn,
}

struct Inner {
    lru: LruCache<CacheKey, QueryHandle>,
    bytes: usize,
}

impl QueryCache {
    pub fn new(
        max_queries: usize,
        max_bytes: usize,
        on_evict: impl Fn(QueryHandle) + Send + Sync + 'static,
    ) -> QueryCache {
        QueryCache {
            inner: Mutex::new(Inner { lru: LruCache::unbounded(), bytes: 0 }),
            max_queries,
            max_bytes,
            on_evict: Box::new(on_evict),
        }
    }

    /// Take the cached handle of `key`, or create it.
    pub fn borrow(
        &self,
        key: CacheKey,
        create: impl FnOnce(CacheKey) -> Result<QueryHandle>,
    ) -> Result<QueryHandle> {
        {
            let mut inner = self.lock();
            if let Some(handle) = inner.lru.pop(&key) {
                inner.bytes = inner.bytes.saturating_sub(handle.size());
                verbose!(sql = key.sql(), "query cache hit");
                return Ok(handle);
            }
        }
        verbose!(sql = key.sql(), "query cache miss");
        create(key)
    }

    /// Return a handle to the cache.
    pub fn release(&self, handle: QueryHandle) {
        let size = handle.size();
        if self.max_queries == 0 || self.max_bytes == 0 || size * 2 > self.max_bytes {
            // cache disabled, or a single entry would take half of it
            (self.on_evict)(handle);
            return;
        }

        let mut evicted = Vec::new();
        {
            let mut inner = self.lock();
            inner.bytes += size;
            if let Some(prev) = inner.lru.put(handle.key().clone(), handle) {
                inner.bytes = inner.bytes.saturating_sub(prev.size());
                evicted.push(prev);
            }
            while inner.lru.len() > self.max_queries || inner.bytes > self.max_bytes {
                let Some((_, old)) = inner.lru.pop_lru() else {
                    break;
                };
                inner.bytes = inner.bytes.saturating_sub(old.size());
                evicted.push(old);
            }
        }

        for handle in evicted {
            verbose!(sql = handle.key().sql(), "query cache evict");
            (self.on_evict)(handle);
        }
    }

    /// Number of cached handles.
    pub fn len(&self) -> usize {
        self.lock().lru.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Evict every cached handle.
    pub fn clear(&self) {
        let drained: Vec<_> = {
            let mut inner = self.lock();
            inner.bytes = 0;
            std::iter::from_fn(|| inner.lru.pop_lru().map(|(_, h)| h)).collect()
        };
        for handle in drained {
            (self.on_evict)(handle);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // a panic while holding the lock leaves the lru consistent
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("len", &self.len())
            .field("max_queries", &self.max_queries)
            .field("max_bytes", &self.max_bytes)
            .finish()
    }
}
