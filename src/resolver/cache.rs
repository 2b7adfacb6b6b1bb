//! Bounded LRU cache for resolved papers.
//!
//! An explicit object owned by the resolver, keyed by the canonical
//! identifier string. Callers wanting fresh data bypass the cache at the
//! call site (`ignore_cache`); the bypass path routes around lookup and
//! store-back rather than clearing entries.

use super::result::PaperResult;
use std::collections::HashMap;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug)]
struct CacheSlot {
    result: PaperResult,
    last_used: u64,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
}

#[derive(Debug)]
struct CacheInner {
    entries: HashMap<String, CacheSlot>,
    tick: u64,
    stats: CacheStats,
}

/// Process-local result cache. Lock-guarded so a concurrent host (e.g. a
/// web framework serving parallel requests) stays safe; duplicate
/// concurrent resolutions of the same identifier are not deduplicated.
#[derive(Debug)]
pub struct ResultCache {
    max_entries: usize,
    inner: Mutex<CacheInner>,
}

impl ResultCache {
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            max_entries: max_entries.max(1),
            inner: Mutex::new(CacheInner {
                entries: HashMap::new(),
                tick: 0,
                stats: CacheStats::default(),
            }),
        }
    }

    pub async fn get(&self, key: &str) -> Option<PaperResult> {
        let mut inner = self.inner.lock().await;
        inner.tick += 1;
        let tick = inner.tick;

        if let Some(slot) = inner.entries.get_mut(key) {
            slot.last_used = tick;
            let result = slot.result.clone();
            inner.stats.hits += 1;
            debug!("Cache hit for {}", key);
            Some(result)
        } else {
            inner.stats.misses += 1;
            debug!("Cache miss for {}", key);
            None
        }
    }

    pub async fn insert(&self, key: String, result: PaperResult) {
        let mut inner = self.inner.lock().await;
        inner.tick += 1;
        let tick = inner.tick;

        inner.entries.insert(key, CacheSlot {
            result,
            last_used: tick,
        });

        // Evict least-recently-used entries beyond the bound
        while inner.entries.len() > self.max_entries {
            let oldest = inner
                .entries
                .iter()
                .min_by_key(|(_, slot)| slot.last_used)
                .map(|(key, _)| key.clone());
            if let Some(oldest) = oldest {
                inner.entries.remove(&oldest);
                inner.stats.evictions += 1;
                debug!("Evicted cache entry {}", oldest);
            } else {
                break;
            }
        }
    }

    /// Drop a single entry (explicit invalidation)
    pub async fn invalidate(&self, key: &str) -> bool {
        let mut inner = self.inner.lock().await;
        inner.entries.remove(key).is_some()
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.entries.clear();
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.entries.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn stats(&self) -> CacheStats {
        self.inner.lock().await.stats
    }
}
