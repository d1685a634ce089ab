use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use lru::LruCache;
use parking_lot::Mutex;
use crate::search::results::SearchResults;

/// Per-snapshot cache of search results; disabled when the capacity is 0
pub struct QueryCache {
    cache: Option<Mutex<LruCache<QueryKey, Arc<SearchResults>>>>,
    size_limit: usize,
    hit_count: AtomicUsize,
    miss_count: AtomicUsize,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct QueryKey {
    pub query: String,
    pub limit: usize,
}

impl QueryKey {
    pub fn new(query: &str, limit: usize) -> Self {
        QueryKey { query: query.to_string(), limit }
    }
}

impl QueryCache {
    pub fn new(size_limit: usize) -> Self {
        QueryCache {
            cache: NonZeroUsize::new(size_limit).map(|cap| Mutex::new(LruCache::new(cap))),
            size_limit,
            hit_count: AtomicUsize::new(0),
            miss_count: AtomicUsize::new(0),
        }
    }

    pub fn get(&self, key: &QueryKey) -> Option<Arc<SearchResults>> {
        let cache = self.cache.as_ref()?;
        let found = cache.lock().get(key).cloned();
        match found {
            Some(results) => {
                self.hit_count.fetch_add(1, Ordering::Relaxed);
                Some(results)
            }
            None => {
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    pub fn put(&self, key: QueryKey, results: Arc<SearchResults>) {
        if let Some(cache) = &self.cache {
            cache.lock().put(key, results);
        }
    }

    pub fn clear(&self) {
        if let Some(cache) = &self.cache {
            cache.lock().clear();
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
            size: self.cache.as_ref().map(|c| c.lock().len()).unwrap_or(0),
            capacity: self.size_limit,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub hit_count: usize,
    pub miss_count: usize,
    pub size: usize,
    pub capacity: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}
