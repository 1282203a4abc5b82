//! In-memory showcase cache with TTL expiry and a cap on entry count.
//!
//! Expired entries are misses but stay in the map until `cleanup`, which
//! runs on every `put`: first every expired entry is dropped, then the oldest
//! entries by insertion time until the cap is respected.

use crate::metrics::Metrics;
use crate::model::ShowcaseRecord;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub record: Arc<ShowcaseRecord>,
    pub cached_at: Instant,
    /// Insertion order, breaks ties between equal timestamps
    seq: u64,
}

#[derive(Default)]
struct CacheInner {
    entries: HashMap<String, CacheEntry>,
    next_seq: u64,
}

pub struct ShowcaseCache {
    inner: Mutex<CacheInner>,
    ttl: Duration,
    max_entries: usize,
    metrics: Option<Arc<Metrics>>,
}

impl ShowcaseCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(CacheInner::default()),
            ttl,
            max_entries,
            metrics: None,
        }
    }

    /// Reports hits, misses and evictions to `metrics`.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the record for `key` if it is younger than the TTL.
    pub fn get(&self, key: &str) -> Option<Arc<ShowcaseRecord>> {
        let now = Instant::now();
        let hit = self
            .lock()
            .entries
            .get(key)
            .filter(|entry| now.duration_since(entry.cached_at) < self.ttl)
            .map(|entry| entry.record.clone());

        if let Some(metrics) = &self.metrics {
            metrics.record_cache_lookup(hit.is_some());
        }
        hit
    }

    /// Inserts or replaces the record for `key`, then runs `cleanup`.
    pub fn put(&self, key: &str, record: ShowcaseRecord) -> Arc<ShowcaseRecord> {
        let record = Arc::new(record);
        let mut inner = self.lock();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.entries.insert(
            key.to_string(),
            CacheEntry {
                record: record.clone(),
                cached_at: Instant::now(),
                seq,
            },
        );
        self.cleanup_locked(&mut inner);
        record
    }

    /// Drops expired entries, then the oldest entries beyond the cap.
    /// Returns the number of entries removed.
    pub fn cleanup(&self) -> usize {
        let mut inner = self.lock();
        self.cleanup_locked(&mut inner)
    }

    fn cleanup_locked(&self, inner: &mut CacheInner) -> usize {
        let now = Instant::now();
        let before = inner.entries.len();

        inner
            .entries
            .retain(|_, entry| now.duration_since(entry.cached_at) < self.ttl);
        let expired = before - inner.entries.len();

        let mut evicted = 0;
        if inner.entries.len() > self.max_entries {
            let mut by_age: Vec<(Instant, u64, String)> = inner
                .entries
                .iter()
                .map(|(key, entry)| (entry.cached_at, entry.seq, key.clone()))
                .collect();
            by_age.sort();

            let excess = inner.entries.len() - self.max_entries;
            for (_, _, key) in by_age.into_iter().take(excess) {
                inner.entries.remove(&key);
                evicted += 1;
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.record_evictions(expired + evicted);
        }
        if expired + evicted > 0 {
            debug!(
                "Cache cleanup removed {} expired and {} excess entries",
                expired, evicted
            );
        }
        expired + evicted
    }

    pub fn remove(&self, key: &str) -> bool {
        self.lock().entries.remove(key).is_some()
    }

    pub fn clear(&self) {
        self.lock().entries.clear();
    }

    /// Number of stored entries, including expired ones not yet cleaned up.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().entries.keys().cloned().collect()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::SiteInfo;
    use chrono::Utc;

    fn record(key: &str) -> ShowcaseRecord {
        ShowcaseRecord {
            subdomain: key.to_string(),
            sections: Vec::new(),
            metadata: SiteInfo::placeholder(key),
            generated_at: Utc::now(),
            url: format!("https://sites.local/showcase/{key}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_boundary() {
        let cache = ShowcaseCache::new(Duration::from_millis(1000), 10);
        cache.put("site-a", record("site-a"));

        tokio::time::advance(Duration::from_millis(999)).await;
        assert!(cache.get("site-a").is_some());

        tokio::time::advance(Duration::from_millis(2)).await;
        assert!(cache.get("site-a").is_none());

        // expired entries linger until cleanup
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.cleanup(), 1);
        assert!(cache.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_keeps_most_recent() {
        let cache = ShowcaseCache::new(Duration::from_secs(60), 3);
        for i in 0..5 {
            cache.put(&format!("site-{i}"), record(&format!("site-{i}")));
        }

        assert_eq!(cache.len(), 3);
        let mut keys = cache.keys();
        keys.sort();
        assert_eq!(keys, vec!["site-2", "site-3", "site-4"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_then_ttl_scenario() {
        let cache = ShowcaseCache::new(Duration::from_millis(1000), 2);

        cache.put("site-a", record("site-a"));
        tokio::time::advance(Duration::from_millis(100)).await;
        cache.put("site-b", record("site-b"));
        tokio::time::advance(Duration::from_millis(100)).await;
        cache.put("site-c", record("site-c"));

        assert!(cache.get("site-a").is_none());
        assert!(cache.get("site-b").is_some());
        assert!(cache.get("site-c").is_some());

        tokio::time::advance(Duration::from_millis(1100)).await;
        assert!(cache.get("site-b").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_put_replaces_and_refreshes_timestamp() {
        let cache = ShowcaseCache::new(Duration::from_millis(1000), 10);
        cache.put("site-a", record("site-a"));
        tokio::time::advance(Duration::from_millis(800)).await;

        let replacement = cache.put("site-a", record("site-a"));
        tokio::time::advance(Duration::from_millis(800)).await;

        let hit = cache.get("site-a").unwrap();
        assert!(Arc::ptr_eq(&hit, &replacement));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remove_and_clear() {
        let cache = ShowcaseCache::new(Duration::from_secs(5), 10);
        cache.put("site-a", record("site-a"));
        cache.put("site-b", record("site-b"));

        assert!(cache.remove("site-a"));
        assert!(!cache.remove("site-a"));
        cache.clear();
        assert!(cache.is_empty());
    }
}
