//! Showcase generation service
//!
//! Ties the cache, the capture orchestrator and the stores together. A
//! `generate_showcase` call is either a cache hit with no side effects, or a
//! miss that captures, caches and then persists in the background. Failed
//! generations never touch the cache.

use crate::automation::{EngineLauncher, RequestFilter};
use crate::cache::ShowcaseCache;
use crate::capture::{CaptureOrchestrator, HighlightOptions};
use crate::chrome::ChromeLauncher;
use crate::config::Config;
use crate::engine::EngineManager;
use crate::error::{ShowcaseError, ShowcaseResult};
use crate::metrics::Metrics;
use crate::model::{ShowcaseRecord, ShowcaseStats, ShowcaseSummary, SiteInfo};
use crate::session_pool::{SessionPool, SessionPoolStats};
use crate::store::{ArtifactStore, FileArtifactStore, SiteDirectory};
use crate::utils::validate_site_key;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Counts one unit of in-flight generation work for as long as it lives.
struct InFlightGuard<'a> {
    counter: &'a AtomicUsize,
}

impl<'a> InFlightGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self { counter }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Generates, caches and serves site showcases
///
/// # Examples
///
/// ```rust,no_run
/// use showcase_capture::{Config, HighlightOptions, InMemorySiteDirectory, ShowcaseService};
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let service = ShowcaseService::with_chrome(
///         Config::default(),
///         Arc::new(InMemorySiteDirectory::new()),
///     )?;
///
///     let record = service
///         .generate_showcase("joes-bakery", &HighlightOptions::default())
///         .await?;
///     println!("{} sections at {}", record.sections.len(), record.url);
///
///     service.shutdown().await?;
///     Ok(())
/// }
/// ```
pub struct ShowcaseService {
    config: Config,
    capture: CaptureOrchestrator,
    pool: Arc<SessionPool>,
    cache: ShowcaseCache,
    store: Arc<dyn ArtifactStore>,
    sites: Arc<dyn SiteDirectory>,
    in_flight: AtomicUsize,
    /// Background record writes, at most one per key.
    pending_writes: DashMap<String, JoinHandle<()>>,
    metrics: Arc<Metrics>,
}

impl ShowcaseService {
    pub fn new(
        config: Config,
        launcher: Arc<dyn EngineLauncher>,
        store: Arc<dyn ArtifactStore>,
        sites: Arc<dyn SiteDirectory>,
    ) -> ShowcaseResult<Self> {
        config.validate()?;

        let metrics = Arc::new(Metrics::new());
        let engine = Arc::new(EngineManager::new(launcher, metrics.clone()));
        let pool = Arc::new(SessionPool::new(
            engine,
            config.session_pool_size,
            RequestFilter::new(config.blocked_resources.iter().copied()),
            metrics.clone(),
        ));
        let capture =
            CaptureOrchestrator::new(pool.clone(), store.clone(), config.clone(), metrics.clone());
        let cache = ShowcaseCache::new(config.cache_ttl, config.cache_max_entries)
            .with_metrics(metrics.clone());

        info!(
            "Showcase service ready (idle pool: {}, cache: {} entries, ttl: {:?})",
            config.session_pool_size, config.cache_max_entries, config.cache_ttl
        );

        Ok(Self {
            config,
            capture,
            pool,
            cache,
            store,
            sites,
            in_flight: AtomicUsize::new(0),
            pending_writes: DashMap::new(),
            metrics,
        })
    }

    /// Service backed by headless Chromium and a file store under
    /// `config.storage_dir`.
    pub fn with_chrome(config: Config, sites: Arc<dyn SiteDirectory>) -> ShowcaseResult<Self> {
        let launcher = Arc::new(ChromeLauncher::new(config.clone()));
        let store = Arc::new(FileArtifactStore::new(config.storage_dir.clone()));
        Self::new(config, launcher, store, sites)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn capture(&self) -> &CaptureOrchestrator {
        &self.capture
    }

    pub fn cache(&self) -> &ShowcaseCache {
        &self.cache
    }

    /// Returns the cached showcase for `key`, or captures a new one.
    pub async fn generate_showcase(
        &self,
        key: &str,
        options: &HighlightOptions,
    ) -> ShowcaseResult<Arc<ShowcaseRecord>> {
        if let Some(record) = self.cache.get(key) {
            debug!("Cache hit for {}", key);
            return Ok(record);
        }
        debug!("Cache miss for {}", key);

        let _in_flight = InFlightGuard::new(&self.in_flight);
        let start_time = Instant::now();

        let result = self.build_record(key, options).await;
        self.metrics
            .record_generation(start_time.elapsed(), result.is_ok());

        match result {
            Ok(record) => {
                let record = self.cache.put(key, record);
                self.persist_record(key, record.clone());
                info!(
                    "Generated showcase for {} with {} sections in {:?}",
                    key,
                    record.sections.len(),
                    start_time.elapsed()
                );
                Ok(record)
            }
            Err(e) => {
                error!("Showcase generation failed for {}: {}", key, e);
                Err(ShowcaseError::generation(key, e))
            }
        }
    }

    async fn build_record(
        &self,
        key: &str,
        options: &HighlightOptions,
    ) -> ShowcaseResult<ShowcaseRecord> {
        validate_site_key(key)?;
        let site_url = self.config.site_url(key);

        let (highlights, metadata) = tokio::join!(
            self.capture.capture_highlights(key, &site_url, options),
            self.site_info(key)
        );

        Ok(ShowcaseRecord {
            subdomain: key.to_string(),
            sections: highlights?.sections,
            metadata,
            generated_at: Utc::now(),
            url: self.config.share_url(key),
        })
    }

    /// Best effort: unknown sites and directory errors get a placeholder.
    async fn site_info(&self, key: &str) -> SiteInfo {
        match self.sites.get_basic_info(key).await {
            Ok(Some(info)) => info,
            Ok(None) => SiteInfo::placeholder(key),
            Err(e) => {
                warn!("Site directory lookup for {} failed: {}", key, e);
                SiteInfo::placeholder(key)
            }
        }
    }

    /// Writes the record in the background. Failures are logged only.
    ///
    /// A newer write for the same key runs after the older one finishes, so
    /// the last generated record is the one left on disk.
    fn persist_record(&self, key: &str, record: Arc<ShowcaseRecord>) {
        self.pending_writes.retain(|_, handle| !handle.is_finished());

        let store = self.store.clone();
        let metrics = self.metrics.clone();
        let previous = self.pending_writes.remove(key).map(|(_, handle)| handle);
        let owned_key = key.to_string();

        let handle = tokio::spawn(async move {
            if let Some(previous) = previous {
                let _ = previous.await;
            }
            match store.write_record(&owned_key, &record).await {
                Ok(()) => debug!("Persisted showcase record for {}", owned_key),
                Err(e) => {
                    warn!("Failed to persist showcase record for {}: {}", owned_key, e);
                    metrics.record_persistence_failure();
                }
            }
        });
        self.pending_writes.insert(key.to_string(), handle);
    }

    /// Waits for the background record write of `key`, if one is running.
    async fn await_pending_write(&self, key: &str) {
        let Some((_, handle)) = self.pending_writes.remove(key) else {
            return;
        };
        if let Err(e) = handle.await {
            warn!("Background record write for {} did not finish: {}", key, e);
        }
    }

    /// Waits for every background record write started so far.
    pub async fn flush_pending_writes(&self) {
        let keys: Vec<String> = self
            .pending_writes
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for key in keys {
            self.await_pending_write(&key).await;
        }
    }

    /// Drops cached and persisted state for `key`, then regenerates it.
    pub async fn refresh_showcase(
        &self,
        key: &str,
        options: &HighlightOptions,
    ) -> ShowcaseResult<Arc<ShowcaseRecord>> {
        validate_site_key(key).map_err(|e| ShowcaseError::generation(key, e))?;

        self.cache.remove(key);
        self.await_pending_write(key).await;
        if let Err(e) = self.store.delete_all(key).await {
            warn!("Failed to delete persisted showcase for {}: {}", key, e);
        }

        info!("Refreshing showcase for {}", key);
        self.generate_showcase(key, options).await
    }

    /// Returns `false` when nothing is persisted for `key`.
    pub async fn delete_showcase(&self, key: &str) -> ShowcaseResult<bool> {
        validate_site_key(key)?;
        self.await_pending_write(key).await;

        if !self.store.exists(key).await? {
            debug!("No persisted showcase for {}", key);
            return Ok(false);
        }

        let removed = self.store.delete_all(key).await?;
        self.cache.remove(key);
        info!("Deleted showcase for {}", key);
        Ok(removed)
    }

    /// Summaries of every readable persisted showcase, newest first.
    pub async fn list_showcases(&self) -> ShowcaseResult<Vec<ShowcaseSummary>> {
        let keys = self.store.list_keys().await?;

        let mut summaries = Vec::with_capacity(keys.len());
        for key in keys {
            match self.store.read_record(&key).await {
                Ok(Some(record)) if !record.subdomain.is_empty() => {
                    summaries.push(record.summary())
                }
                Ok(_) => debug!("Skipping {}: no usable record", key),
                Err(e) => debug!("Skipping {}: {}", key, e),
            }
        }

        summaries.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        Ok(summaries)
    }

    /// Cached record if fresh, otherwise the persisted one.
    pub async fn get_showcase(&self, key: &str) -> ShowcaseResult<Arc<ShowcaseRecord>> {
        validate_site_key(key)?;

        if let Some(record) = self.cache.get(key) {
            return Ok(record);
        }
        match self.store.read_record(key).await? {
            Some(record) => Ok(Arc::new(record)),
            None => Err(ShowcaseError::NotFound(key.to_string())),
        }
    }

    pub async fn get_stats(&self) -> ShowcaseStats {
        ShowcaseStats {
            cache_size: self.cache.len(),
            in_flight_count: self.in_flight.load(Ordering::SeqCst),
            idle_pool_size: self.pool.idle_count().await,
            engine_active: self.pool.engine().is_active(),
        }
    }

    pub async fn pool_stats(&self) -> SessionPoolStats {
        self.pool.get_stats().await
    }

    /// Finishes background record writes, then closes pooled sessions and
    /// the engine. The service stays usable; the next capture launches a new
    /// engine.
    pub async fn shutdown(&self) -> ShowcaseResult<()> {
        info!("Shutting down showcase service");
        self.flush_pending_writes().await;
        self.pool.close_engine().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_guard_decrements_on_drop() {
        let counter = AtomicUsize::new(0);
        {
            let _a = InFlightGuard::new(&counter);
            let _b = InFlightGuard::new(&counter);
            assert_eq!(counter.load(Ordering::SeqCst), 2);
        }
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_in_flight_guard_survives_panic() {
        let counter = AtomicUsize::new(0);
        let result = std::panic::catch_unwind(|| {
            let _guard = InFlightGuard::new(&counter);
            panic!("capture blew up");
        });
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
