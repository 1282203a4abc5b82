use metrics::{register_counter, register_histogram, Counter, Histogram};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

/// Capture engine counters and histograms.
///
/// Handles are registered against whatever recorder is installed when the
/// struct is created; with no recorder they are no-ops.
pub struct Metrics {
    pub cache_hits: Counter,
    pub cache_misses: Counter,
    pub cache_evictions: Counter,
    pub generations: Counter,
    pub generation_failures: Counter,
    pub generation_duration: Histogram,
    pub sessions_created: Counter,
    pub sessions_discarded: Counter,
    pub persistence_failures: Counter,
    pub engine_launches: Counter,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            cache_hits: register_counter!("showcase_cache_hits_total"),
            cache_misses: register_counter!("showcase_cache_misses_total"),
            cache_evictions: register_counter!("showcase_cache_evictions_total"),
            generations: register_counter!("showcase_generations_total"),
            generation_failures: register_counter!("showcase_generation_failures_total"),
            generation_duration: register_histogram!("showcase_generation_duration_seconds"),
            sessions_created: register_counter!("showcase_sessions_created_total"),
            sessions_discarded: register_counter!("showcase_sessions_discarded_total"),
            persistence_failures: register_counter!("showcase_persistence_failures_total"),
            engine_launches: register_counter!("showcase_engine_launches_total"),
        }
    }

    pub fn record_cache_lookup(&self, hit: bool) {
        if hit {
            self.cache_hits.increment(1);
        } else {
            self.cache_misses.increment(1);
        }
    }

    pub fn record_evictions(&self, count: usize) {
        if count > 0 {
            self.cache_evictions.increment(count as u64);
        }
    }

    pub fn record_generation(&self, duration: Duration, success: bool) {
        if success {
            self.generations.increment(1);
        } else {
            self.generation_failures.increment(1);
        }
        self.generation_duration.record(duration.as_secs_f64());
    }

    pub fn record_session_created(&self) {
        self.sessions_created.increment(1);
    }

    pub fn record_session_discarded(&self) {
        self.sessions_discarded.increment(1);
    }

    pub fn record_persistence_failure(&self) {
        self.persistence_failures.increment(1);
    }

    pub fn record_engine_launch(&self) {
        self.engine_launches.increment(1);
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Installs the global Prometheus recorder and its `/metrics` HTTP listener.
///
/// Must run inside a tokio runtime and before `Metrics::new`.
pub fn install_prometheus_exporter(addr: SocketAddr) -> Result<(), crate::ShowcaseError> {
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| crate::ShowcaseError::Configuration(e.to_string()))?;

    info!("Prometheus metrics listening on {}", addr);
    Ok(())
}
