use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use chrono::Utc;
use showcase_capture::{Config, ShowcaseCache, ShowcaseRecord, SiteInfo, ViewportSpec};
use std::time::Duration;

#[cfg(feature = "integration_benchmarks")]
use showcase_capture::{HighlightOptions, InMemorySiteDirectory, ScreenshotOptions, ShowcaseService};
#[cfg(feature = "integration_benchmarks")]
use std::sync::Arc;
#[cfg(feature = "integration_benchmarks")]
use tokio::runtime::Runtime;

// Fast settings for all benchmarks
fn configure_fast_group(group: &mut criterion::BenchmarkGroup<criterion::measurement::WallTime>) {
    group.warm_up_time(Duration::from_millis(500));
    group.measurement_time(Duration::from_millis(500));
    group.sample_size(20);
}

fn record(key: &str) -> ShowcaseRecord {
    ShowcaseRecord {
        subdomain: key.to_string(),
        sections: Vec::new(),
        metadata: SiteInfo::placeholder(key),
        generated_at: Utc::now(),
        url: format!("https://sites.local/showcase/{key}"),
    }
}

// === UNIT BENCHMARKS ===

fn benchmark_config(c: &mut Criterion) {
    let mut group = c.benchmark_group("config");
    configure_fast_group(&mut group);

    group.bench_function("creation_and_validation", |b| {
        b.iter(|| {
            let config = Config::default();
            let _ = black_box(config.validate());
        });
    });

    group.bench_function("viewport_parse", |b| {
        b.iter(|| {
            for spec in ["desktop", "mobile", "1280x720", "bogus"] {
                let _ = black_box(spec.parse::<ViewportSpec>());
            }
        });
    });

    group.finish();
}

fn benchmark_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("validation");
    configure_fast_group(&mut group);

    let test_urls = vec![
        "https://joes-bakery.sites.local",
        "http://example.com/path",
        "invalid-url",
    ];
    let test_keys = vec!["joes-bakery", "site42", "-bad-", "Upper_Case"];

    group.bench_function("url", |b| {
        b.iter(|| {
            for url in &test_urls {
                let _ = black_box(showcase_capture::validate_url(url));
            }
        });
    });

    group.bench_function("site_key", |b| {
        b.iter(|| {
            for key in &test_keys {
                let _ = black_box(showcase_capture::validate_site_key(key));
            }
        });
    });

    group.finish();
}

fn benchmark_cache(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache");
    configure_fast_group(&mut group);

    let warm = ShowcaseCache::new(Duration::from_secs(3600), 50);
    for i in 0..50 {
        warm.put(&format!("site-{i}"), record(&format!("site-{i}")));
    }

    group.bench_function("get_hit", |b| {
        b.iter(|| black_box(warm.get("site-25")));
    });

    group.bench_function("get_miss", |b| {
        b.iter(|| black_box(warm.get("missing")));
    });

    // every put on a full cache evicts the oldest entry
    group.bench_function("put_with_eviction", |b| {
        let mut i = 0usize;
        b.iter(|| {
            let key = format!("new-{i}");
            i += 1;
            black_box(warm.put(&key, record(&key)));
        });
    });

    group.bench_function("fill_past_capacity", |b| {
        let keys: Vec<String> = (0..100).map(|i| format!("site-{i}")).collect();
        b.iter_batched(
            || ShowcaseCache::new(Duration::from_secs(3600), 50),
            |cache| {
                for key in &keys {
                    cache.put(key, record(key));
                }
                black_box(cache.len())
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn benchmark_format_utilities(c: &mut Criterion) {
    let mut group = c.benchmark_group("format_utilities");
    configure_fast_group(&mut group);

    let test_durations = vec![Duration::from_millis(100), Duration::from_secs(5)];
    let test_byte_sizes = vec![1024, 1048576];
    let test_filenames = vec!["joes-bakery", "file with spaces", "file/with:slashes"];

    group.bench_function("format_duration", |b| {
        b.iter(|| {
            for duration in &test_durations {
                black_box(showcase_capture::format_duration(*duration));
            }
        });
    });

    group.bench_function("format_bytes", |b| {
        b.iter(|| {
            for size in &test_byte_sizes {
                black_box(showcase_capture::format_bytes(*size));
            }
        });
    });

    group.bench_function("sanitize_filename", |b| {
        b.iter(|| {
            for filename in &test_filenames {
                black_box(showcase_capture::sanitize_filename(filename));
            }
        });
    });

    group.finish();
}

// === INTEGRATION BENCHMARKS (require Chrome) ===

#[cfg(feature = "integration_benchmarks")]
fn bench_config() -> Config {
    Config {
        session_pool_size: 1,
        navigation_timeout: Duration::from_secs(10),
        site_url_template: "https://example.com/?site={key}".to_string(),
        storage_dir: std::env::temp_dir().join("showcase-capture-bench"),
        ..Default::default()
    }
}

#[cfg(feature = "integration_benchmarks")]
fn benchmark_real_world_screenshot(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("real_world_screenshot");
    configure_fast_group(&mut group);

    let service = ShowcaseService::with_chrome(
        bench_config(),
        Arc::new(InMemorySiteDirectory::new()),
    )
    .unwrap();

    // first iteration pays for the launch, later ones reuse the pooled page
    group.bench_function("single_url", |b| {
        b.iter(|| {
            rt.block_on(async {
                let result = service
                    .capture()
                    .capture_screenshot("https://example.com", &ScreenshotOptions::default())
                    .await;
                black_box(result.is_ok());
            })
        });
    });

    rt.block_on(async {
        let _ = service.shutdown().await;
    });
    group.finish();
}

#[cfg(feature = "integration_benchmarks")]
fn benchmark_showcase_generation(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("showcase_generation");
    configure_fast_group(&mut group);

    let service = ShowcaseService::with_chrome(
        bench_config(),
        Arc::new(InMemorySiteDirectory::new()),
    )
    .unwrap();

    group.bench_function("cold", |b| {
        b.iter(|| {
            rt.block_on(async {
                service.cache().clear();
                let result = service
                    .generate_showcase("bench-site", &HighlightOptions::default())
                    .await;
                black_box(result.is_ok());
            })
        });
    });

    group.bench_function("cached", |b| {
        b.iter(|| {
            rt.block_on(async {
                let result = service
                    .generate_showcase("bench-site", &HighlightOptions::default())
                    .await;
                black_box(result.is_ok());
            })
        });
    });

    rt.block_on(async {
        let _ = service.shutdown().await;
    });
    group.finish();
}

// === BENCHMARK GROUPS ===

criterion_group!(
    unit_benches,
    benchmark_config,
    benchmark_validation,
    benchmark_cache,
    benchmark_format_utilities,
);

#[cfg(feature = "integration_benchmarks")]
criterion_group!(
    integration_benches,
    benchmark_real_world_screenshot,
    benchmark_showcase_generation,
);

#[cfg(feature = "integration_benchmarks")]
criterion_main!(unit_benches, integration_benches);

#[cfg(not(feature = "integration_benchmarks"))]
criterion_main!(unit_benches);
