//! Cache engine benchmarks
//!
//! Covers put/get throughput for both variants, the cost of each replacement
//! policy under eviction pressure, striped versus wide locking under
//! contention, and the offline optimal analysis.
//!
//! Run with: `cargo bench --bench cache_bench -p stowage-cache`

use std::sync::Arc;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use stowage_cache::policy::optimal::OptimalPolicy;
use stowage_cache::{
    Attributes, Cache, CacheApi, CacheConfig, Concurrency, EvictionPolicy, LocalCache,
    LockGranularity,
};

// ============================================================================
// Basic Operations Benchmarks
// ============================================================================

fn bench_cache_put(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_put");

    for size in [100, 1000, 10_000] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("shared", size), &size, |b, &size| {
            let cache: Cache<u64, String> = Cache::new(CacheConfig::lru(size)).unwrap();
            let mut counter = 0u64;
            b.iter(|| {
                let _ = cache.put(black_box(counter), black_box(format!("value_{counter}")));
                counter = counter.wrapping_add(1);
            });
        });
        group.bench_with_input(BenchmarkId::new("local", size), &size, |b, &size| {
            let cache: LocalCache<u64, String> = LocalCache::new(CacheConfig::lru(size)).unwrap();
            let mut counter = 0u64;
            b.iter(|| {
                let _ = cache.put(black_box(counter), black_box(format!("value_{counter}")));
                counter = counter.wrapping_add(1);
            });
        });
    }

    group.finish();
}

fn bench_cache_get_hit(c: &mut Criterion) {
    let mut group = c.benchmark_group("cache_get_hit");

    for size in [100, 1000, 10_000] {
        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::new("lru", size), &size, |b, &size| {
            let cache: Cache<u64, String> = Cache::new(CacheConfig::lru(size)).unwrap();
            for i in 0..size as u64 {
                let _ = cache.put(i, format!("value_{i}"));
            }
            let mut counter = 0u64;
            b.iter(|| {
                let key = counter % (size as u64);
                let _ = black_box(cache.get(&black_box(key)));
                counter = counter.wrapping_add(1);
            });
        });
    }

    group.finish();
}

// ============================================================================
// Eviction Policy Benchmarks
// ============================================================================

fn bench_eviction_policies(c: &mut Criterion) {
    let mut group = c.benchmark_group("eviction_policies");
    let policies = [
        ("lru", EvictionPolicy::Lru),
        ("fifo", EvictionPolicy::Fifo),
        ("lfu", EvictionPolicy::Lfu),
        ("landlord", EvictionPolicy::Landlord),
    ];

    for (name, policy) in policies {
        group.bench_function(name, |b| {
            let config = CacheConfig::builder().max_entries(1000).eviction_policy(policy).build();
            let cache: LocalCache<u64, u64> = LocalCache::new(config).unwrap();
            let mut rng = StdRng::seed_from_u64(7);
            b.iter(|| {
                let key = rng.gen_range(0..4000u64);
                if cache.get(&key).ok().flatten().is_none() {
                    let attributes = Attributes::new()
                        .with_cost(f64::from(rng.gen_range(1..100u32)))
                        .with_size(rng.gen_range(1..16));
                    let _ = cache.put_with(key, key, attributes);
                }
            });
        });
    }

    group.finish();
}

// ============================================================================
// Concurrent Access Benchmarks
// ============================================================================

fn bench_lock_granularity(c: &mut Criterion) {
    let mut group = c.benchmark_group("lock_granularity");
    let layouts =
        [("wide", LockGranularity::Wide), ("striped_16", LockGranularity::Striped { stripes: 16 })];

    for (name, granularity) in layouts {
        group.throughput(Throughput::Elements(4 * 1000));
        group.bench_function(name, |b| {
            let config = CacheConfig::builder()
                .max_entries(2000)
                .concurrency(Concurrency::Synchronized(granularity))
                .build();
            let cache: Arc<Cache<u64, u64>> = Arc::new(Cache::new(config).unwrap());
            b.iter(|| {
                let handles: Vec<_> = (0..4u64)
                    .map(|worker| {
                        let cache = Arc::clone(&cache);
                        thread::spawn(move || {
                            for i in 0..1000u64 {
                                let key = (i * 17 + worker) % 3000;
                                if i % 4 == 0 {
                                    let _ = cache.put(key, i);
                                } else {
                                    let _ = black_box(cache.get(&key));
                                }
                            }
                        })
                    })
                    .collect();
                for handle in handles {
                    let _ = handle.join();
                }
            });
        });
    }

    group.finish();
}

// ============================================================================
// Offline Analysis Benchmarks
// ============================================================================

fn bench_optimal_analysis(c: &mut Criterion) {
    let mut group = c.benchmark_group("optimal_analysis");

    for len in [1_000usize, 10_000] {
        let mut rng = StdRng::seed_from_u64(11);
        let trace: Vec<u32> = (0..len).map(|_| rng.gen_range(0..500)).collect();
        group.throughput(Throughput::Elements(len as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &trace, |b, trace| {
            b.iter(|| {
                let mut optimal = OptimalPolicy::new(64);
                optimal.access(trace.iter().copied());
                black_box(optimal.hit_ratio())
            });
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_cache_put,
    bench_cache_get_hit,
    bench_eviction_policies,
    bench_lock_granularity,
    bench_optimal_analysis
);
criterion_main!(benches);
