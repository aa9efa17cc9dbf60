use cacheward::adapters::memory::InMemoryCacheStore;
use cacheward::domain::errors::BackingStoreError;
use cacheward::domain::models::{CacheConfig, CacheKey, Lookup};
use cacheward::services::{ReadThroughCache, TtlJitterPolicy};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::sync::Arc;
use std::time::Duration;

fn bench_hit_path(c: &mut Criterion) {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let cache = ReadThroughCache::new(Arc::new(InMemoryCacheStore::new()), CacheConfig::default());
    let key = CacheKey::new("product", 1).unwrap();
    let loader = |_key: CacheKey| async { Ok::<_, BackingStoreError>(Lookup::Found(vec![1u64, 2, 3])) };

    runtime.block_on(async {
        cache.get(&key, &loader).await.unwrap();
    });

    c.bench_function("read_through_hit", |b| {
        b.to_async(&runtime)
            .iter(|| async { black_box(cache.get(&key, &loader).await.unwrap()) });
    });
}

fn bench_jitter(c: &mut Criterion) {
    let policy = TtlJitterPolicy::default();
    let base = Duration::from_secs(1800);

    c.bench_function("ttl_jitter", |b| {
        b.iter(|| black_box(policy.compute_ttl(black_box(base))));
    });
}

criterion_group!(benches, bench_hit_path, bench_jitter);
criterion_main!(benches);
