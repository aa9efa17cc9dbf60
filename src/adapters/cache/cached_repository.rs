//! Cached wrapper for any [`WritableBackingStore`].
//!
//! Lookups are served by a [`ReadThroughCache`] and writes by a
//! [`WriteInvalidationCoordinator`] sharing the same cache store and
//! counters, so the decorator can stand in wherever the inner store is used.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::domain::errors::CacheResult;
use crate::domain::models::{CacheConfig, CacheKey, Lookup};
use crate::domain::ports::{CacheStore, StoreLoader, WritableBackingStore};
use crate::services::metrics::MetricsSnapshot;
use crate::services::read_through::ReadThroughCache;
use crate::services::write_invalidation::{PutReport, WriteInvalidationCoordinator};

/// Cached repository decorator.
pub struct CachedRepository<S: WritableBackingStore> {
    inner: Arc<S>,
    loader: StoreLoader<S>,
    reads: ReadThroughCache,
    writes: WriteInvalidationCoordinator,
}

impl<S> CachedRepository<S>
where
    S: WritableBackingStore + 'static,
    S::Value: Serialize + DeserializeOwned + Sync,
{
    pub fn new(inner: Arc<S>, cache: Arc<dyn CacheStore>, config: CacheConfig) -> Self {
        Self::from_parts(
            Arc::clone(&inner),
            ReadThroughCache::new(Arc::clone(&cache), config.clone()),
            cache,
            config,
        )
    }

    /// Build around an engine that was already customised, e.g. with a
    /// sentinel gate.
    pub fn from_parts(
        inner: Arc<S>,
        reads: ReadThroughCache,
        cache: Arc<dyn CacheStore>,
        config: CacheConfig,
    ) -> Self {
        let writes =
            WriteInvalidationCoordinator::new(cache, config).with_metrics(reads.shared_metrics());
        Self {
            loader: StoreLoader::new(Arc::clone(&inner)),
            inner,
            reads,
            writes,
        }
    }

    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.reads.metrics()
    }

    pub async fn get(&self, key: &CacheKey) -> CacheResult<Lookup<S::Value>> {
        self.reads.get(key, &self.loader).await
    }

    /// Write through to the inner store, then evict.
    pub async fn save(&self, key: &CacheKey, value: S::Value) -> CacheResult<PutReport<()>> {
        self.writes
            .put_with_report(key, self.inner.save(key, value))
            .await
    }

    pub async fn remove(&self, key: &CacheKey) -> CacheResult<PutReport<()>> {
        self.writes
            .put_with_report(key, self.inner.remove(key))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{InMemoryBackingStore, InMemoryCacheStore};
    use crate::domain::errors::CacheError;

    fn key(id: u32) -> CacheKey {
        CacheKey::new("user", id).unwrap()
    }

    fn repository() -> (
        CachedRepository<InMemoryBackingStore<String>>,
        Arc<InMemoryBackingStore<String>>,
        InMemoryCacheStore,
    ) {
        let inner = InMemoryBackingStore::new().shared();
        let cache = InMemoryCacheStore::new();
        let repo = CachedRepository::new(
            Arc::clone(&inner),
            Arc::new(cache.clone()),
            CacheConfig::default(),
        );
        (repo, inner, cache)
    }

    #[tokio::test]
    async fn test_reads_are_cached() {
        let (repo, inner, _) = repository();
        inner.seed(key(1), "ada".to_string()).await;

        assert_eq!(repo.get(&key(1)).await.unwrap(), Lookup::Found("ada".to_string()));
        assert_eq!(repo.get(&key(1)).await.unwrap(), Lookup::Found("ada".to_string()));
        assert_eq!(inner.load_count(), 1);
    }

    #[tokio::test]
    async fn test_save_invalidates_cached_value() {
        let (repo, inner, _) = repository();
        inner.seed(key(1), "ada".to_string()).await;
        repo.get(&key(1)).await.unwrap();

        let report = repo.save(&key(1), "grace".to_string()).await.unwrap();
        assert!(report.is_consistent());

        assert_eq!(repo.get(&key(1)).await.unwrap(), Lookup::Found("grace".to_string()));
        assert_eq!(inner.load_count(), 2);
        assert_eq!(repo.metrics().evictions, 1);
    }

    #[tokio::test]
    async fn test_remove_replaces_value_with_not_found() {
        let (repo, inner, _) = repository();
        inner.seed(key(1), "ada".to_string()).await;
        repo.get(&key(1)).await.unwrap();

        repo.remove(&key(1)).await.unwrap();
        assert_eq!(repo.get(&key(1)).await.unwrap(), Lookup::NotFound);
    }

    #[tokio::test]
    async fn test_rejected_write_keeps_cached_value() {
        let (repo, inner, cache) = repository();
        inner.seed(key(1), "ada".to_string()).await;
        repo.get(&key(1)).await.unwrap();
        inner.set_fail_writes(true);

        let result = repo.save(&key(1), "grace".to_string()).await;
        assert!(matches!(result, Err(CacheError::BackingStore(_))));
        assert_eq!(cache.len(), 1);
        assert_eq!(repo.get(&key(1)).await.unwrap(), Lookup::Found("ada".to_string()));
    }
}
