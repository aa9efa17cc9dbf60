//! Write path: update the backing store, then evict the cache entry.
//!
//! The entry is deleted, never overwritten, so two racing writers cannot
//! leave the older value behind as the cached "last write"; the next read
//! reloads the authoritative row. A failed eviction is retried with
//! exponential backoff and, once retries run out, reported as a
//! [`ConsistencyWarning`]: the write itself still succeeded.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use std::future::Future;
use std::sync::Arc;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::domain::errors::{BackingStoreError, CacheResult, CacheStoreError, ConsistencyWarning};
use crate::domain::models::{CacheConfig, CacheKey};
use crate::domain::ports::CacheStore;
use crate::services::metrics::{CacheMetrics, MetricsSnapshot};

/// Outcome of a write whose eviction may have failed.
#[derive(Debug)]
pub struct PutReport<T> {
    pub value: T,
    pub warning: Option<ConsistencyWarning>,
}

impl<T> PutReport<T> {
    pub const fn is_consistent(&self) -> bool {
        self.warning.is_none()
    }
}

/// Write-invalidation coordinator.
pub struct WriteInvalidationCoordinator {
    store: Arc<dyn CacheStore>,
    config: CacheConfig,
    metrics: Arc<CacheMetrics>,
}

impl WriteInvalidationCoordinator {
    pub fn new(store: Arc<dyn CacheStore>, config: CacheConfig) -> Self {
        Self {
            store,
            config,
            metrics: Arc::new(CacheMetrics::default()),
        }
    }

    /// Share counters with a read-through engine.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Apply `mutation` to the backing store, then evict `key`.
    ///
    /// A failed mutation leaves the cache untouched and its error is returned
    /// unchanged. Eviction failures never fail the call.
    pub async fn put<T, Fut>(&self, key: &CacheKey, mutation: Fut) -> CacheResult<T>
    where
        Fut: Future<Output = Result<T, BackingStoreError>> + Send,
    {
        Ok(self.put_with_report(key, mutation).await?.value)
    }

    /// [`put`](Self::put), also reporting whether the eviction went through.
    pub async fn put_with_report<T, Fut>(&self, key: &CacheKey, mutation: Fut) -> CacheResult<PutReport<T>>
    where
        Fut: Future<Output = Result<T, BackingStoreError>> + Send,
    {
        let value = match mutation.await {
            Ok(value) => value,
            Err(e) => {
                debug!(key = %key, error = %e, "backing store write failed, cache untouched");
                return Err(e.into());
            }
        };

        let warning = self.invalidate(key).await.err();
        Ok(PutReport { value, warning })
    }

    /// Removal flavour of [`put`](Self::put); the flow is identical.
    pub async fn delete<T, Fut>(&self, key: &CacheKey, mutation: Fut) -> CacheResult<T>
    where
        Fut: Future<Output = Result<T, BackingStoreError>> + Send,
    {
        self.put(key, mutation).await
    }

    /// Evict `key` (and its stale shadow) with bounded retries.
    ///
    /// For changes that reach the backing store out of band, such as a
    /// change-data-capture feed.
    pub async fn invalidate(&self, key: &CacheKey) -> Result<(), ConsistencyWarning> {
        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(self.config.delete_initial_backoff())
            .with_max_interval(self.config.delete_max_backoff())
            .with_multiplier(2.0)
            .with_max_elapsed_time(None)
            .build();
        let max_attempts = self.config.delete_retries.saturating_add(1);
        let mut attempts = 0;

        loop {
            attempts += 1;
            match self.evict_once(key).await {
                Ok(()) => {
                    self.metrics.record_eviction();
                    debug!(key = %key, attempts, "cache entry evicted");
                    return Ok(());
                }
                Err(e) if attempts >= max_attempts => {
                    self.metrics.record_consistency_warning();
                    let warning = ConsistencyWarning {
                        key: key.to_string(),
                        attempts,
                        last_error: e,
                    };
                    error!(
                        key = %key,
                        attempts,
                        error = %warning.last_error,
                        "cache eviction exhausted retries; entry may be stale until TTL expiry"
                    );
                    return Err(warning);
                }
                Err(e) => {
                    let delay = backoff
                        .next_backoff()
                        .unwrap_or_else(|| self.config.delete_max_backoff());
                    warn!(key = %key, attempt = attempts, error = %e, ?delay, "cache eviction failed, retrying");
                    sleep(delay).await;
                }
            }
        }
    }

    async fn evict_once(&self, key: &CacheKey) -> Result<(), CacheStoreError> {
        self.store.delete(key.as_str()).await?;
        if self.config.stale_ttl().is_some() {
            self.store.delete(&key.stale_key()).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryCacheStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Fails the first `failures` deletes, then delegates.
    struct FlakyDeletes {
        inner: InMemoryCacheStore,
        failures: u32,
        attempts: AtomicU32,
    }

    #[async_trait]
    impl CacheStore for FlakyDeletes {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheStoreError> {
            self.inner.get(key).await
        }

        async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheStoreError> {
            self.inner.set_with_ttl(key, value, ttl).await
        }

        async fn delete(&self, key: &str) -> Result<(), CacheStoreError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
            if attempt < self.failures {
                return Err(CacheStoreError::Unavailable("flaky".to_string()));
            }
            self.inner.delete(key).await
        }

        async fn set_if_absent_with_ttl(
            &self,
            key: &str,
            value: &[u8],
            ttl: Duration,
        ) -> Result<bool, CacheStoreError> {
            self.inner.set_if_absent_with_ttl(key, value, ttl).await
        }

        async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> Result<bool, CacheStoreError> {
            self.inner.compare_and_delete(key, expected).await
        }
    }

    fn fast_retries() -> CacheConfig {
        CacheConfig {
            delete_retries: 2,
            delete_initial_backoff_ms: 1,
            delete_max_backoff_ms: 5,
            ..CacheConfig::default()
        }
    }

    fn key() -> CacheKey {
        CacheKey::new("product", 1).unwrap()
    }

    async fn seeded(store: &InMemoryCacheStore) {
        store
            .set_with_ttl("product:1", b"old", Duration::from_secs(60))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_put_evicts_after_successful_write() {
        let store = InMemoryCacheStore::new();
        seeded(&store).await;
        let coordinator = WriteInvalidationCoordinator::new(Arc::new(store.clone()), fast_retries());

        let value = coordinator
            .put(&key(), async { Ok::<_, BackingStoreError>(7) })
            .await
            .unwrap();

        assert_eq!(value, 7);
        assert_eq!(store.get("product:1").await.unwrap(), None);
        assert_eq!(coordinator.metrics().evictions, 1);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_cache_untouched() {
        let store = InMemoryCacheStore::new();
        seeded(&store).await;
        let coordinator = WriteInvalidationCoordinator::new(Arc::new(store.clone()), fast_retries());

        let result = coordinator
            .put(&key(), async {
                Err::<(), _>(BackingStoreError::Rejected("constraint violation".to_string()))
            })
            .await;

        assert!(matches!(
            result,
            Err(crate::domain::errors::CacheError::BackingStore(
                BackingStoreError::Rejected(_)
            ))
        ));
        assert_eq!(store.get("product:1").await.unwrap(), Some(b"old".to_vec()));
        assert_eq!(coordinator.metrics().evictions, 0);
    }

    #[tokio::test]
    async fn test_eviction_retries_then_succeeds() {
        let inner = InMemoryCacheStore::new();
        seeded(&inner).await;
        let store = Arc::new(FlakyDeletes {
            inner: inner.clone(),
            failures: 2,
            attempts: AtomicU32::new(0),
        });
        let coordinator = WriteInvalidationCoordinator::new(store.clone(), fast_retries());

        let report = coordinator
            .put_with_report(&key(), async { Ok::<_, BackingStoreError>(()) })
            .await
            .unwrap();

        assert!(report.is_consistent());
        assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(inner.get("product:1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_exhausted_retries_report_consistency_warning() {
        let inner = InMemoryCacheStore::new();
        seeded(&inner).await;
        let store = Arc::new(FlakyDeletes {
            inner: inner.clone(),
            failures: u32::MAX,
            attempts: AtomicU32::new(0),
        });
        let coordinator = WriteInvalidationCoordinator::new(store.clone(), fast_retries());

        let report = coordinator
            .put_with_report(&key(), async { Ok::<_, BackingStoreError>("saved") })
            .await
            .unwrap();

        assert_eq!(report.value, "saved");
        let warning = report.warning.unwrap();
        assert_eq!(warning.key, "product:1");
        assert_eq!(warning.attempts, 3);
        assert_eq!(store.attempts.load(Ordering::SeqCst), 3);
        assert_eq!(coordinator.metrics().consistency_warnings, 1);
    }

    #[tokio::test]
    async fn test_stale_shadow_is_evicted_too() {
        let store = InMemoryCacheStore::new();
        seeded(&store).await;
        store
            .set_with_ttl("stale:product:1", b"old", Duration::from_secs(600))
            .await
            .unwrap();
        let config = CacheConfig {
            stale_ttl_ms: Some(600_000),
            ..fast_retries()
        };
        let coordinator = WriteInvalidationCoordinator::new(Arc::new(store.clone()), config);

        coordinator.invalidate(&key()).await.unwrap();
        assert!(store.is_empty());
    }
}
