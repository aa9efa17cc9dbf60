//! Read-through cache engine.
//!
//! Answers `get(key, loader)` from the cache when it can, and otherwise
//! makes sure that at most one caller across the deployment loads a missing
//! key from the backing store:
//!
//! 1. cached value → returned without locking
//! 2. cached sentinel → `NotFound` without touching the backing store
//! 3. miss → take the per-key load lock, re-check, load, populate
//! 4. lock wait timed out → re-poll the cache a few times, then serve the
//!    stale shadow (if configured) or load directly without caching
//!
//! Cache store failures never fail a read; they degrade to direct loads.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::domain::errors::{CacheError, CacheResult, CacheStoreError, LockError};
use crate::domain::models::{CacheConfig, CacheKey, CachedValue, Lookup};
use crate::domain::ports::{CacheStore, Loader};
use crate::services::inflight::InFlightRegistry;
use crate::services::lock_manager::DistributedLockManager;
use crate::services::metrics::{CacheMetrics, MetricsSnapshot};
use crate::services::null_sentinel::NullSentinelPolicy;
use crate::services::ttl_jitter::TtlJitterPolicy;

/// What a single cache read found.
enum Probe<V> {
    Hit(V),
    Sentinel,
    Miss,
}

/// Read-through cache engine.
pub struct ReadThroughCache {
    store: Arc<dyn CacheStore>,
    locks: DistributedLockManager,
    jitter: TtlJitterPolicy,
    sentinel: NullSentinelPolicy,
    inflight: Option<InFlightRegistry>,
    config: CacheConfig,
    metrics: Arc<CacheMetrics>,
}

impl ReadThroughCache {
    /// Create an engine over `store`, tuned by `config`.
    pub fn new(store: Arc<dyn CacheStore>, config: CacheConfig) -> Self {
        let sentinel = if config.negative_caching {
            NullSentinelPolicy::new(config.negative_ttl())
        } else {
            NullSentinelPolicy::disabled()
        };
        let inflight = config.local_coalescing.then(InFlightRegistry::new);

        Self {
            locks: DistributedLockManager::from_config(Arc::clone(&store), &config),
            jitter: TtlJitterPolicy::new(config.jitter_fraction),
            sentinel,
            inflight,
            store,
            config,
            metrics: Arc::new(CacheMetrics::default()),
        }
    }

    /// Replace the negative caching policy, e.g. to install a gate.
    #[must_use]
    pub fn with_sentinel_policy(mut self, policy: NullSentinelPolicy) -> Self {
        self.sentinel = policy;
        self
    }

    /// Share counters with a write coordinator.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub const fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn shared_metrics(&self) -> Arc<CacheMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Read `key`, loading it through `loader` on a miss.
    pub async fn get<V, L>(&self, key: &CacheKey, loader: &L) -> CacheResult<Lookup<V>>
    where
        V: Serialize + DeserializeOwned + Send + Sync,
        L: Loader<V> + ?Sized,
    {
        match self.probe::<V>(key).await {
            Ok(Probe::Hit(value)) => {
                self.metrics.record_hit();
                debug!(key = %key, "cache hit");
                return Ok(Lookup::Found(value));
            }
            Ok(Probe::Sentinel) => {
                self.metrics.record_sentinel_hit();
                debug!(key = %key, "cache hit (null sentinel)");
                return Ok(Lookup::NotFound);
            }
            Ok(Probe::Miss) => {
                self.metrics.record_miss();
                debug!(key = %key, "cache miss");
            }
            Err(e) => {
                self.metrics.record_cache_error();
                warn!(key = %key, error = %e, "cache read failed, reading through to backing store");
                return self.load_direct(key, loader).await;
            }
        }

        // One wait budget covers the in-process slot and the distributed lock.
        let wait_deadline = Instant::now() + self.config.lock_wait();

        // Held until this call returns so local waiters queue behind us.
        let _local = match &self.inflight {
            Some(registry) => {
                let entered = registry.enter(key.as_str(), self.config.lock_wait()).await;
                if entered.is_some() {
                    if let Some(found) = self.recheck::<V>(key).await {
                        return Ok(found);
                    }
                }
                entered
            }
            None => None,
        };

        let lock_name = key.load_lock_name();
        let remaining_wait = wait_deadline.saturating_duration_since(Instant::now());
        match self
            .locks
            .acquire_guard(&lock_name, self.config.lock_lease(), remaining_wait)
            .await
        {
            Ok(guard) => {
                let lease_deadline = Instant::now() + self.config.lock_lease();
                let result = self.load_locked(key, loader, lease_deadline).await;
                if let Err(e) = guard.release().await {
                    // NotOwner here means the lease ran out under a slow loader.
                    warn!(key = %key, error = %e, "load lock release failed");
                }
                result
            }
            Err(LockError::Timeout { waited, .. }) => {
                self.metrics.record_lock_timeout();
                debug!(key = %key, ?waited, "load lock busy, falling back to cache polls");
                self.fallback(key, loader).await
            }
            Err(e) => {
                self.metrics.record_cache_error();
                warn!(key = %key, error = %e, "load lock unavailable, reading through to backing store");
                self.load_direct(key, loader).await
            }
        }
    }

    /// Like [`get`](Self::get), mapping `NotFound` to `default`.
    pub async fn get_or_default<V, L>(&self, key: &CacheKey, loader: &L, default: V) -> CacheResult<V>
    where
        V: Serialize + DeserializeOwned + Send + Sync,
        L: Loader<V> + ?Sized,
    {
        Ok(self.get(key, loader).await?.into_option().unwrap_or(default))
    }

    /// Single best-effort eviction of `key` and its stale shadow.
    pub async fn invalidate(&self, key: &CacheKey) -> Result<(), CacheStoreError> {
        self.store.delete(key.as_str()).await?;
        if self.config.stale_ttl().is_some() {
            self.store.delete(&key.stale_key()).await?;
        }
        Ok(())
    }

    async fn probe<V: DeserializeOwned>(&self, key: &CacheKey) -> Result<Probe<V>, CacheStoreError> {
        let Some(bytes) = self.store.get(key.as_str()).await? else {
            return Ok(Probe::Miss);
        };

        let payload = match CachedValue::decode(&bytes) {
            Ok(CachedValue::NullSentinel) => return Ok(Probe::Sentinel),
            Ok(CachedValue::Value(payload)) => payload,
            Err(e) => {
                warn!(key = %key, error = %e, "discarding undecodable cache entry");
                self.discard(key.as_str()).await;
                return Ok(Probe::Miss);
            }
        };

        match serde_json::from_slice(&payload) {
            Ok(value) => Ok(Probe::Hit(value)),
            Err(e) => {
                warn!(key = %key, error = %e, "discarding cache entry of unexpected shape");
                self.discard(key.as_str()).await;
                Ok(Probe::Miss)
            }
        }
    }

    /// Cache re-check after waiting. Store failures read as a miss.
    async fn recheck<V: DeserializeOwned>(&self, key: &CacheKey) -> Option<Lookup<V>> {
        match self.probe::<V>(key).await {
            Ok(Probe::Hit(value)) => {
                self.metrics.record_hit();
                Some(Lookup::Found(value))
            }
            Ok(Probe::Sentinel) => {
                self.metrics.record_sentinel_hit();
                Some(Lookup::NotFound)
            }
            Ok(Probe::Miss) => None,
            Err(e) => {
                self.metrics.record_cache_error();
                debug!(key = %key, error = %e, "cache re-check failed");
                None
            }
        }
    }

    /// Re-check, load and populate while holding the lock.
    ///
    /// The loader only gets what is left of the lease at `lease_deadline`, and
    /// nothing is written once the lease has run out.
    async fn load_locked<V, L>(
        &self,
        key: &CacheKey,
        loader: &L,
        lease_deadline: Instant,
    ) -> CacheResult<Lookup<V>>
    where
        V: Serialize + DeserializeOwned + Send + Sync,
        L: Loader<V> + ?Sized,
    {
        if let Some(found) = self.recheck::<V>(key).await {
            debug!(key = %key, "populated while waiting for load lock");
            return Ok(found);
        }

        self.metrics.record_load();
        let budget = lease_deadline.saturating_duration_since(Instant::now());
        let loaded = self.bounded_load(key, loader, budget).await?;
        if Instant::now() >= lease_deadline {
            warn!(key = %key, "lease ran out before populate, result not cached");
            return Ok(loaded);
        }
        match &loaded {
            Lookup::Found(value) => self.store_value(key, value).await?,
            Lookup::NotFound => self.store_sentinel(key).await,
        }
        Ok(loaded)
    }

    async fn fallback<V, L>(&self, key: &CacheKey, loader: &L) -> CacheResult<Lookup<V>>
    where
        V: Serialize + DeserializeOwned + Send + Sync,
        L: Loader<V> + ?Sized,
    {
        for _ in 0..self.config.fallback_polls {
            tokio::time::sleep(self.config.fallback_poll_interval()).await;
            if let Some(found) = self.recheck::<V>(key).await {
                return Ok(found);
            }
        }

        if self.config.stale_ttl().is_some() {
            if let Some(value) = self.read_stale::<V>(key).await {
                self.metrics.record_stale_served();
                debug!(key = %key, "serving stale shadow after lock timeout");
                return Ok(Lookup::Found(value));
            }
        }

        self.load_direct(key, loader).await
    }

    /// Load without the lock and without populating the cache.
    async fn load_direct<V, L>(&self, key: &CacheKey, loader: &L) -> CacheResult<Lookup<V>>
    where
        V: Send,
        L: Loader<V> + ?Sized,
    {
        self.metrics.record_direct_load();
        self.bounded_load(key, loader, self.config.lock_lease()).await
    }

    async fn bounded_load<V, L>(&self, key: &CacheKey, loader: &L, budget: Duration) -> CacheResult<Lookup<V>>
    where
        V: Send,
        L: Loader<V> + ?Sized,
    {
        match tokio::time::timeout(budget, loader.load(key)).await {
            Ok(result) => Ok(result?),
            Err(_) => {
                let lease = self.config.lock_lease();
                warn!(key = %key, ?lease, ?budget, "loader exceeded lock lease");
                Err(CacheError::LoaderTimeout {
                    key: key.to_string(),
                    lease,
                })
            }
        }
    }

    async fn store_value<V: Serialize + Sync>(&self, key: &CacheKey, value: &V) -> CacheResult<()> {
        let payload = serde_json::to_vec(value)?;
        let encoded = CachedValue::Value(payload).encode();

        let ttl = self.jitter.compute_ttl(self.config.base_ttl());
        self.write(key.as_str(), &encoded, ttl).await;

        if let Some(stale_ttl) = self.config.stale_ttl() {
            let ttl = self.jitter.compute_ttl(stale_ttl);
            self.write(&key.stale_key(), &encoded, ttl).await;
        }
        Ok(())
    }

    async fn store_sentinel(&self, key: &CacheKey) {
        match self.sentinel.sentinel_ttl(key) {
            Some(ttl) => {
                self.write(key.as_str(), &CachedValue::NullSentinel.encode(), ttl)
                    .await;
            }
            None => debug!(key = %key, "absence not cached by sentinel policy"),
        }
    }

    async fn read_stale<V: DeserializeOwned>(&self, key: &CacheKey) -> Option<V> {
        let bytes = self.store.get(&key.stale_key()).await.ok()??;
        match CachedValue::decode(&bytes).ok()? {
            CachedValue::Value(payload) => serde_json::from_slice(&payload).ok(),
            CachedValue::NullSentinel => None,
        }
    }

    async fn write(&self, key: &str, bytes: &[u8], ttl: Duration) {
        match self.store.set_with_ttl(key, bytes, ttl).await {
            Ok(()) => debug!(key, ?ttl, "cache populated"),
            Err(e) => {
                self.metrics.record_cache_error();
                warn!(key, error = %e, "cache write failed");
            }
        }
    }

    async fn discard(&self, key: &str) {
        if let Err(e) = self.store.delete(key).await {
            self.metrics.record_cache_error();
            debug!(key, error = %e, "failed to discard cache entry");
        }
    }
}
