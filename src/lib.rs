//! Cacheward - read-through cache consistency layer
//!
//! Cacheward sits between application code and a shared key-value cache in
//! front of a slower system of record. It keeps the cache consistent with
//! the backing store and protects the store from three failure modes:
//!
//! - **Penetration**: lookups for keys that do not exist are remembered with
//!   a short-lived null sentinel.
//! - **Breakdown**: when a hot key expires, one caller across the
//!   deployment reloads it under a distributed lock while the rest wait.
//! - **Avalanche**: TTLs are jittered so entries written together do not
//!   expire together.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Cache model, error taxonomy and ports
//! - **Service Layer** (`services`): Cache policies and the read/write engines
//! - **Adapters** (`adapters`): In-memory and Redis cache stores, repository decorator
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface
//!
//! # Example
//!
//! ```ignore
//! use cacheward::{CacheConfig, CacheKey, InMemoryCacheStore, Lookup, ReadThroughCache};
//! use std::sync::Arc;
//!
//! let cache = ReadThroughCache::new(Arc::new(InMemoryCacheStore::new()), CacheConfig::default());
//! let key = CacheKey::new("product", 42)?;
//! let product = cache
//!     .get(&key, &|key| async move { db::find_product(key).await })
//!     .await?;
//! ```

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use adapters::cache::CachedRepository;
pub use adapters::memory::{InMemoryBackingStore, InMemoryCacheStore};
#[cfg(feature = "redis")]
pub use adapters::redis::RedisCacheStore;
pub use domain::models::{CacheConfig, CacheKey, CachedValue, Config, Lock, LockToken, Lookup};
pub use domain::ports::{BackingStore, CacheStore, Loader, StoreLoader, WritableBackingStore};
pub use domain::{
    BackingStoreError, CacheError, CacheResult, CacheStoreError, ConsistencyWarning, LockError,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{
    CacheMetrics, DistributedLockManager, MetricsSnapshot, NullSentinelPolicy, PutReport,
    ReadThroughCache, TtlJitterPolicy, WriteInvalidationCoordinator,
};
