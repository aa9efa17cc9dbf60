use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

use crate::domain::errors::BackingStoreError;
use crate::domain::models::{CacheKey, Lookup};

/// Port for the system of record.
///
/// Implementations answer lookups by key and say nothing about their query
/// language. A missing row is `Ok(Lookup::NotFound)`; only transport or
/// query failures are errors.
#[async_trait]
pub trait BackingStore: Send + Sync {
    type Value: Send + 'static;

    async fn load(&self, key: &CacheKey) -> Result<Lookup<Self::Value>, BackingStoreError>;
}

/// A system of record that also accepts writes for its keys.
#[async_trait]
pub trait WritableBackingStore: BackingStore {
    async fn save(&self, key: &CacheKey, value: Self::Value) -> Result<(), BackingStoreError>;

    async fn remove(&self, key: &CacheKey) -> Result<(), BackingStoreError>;
}

/// Per-entity-type load function handed to the read-through engine.
///
/// Loaders must be idempotent and free of side effects beyond the read:
/// the engine may call one directly when it degrades.
#[async_trait]
pub trait Loader<V>: Send + Sync {
    async fn load(&self, key: &CacheKey) -> Result<Lookup<V>, BackingStoreError>;
}

#[async_trait]
impl<V, F, Fut> Loader<V> for F
where
    V: Send + 'static,
    F: Fn(CacheKey) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Lookup<V>, BackingStoreError>> + Send + 'static,
{
    async fn load(&self, key: &CacheKey) -> Result<Lookup<V>, BackingStoreError> {
        (self)(key.clone()).await
    }
}

/// Adapts any [`BackingStore`] into a [`Loader`] for its value type.
pub struct StoreLoader<S>(pub Arc<S>);

impl<S> StoreLoader<S> {
    pub const fn new(store: Arc<S>) -> Self {
        Self(store)
    }
}

#[async_trait]
impl<S> Loader<S::Value> for StoreLoader<S>
where
    S: BackingStore + 'static,
{
    async fn load(&self, key: &CacheKey) -> Result<Lookup<S::Value>, BackingStoreError> {
        self.0.load(key).await
    }
}
