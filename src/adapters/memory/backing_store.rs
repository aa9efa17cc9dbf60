//! In-memory system of record with load counting, artificial latency and
//! fault injection. Backs the `simulate` command and the test suites.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::domain::errors::BackingStoreError;
use crate::domain::models::{CacheKey, Lookup};
use crate::domain::ports::{BackingStore, WritableBackingStore};

pub struct InMemoryBackingStore<V> {
    rows: RwLock<HashMap<CacheKey, V>>,
    load_delay: Duration,
    loads: AtomicU64,
    writes: AtomicU64,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl<V: Clone + Send + Sync> InMemoryBackingStore<V> {
    pub fn new() -> Self {
        Self::with_load_delay(Duration::ZERO)
    }

    /// Every `load` sleeps for `delay` before answering.
    pub fn with_load_delay(delay: Duration) -> Self {
        Self {
            rows: RwLock::new(HashMap::new()),
            load_delay: delay,
            loads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            fail_reads: AtomicBool::new(false),
            fail_writes: AtomicBool::new(false),
        }
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Seed a row without counting it as a write.
    pub async fn seed(&self, key: CacheKey, value: V) {
        self.rows.write().await.insert(key, value);
    }

    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

impl<V: Clone + Send + Sync> Default for InMemoryBackingStore<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<V> BackingStore for InMemoryBackingStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    type Value = V;

    async fn load(&self, key: &CacheKey) -> Result<Lookup<V>, BackingStoreError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(BackingStoreError::Unavailable(
                "injected read failure".to_string(),
            ));
        }
        Ok(self.rows.read().await.get(key).cloned().into())
    }
}

#[async_trait]
impl<V> WritableBackingStore for InMemoryBackingStore<V>
where
    V: Clone + Send + Sync + 'static,
{
    async fn save(&self, key: &CacheKey, value: V) -> Result<(), BackingStoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BackingStoreError::Rejected(
                "injected write failure".to_string(),
            ));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.rows.write().await.insert(key.clone(), value);
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> Result<(), BackingStoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BackingStoreError::Rejected(
                "injected write failure".to_string(),
            ));
        }
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.rows.write().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_found_and_missing() {
        let store = InMemoryBackingStore::new();
        let key = CacheKey::new("product", 1).unwrap();
        store.seed(key.clone(), "phone".to_string()).await;

        assert_eq!(store.load(&key).await.unwrap(), Lookup::Found("phone".to_string()));
        let missing = CacheKey::new("product", 2).unwrap();
        assert_eq!(store.load(&missing).await.unwrap(), Lookup::NotFound);
        assert_eq!(store.load_count(), 2);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store: InMemoryBackingStore<String> = InMemoryBackingStore::new();
        let key = CacheKey::new("product", 1).unwrap();

        store.set_fail_reads(true);
        assert!(matches!(
            store.load(&key).await,
            Err(BackingStoreError::Unavailable(_))
        ));

        store.set_fail_writes(true);
        assert!(store.save(&key, "x".to_string()).await.is_err());
        assert_eq!(store.write_count(), 0);
    }
}
