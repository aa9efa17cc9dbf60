use async_trait::async_trait;
use std::time::Duration;

use crate::domain::errors::CacheStoreError;

/// Port for a shared key-value cache.
///
/// Keys are plain strings so the same store can hold cached values, stale
/// shadows and lock records. `set_if_absent_with_ttl` and
/// `compare_and_delete` must be atomic with respect to every other process
/// sharing the store; the lock manager relies on nothing else.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Read a key. Expired entries read as absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheStoreError>;

    /// Unconditionally write a key with a TTL.
    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheStoreError>;

    /// Remove a key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), CacheStoreError>;

    /// Write only if the key is absent (or expired). Returns whether the write happened.
    async fn set_if_absent_with_ttl(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<bool, CacheStoreError>;

    /// Remove the key only if it currently holds `expected`. Returns whether it was removed.
    async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> Result<bool, CacheStoreError>;

    /// Health check.
    async fn ping(&self) -> Result<(), CacheStoreError> {
        self.get("cacheward:ping").await.map(|_| ())
    }
}
