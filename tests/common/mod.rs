//! Common test utilities for integration tests
//!
//! Provides shared fixtures, helpers, and test utilities used across
//! multiple integration test files.

use async_trait::async_trait;
use cacheward::domain::errors::{BackingStoreError, CacheStoreError};
use cacheward::domain::models::{CacheConfig, CacheKey, Lookup};
use cacheward::domain::ports::CacheStore;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
}

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
/// Call this at the beginning of tests that need logging.
#[allow(dead_code)]
pub fn setup_test_logging() {
    use tracing_subscriber::fmt;

    let _ = fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Fast polling so lock and fallback paths finish quickly in tests.
#[allow(dead_code)]
pub fn fast_config() -> CacheConfig {
    CacheConfig {
        base_ttl_ms: 60_000,
        negative_ttl_ms: 5_000,
        lock_lease_ms: 2_000,
        lock_wait_ms: 1_000,
        lock_poll_initial_ms: 2,
        lock_poll_max_ms: 20,
        fallback_poll_interval_ms: 5,
        delete_initial_backoff_ms: 1,
        delete_max_backoff_ms: 5,
        ..CacheConfig::default()
    }
}

/// Loader that counts calls and sleeps `delay` before answering.
///
/// Keys whose id is `404` are reported absent.
#[allow(dead_code)]
pub fn counting_loader(
    calls: Arc<AtomicU64>,
    delay: Duration,
) -> impl Fn(CacheKey) -> BoxFuture<'static, Result<Lookup<Product>, BackingStoreError>> + Send + Sync
{
    move |key: CacheKey| {
        let calls = Arc::clone(&calls);
        Box::pin(async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(delay).await;
            if key.as_str().ends_with(":404") {
                Ok(Lookup::NotFound)
            } else {
                Ok(Lookup::Found(Product {
                    id: 1,
                    name: format!("product for {key}"),
                }))
            }
        })
    }
}

/// Cache store whose every operation fails as if the server were down.
#[allow(dead_code)]
#[derive(Debug, Default)]
pub struct UnreachableCacheStore {
    pub calls: AtomicU64,
}

impl UnreachableCacheStore {
    fn refuse<T>(&self) -> Result<T, CacheStoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(CacheStoreError::Unavailable("connection refused".to_string()))
    }
}

#[async_trait]
impl CacheStore for UnreachableCacheStore {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheStoreError> {
        self.refuse()
    }

    async fn set_with_ttl(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<(), CacheStoreError> {
        self.refuse()
    }

    async fn delete(&self, _key: &str) -> Result<(), CacheStoreError> {
        self.refuse()
    }

    async fn set_if_absent_with_ttl(
        &self,
        _key: &str,
        _value: &[u8],
        _ttl: Duration,
    ) -> Result<bool, CacheStoreError> {
        self.refuse()
    }

    async fn compare_and_delete(&self, _key: &str, _expected: &[u8]) -> Result<bool, CacheStoreError> {
        self.refuse()
    }
}
