//! Redis `CacheStore` over a `deadpool-redis` connection pool.
//!
//! `set_if_absent_with_ttl` is a single `SET key value NX PX ttl`;
//! `compare_and_delete` runs a Lua script so the read and the delete happen
//! atomically on the server. Every command is bounded by the configured
//! command timeout.

use async_trait::async_trait;
use deadpool_redis::{Pool, Runtime};
use redis::AsyncCommands;
use std::future::Future;
use std::time::Duration;

use crate::domain::errors::CacheStoreError;
use crate::domain::models::RedisConfig;
use crate::domain::ports::CacheStore;

const COMPARE_AND_DELETE: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Redis-backed cache store shared by every process in the deployment.
#[derive(Clone)]
pub struct RedisCacheStore {
    pool: Pool,
    command_timeout: Duration,
}

impl RedisCacheStore {
    pub fn new(pool: Pool, command_timeout: Duration) -> Self {
        Self {
            pool,
            command_timeout,
        }
    }

    /// Build the pool from configuration. Does not connect.
    pub fn from_config(config: &RedisConfig) -> Result<Self, CacheStoreError> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| CacheStoreError::Unavailable("redis.url is not set".to_string()))?;
        let timeout = Duration::from_millis(config.command_timeout_ms);

        let mut redis_config = deadpool_redis::Config::from_url(url);
        let mut pool_config = deadpool_redis::PoolConfig::new(config.pool_size);
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);
        redis_config.pool = Some(pool_config);

        let pool = redis_config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheStoreError::Unavailable(format!("Failed to create Redis pool: {e}")))?;

        Ok(Self::new(pool, timeout))
    }

    async fn connection(&self) -> Result<deadpool_redis::Connection, CacheStoreError> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheStoreError::Unavailable(format!("Redis connection error: {e}")))
    }

    async fn bounded<T, F>(&self, op: &'static str, fut: F) -> Result<T, CacheStoreError>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        match tokio::time::timeout(self.command_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(CacheStoreError::Backend(format!("Redis {op} error: {e}"))),
            Err(_) => Err(CacheStoreError::Unavailable(format!(
                "Redis {op} timed out after {:?}",
                self.command_timeout
            ))),
        }
    }
}

fn ttl_millis(ttl: Duration) -> u64 {
    // Redis rejects a zero expiry.
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl CacheStore for RedisCacheStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheStoreError> {
        let mut conn = self.connection().await?;
        self.bounded("GET", conn.get::<_, Option<Vec<u8>>>(key)).await
    }

    async fn set_with_ttl(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheStoreError> {
        let mut conn = self.connection().await?;
        self.bounded("PSETEX", conn.pset_ex::<_, _, ()>(key, value, ttl_millis(ttl)))
            .await
    }

    async fn delete(&self, key: &str) -> Result<(), CacheStoreError> {
        let mut conn = self.connection().await?;
        self.bounded("DEL", conn.del::<_, ()>(key)).await
    }

    async fn set_if_absent_with_ttl(
        &self,
        key: &str,
        value: &[u8],
        ttl: Duration,
    ) -> Result<bool, CacheStoreError> {
        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value).arg("NX").arg("PX").arg(ttl_millis(ttl));
        let reply: Option<String> = self.bounded("SET NX", cmd.query_async(&mut conn)).await?;
        Ok(reply.is_some())
    }

    async fn compare_and_delete(&self, key: &str, expected: &[u8]) -> Result<bool, CacheStoreError> {
        let mut conn = self.connection().await?;
        let script = redis::Script::new(COMPARE_AND_DELETE);
        let mut invocation = script.key(key);
        invocation.arg(expected);
        let removed: i64 = self
            .bounded("EVALSHA", invocation.invoke_async(&mut conn))
            .await?;
        Ok(removed == 1)
    }

    async fn ping(&self) -> Result<(), CacheStoreError> {
        let mut conn = self.connection().await?;
        let cmd = redis::cmd("PING");
        let _: String = self.bounded("PING", cmd.query_async(&mut conn)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Option<RedisCacheStore> {
        let url = std::env::var("CACHEWARD_TEST_REDIS_URL").ok()?;
        RedisCacheStore::from_config(&RedisConfig {
            url: Some(url),
            ..RedisConfig::default()
        })
        .ok()
    }

    #[test]
    fn test_ttl_millis_never_zero() {
        assert_eq!(ttl_millis(Duration::ZERO), 1);
        assert_eq!(ttl_millis(Duration::from_secs(2)), 2_000);
    }

    #[test]
    fn test_from_config_requires_url() {
        assert!(RedisCacheStore::from_config(&RedisConfig::default()).is_err());
    }

    #[tokio::test]
    #[ignore = "requires CACHEWARD_TEST_REDIS_URL"]
    async fn test_conditional_ops_against_server() {
        let Some(store) = store() else { return };
        let key = format!("cacheward:test:{}", uuid::Uuid::new_v4());

        store.ping().await.unwrap();
        assert!(store.set_if_absent_with_ttl(&key, b"a", Duration::from_secs(5)).await.unwrap());
        assert!(!store.set_if_absent_with_ttl(&key, b"b", Duration::from_secs(5)).await.unwrap());
        assert!(!store.compare_and_delete(&key, b"b").await.unwrap());
        assert!(store.compare_and_delete(&key, b"a").await.unwrap());
        assert_eq!(store.get(&key).await.unwrap(), None);
    }
}
