//! Domain errors for the cacheward consistency layer.
//!
//! The taxonomy mirrors how each failure is handled: backing-store failures
//! surface to the caller unchanged, while cache-store and lock failures are
//! absorbed by the engine and degrade to direct reads.

use std::time::Duration;
use thiserror::Error;

/// Failure reported by the system of record.
///
/// Never conflated with "not found": an authoritative absence is
/// [`Lookup::NotFound`](crate::domain::models::Lookup::NotFound).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackingStoreError {
    #[error("Backing store unavailable: {0}")]
    Unavailable(String),

    #[error("Backing store query failed: {0}")]
    Query(String),

    #[error("Backing store rejected write: {0}")]
    Rejected(String),
}

impl BackingStoreError {
    /// Convenience constructor for query failures.
    pub fn query(msg: impl Into<String>) -> Self {
        Self::Query(msg.into())
    }
}

/// Failure reported by a cache store adapter.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheStoreError {
    #[error("Cache store unavailable: {0}")]
    Unavailable(String),

    #[error("Cache store backend error: {0}")]
    Backend(String),
}

/// Distributed lock failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LockError {
    #[error("Timed out after {waited:?} waiting for lock {name}")]
    Timeout { name: String, waited: Duration },

    #[error("Lock {0} is not held by the presented token")]
    NotOwner(String),

    #[error("Lock store error: {0}")]
    Store(#[from] CacheStoreError),
}

/// Errors surfaced to callers of the read and write paths.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error(transparent)]
    BackingStore(#[from] BackingStoreError),

    #[error("Loader for {key} exceeded the lock lease of {lease:?}")]
    LoaderTimeout { key: String, lease: Duration },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Invalid cache key: {0}")]
    InvalidKey(String),
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// A successful backing-store write whose cache eviction could not be made.
///
/// Not fatal: the stale entry lives at most until its TTL runs out.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Cache entry {key} may serve stale data until TTL expiry: eviction failed after {attempts} attempts: {last_error}")]
pub struct ConsistencyWarning {
    pub key: String,
    pub attempts: u32,
    pub last_error: CacheStoreError,
}

/// Result alias for the read and write paths.
pub type CacheResult<T> = Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backing_store_error_propagates_transparently() {
        let err: CacheError = BackingStoreError::query("deadlock detected").into();
        assert_eq!(err.to_string(), "Backing store query failed: deadlock detected");
        assert!(matches!(err, CacheError::BackingStore(BackingStoreError::Query(_))));
    }

    #[test]
    fn test_lock_error_wraps_store_error() {
        let err: LockError = CacheStoreError::Unavailable("connection refused".to_string()).into();
        assert!(matches!(err, LockError::Store(CacheStoreError::Unavailable(_))));
    }
}
