//! Negative caching policy for confirmed-absent keys.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::models::CacheKey;

/// Per-key veto over negative caching.
///
/// When the key space is adversarially large, caching a sentinel for every
/// probe just fills the cache; a gate backed by a membership filter can
/// refuse keys that could never exist.
pub trait NegativeCacheGate: Send + Sync {
    fn admit(&self, key: &CacheKey) -> bool;
}

impl<F> NegativeCacheGate for F
where
    F: Fn(&CacheKey) -> bool + Send + Sync,
{
    fn admit(&self, key: &CacheKey) -> bool {
        self(key)
    }
}

/// Decides whether a `NotFound` is cached, and for how long.
#[derive(Clone)]
pub struct NullSentinelPolicy {
    enabled: bool,
    negative_ttl: Duration,
    gate: Option<Arc<dyn NegativeCacheGate>>,
}

impl NullSentinelPolicy {
    pub fn new(negative_ttl: Duration) -> Self {
        Self {
            enabled: true,
            negative_ttl,
            gate: None,
        }
    }

    /// A policy that never caches absences.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            negative_ttl: Duration::ZERO,
            gate: None,
        }
    }

    #[must_use]
    pub fn with_gate(mut self, gate: Arc<dyn NegativeCacheGate>) -> Self {
        self.gate = Some(gate);
        self
    }

    pub const fn negative_ttl(&self) -> Duration {
        self.negative_ttl
    }

    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// TTL for a sentinel on `key`, or `None` when the absence must not be cached.
    pub fn sentinel_ttl(&self, key: &CacheKey) -> Option<Duration> {
        if !self.enabled || self.negative_ttl.is_zero() {
            return None;
        }
        match &self.gate {
            Some(gate) if !gate.admit(key) => None,
            _ => Some(self.negative_ttl),
        }
    }
}

impl fmt::Debug for NullSentinelPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NullSentinelPolicy")
            .field("enabled", &self.enabled)
            .field("negative_ttl", &self.negative_ttl)
            .field("gated", &self.gate.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(id: u32) -> CacheKey {
        CacheKey::new("product", id).unwrap()
    }

    #[test]
    fn test_all_misses_eligible_by_default() {
        let policy = NullSentinelPolicy::new(Duration::from_secs(30));
        assert_eq!(policy.sentinel_ttl(&key(1)), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_disabled_policy() {
        let policy = NullSentinelPolicy::disabled();
        assert!(!policy.is_enabled());
        assert_eq!(policy.sentinel_ttl(&key(1)), None);
    }

    #[test]
    fn test_zero_ttl_means_no_sentinel() {
        let policy = NullSentinelPolicy::new(Duration::ZERO);
        assert_eq!(policy.sentinel_ttl(&key(1)), None);
    }

    #[test]
    fn test_gate_vetoes_keys() {
        // Only ids below 1000 can exist.
        let gate = |key: &CacheKey| {
            key.as_str()
                .rsplit(':')
                .next()
                .and_then(|id| id.parse::<u32>().ok())
                .is_some_and(|id| id < 1000)
        };
        let policy = NullSentinelPolicy::new(Duration::from_secs(30)).with_gate(Arc::new(gate));

        assert!(policy.sentinel_ttl(&key(12)).is_some());
        assert!(policy.sentinel_ttl(&key(5_000_000)).is_none());
    }
}
