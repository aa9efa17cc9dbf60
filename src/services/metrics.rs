//! Counters for the read and write paths.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct CacheMetrics {
    hits: AtomicU64,
    sentinel_hits: AtomicU64,
    misses: AtomicU64,
    loads: AtomicU64,
    direct_loads: AtomicU64,
    stale_served: AtomicU64,
    lock_timeouts: AtomicU64,
    cache_errors: AtomicU64,
    evictions: AtomicU64,
    consistency_warnings: AtomicU64,
}

/// Point-in-time copy of [`CacheMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Reads answered from a cached value
    pub hits: u64,
    /// Reads answered from a cached "confirmed absent" sentinel
    pub sentinel_hits: u64,
    /// Reads that found nothing cached
    pub misses: u64,
    /// Loader calls made while holding the load lock
    pub loads: u64,
    /// Loader calls made without the lock (lock timeout or cache outage)
    pub direct_loads: u64,
    /// Lock timeouts answered from the stale shadow copy
    pub stale_served: u64,
    /// Load lock waits that timed out
    pub lock_timeouts: u64,
    /// Cache store failures absorbed
    pub cache_errors: u64,
    /// Keys evicted after writes
    pub evictions: u64,
    /// Post-write evictions that exhausted their retries
    pub consistency_warnings: u64,
}

macro_rules! counter {
    ($($name:ident => $field:ident),* $(,)?) => {
        $(
            pub(crate) fn $name(&self) {
                self.$field.fetch_add(1, Ordering::Relaxed);
            }
        )*
    };
}

impl CacheMetrics {
    counter! {
        record_hit => hits,
        record_sentinel_hit => sentinel_hits,
        record_miss => misses,
        record_load => loads,
        record_direct_load => direct_loads,
        record_stale_served => stale_served,
        record_lock_timeout => lock_timeouts,
        record_cache_error => cache_errors,
        record_eviction => evictions,
        record_consistency_warning => consistency_warnings,
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            sentinel_hits: self.sentinel_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            direct_loads: self.direct_loads.load(Ordering::Relaxed),
            stale_served: self.stale_served.load(Ordering::Relaxed),
            lock_timeouts: self.lock_timeouts.load(Ordering::Relaxed),
            cache_errors: self.cache_errors.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            consistency_warnings: self.consistency_warnings.load(Ordering::Relaxed),
        }
    }
}

impl MetricsSnapshot {
    /// Every loader invocation, locked or not.
    pub const fn total_loads(&self) -> u64 {
        self.loads + self.direct_loads
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let metrics = CacheMetrics::default();
        metrics.record_hit();
        metrics.record_hit();
        metrics.record_load();
        metrics.record_direct_load();

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.hits, 2);
        assert_eq!(snapshot.total_loads(), 2);
        assert_eq!(snapshot.misses, 0);
    }
}
