//! Cache consistency policies and the engines that compose them.

pub mod inflight;
pub mod lock_manager;
pub mod metrics;
pub mod null_sentinel;
pub mod read_through;
pub mod ttl_jitter;
pub mod write_invalidation;

pub use inflight::{InFlightGuard, InFlightRegistry};
pub use lock_manager::{DistributedLockManager, LockGuard};
pub use metrics::{CacheMetrics, MetricsSnapshot};
pub use null_sentinel::{NegativeCacheGate, NullSentinelPolicy};
pub use read_through::ReadThroughCache;
pub use ttl_jitter::TtlJitterPolicy;
pub use write_invalidation::{PutReport, WriteInvalidationCoordinator};
