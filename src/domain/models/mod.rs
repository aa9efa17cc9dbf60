//! Domain models for the cache consistency layer.

pub mod cache_key;
pub mod cached_value;
pub mod config;
pub mod lock;
pub mod lookup;

pub use cache_key::CacheKey;
pub use cached_value::{CacheEntry, CachedValue, DecodeError};
pub use config::{CacheConfig, Config, LogFormat, LoggingConfig, RedisConfig, RotationPolicy};
pub use lock::{Lock, LockToken};
pub use lookup::Lookup;
