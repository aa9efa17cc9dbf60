use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for cacheward
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Cache policy configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Redis cache store configuration
    #[serde(default)]
    pub redis: RedisConfig,
}

/// Policy knobs for the read and write paths.
///
/// Passed explicitly into the engine and coordinator constructors so each
/// entity type can be tuned independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CacheConfig {
    /// Base TTL for positive entries, before jitter
    #[serde(default = "default_base_ttl_ms")]
    pub base_ttl_ms: u64,

    /// Upper bound of the random TTL extension, as a fraction of the TTL (0.0-1.0)
    #[serde(default = "default_jitter_fraction")]
    pub jitter_fraction: f64,

    /// TTL for cached "confirmed absent" sentinels
    #[serde(default = "default_negative_ttl_ms")]
    pub negative_ttl_ms: u64,

    /// Whether absent results are cached at all
    #[serde(default = "default_true")]
    pub negative_caching: bool,

    /// Lease of the per-key load lock; also bounds the loader
    #[serde(default = "default_lock_lease_ms")]
    pub lock_lease_ms: u64,

    /// How long a caller waits for the load lock before falling back
    #[serde(default = "default_lock_wait_ms")]
    pub lock_wait_ms: u64,

    /// First lock poll interval
    #[serde(default = "default_lock_poll_initial_ms")]
    pub lock_poll_initial_ms: u64,

    /// Longest lock poll interval
    #[serde(default = "default_lock_poll_max_ms")]
    pub lock_poll_max_ms: u64,

    /// Cache re-polls after a lock timeout
    #[serde(default = "default_fallback_polls")]
    pub fallback_polls: u32,

    /// Spacing of the cache re-polls after a lock timeout
    #[serde(default = "default_fallback_poll_interval_ms")]
    pub fallback_poll_interval_ms: u64,

    /// TTL of the stale shadow copy served on lock timeout (disabled when unset)
    #[serde(default)]
    pub stale_ttl_ms: Option<u64>,

    /// Coalesce concurrent misses inside this process before taking the distributed lock
    #[serde(default = "default_true")]
    pub local_coalescing: bool,

    /// Cache delete retries after a successful backing-store write
    #[serde(default = "default_delete_retries")]
    pub delete_retries: u32,

    /// First delete retry backoff
    #[serde(default = "default_delete_initial_backoff_ms")]
    pub delete_initial_backoff_ms: u64,

    /// Longest delete retry backoff
    #[serde(default = "default_delete_max_backoff_ms")]
    pub delete_max_backoff_ms: u64,
}

const fn default_base_ttl_ms() -> u64 {
    30 * 60 * 1000
}

const fn default_jitter_fraction() -> f64 {
    0.2
}

const fn default_negative_ttl_ms() -> u64 {
    30 * 1000
}

const fn default_true() -> bool {
    true
}

const fn default_lock_lease_ms() -> u64 {
    10_000
}

const fn default_lock_wait_ms() -> u64 {
    2_000
}

const fn default_lock_poll_initial_ms() -> u64 {
    10
}

const fn default_lock_poll_max_ms() -> u64 {
    200
}

const fn default_fallback_polls() -> u32 {
    3
}

const fn default_fallback_poll_interval_ms() -> u64 {
    50
}

const fn default_delete_retries() -> u32 {
    3
}

const fn default_delete_initial_backoff_ms() -> u64 {
    50
}

const fn default_delete_max_backoff_ms() -> u64 {
    1_000
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            base_ttl_ms: default_base_ttl_ms(),
            jitter_fraction: default_jitter_fraction(),
            negative_ttl_ms: default_negative_ttl_ms(),
            negative_caching: true,
            lock_lease_ms: default_lock_lease_ms(),
            lock_wait_ms: default_lock_wait_ms(),
            lock_poll_initial_ms: default_lock_poll_initial_ms(),
            lock_poll_max_ms: default_lock_poll_max_ms(),
            fallback_polls: default_fallback_polls(),
            fallback_poll_interval_ms: default_fallback_poll_interval_ms(),
            stale_ttl_ms: None,
            local_coalescing: true,
            delete_retries: default_delete_retries(),
            delete_initial_backoff_ms: default_delete_initial_backoff_ms(),
            delete_max_backoff_ms: default_delete_max_backoff_ms(),
        }
    }
}

impl CacheConfig {
    pub const fn base_ttl(&self) -> Duration {
        Duration::from_millis(self.base_ttl_ms)
    }

    pub const fn negative_ttl(&self) -> Duration {
        Duration::from_millis(self.negative_ttl_ms)
    }

    pub const fn lock_lease(&self) -> Duration {
        Duration::from_millis(self.lock_lease_ms)
    }

    pub const fn lock_wait(&self) -> Duration {
        Duration::from_millis(self.lock_wait_ms)
    }

    pub const fn lock_poll_initial(&self) -> Duration {
        Duration::from_millis(self.lock_poll_initial_ms)
    }

    pub const fn lock_poll_max(&self) -> Duration {
        Duration::from_millis(self.lock_poll_max_ms)
    }

    pub const fn fallback_poll_interval(&self) -> Duration {
        Duration::from_millis(self.fallback_poll_interval_ms)
    }

    pub fn stale_ttl(&self) -> Option<Duration> {
        self.stale_ttl_ms.map(Duration::from_millis)
    }

    pub const fn delete_initial_backoff(&self) -> Duration {
        Duration::from_millis(self.delete_initial_backoff_ms)
    }

    pub const fn delete_max_backoff(&self) -> Duration {
        Duration::from_millis(self.delete_max_backoff_ms)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format for stdout
    #[serde(default)]
    pub format: LogFormat,

    /// Directory for rolling JSON log files (stdout only when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,

    /// Log file rotation
    #[serde(default)]
    pub rotation: RotationPolicy,

    /// Mirror logs to stdout when writing files
    #[serde(default = "default_true")]
    pub enable_stdout: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
            log_dir: None,
            rotation: RotationPolicy::default(),
            enable_stdout: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

/// Redis cache store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RedisConfig {
    /// Connection URL, e.g. `redis://127.0.0.1:6379`. In-memory store when unset.
    #[serde(default)]
    pub url: Option<String>,

    /// Maximum pooled connections
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Per-command timeout
    #[serde(default = "default_command_timeout_ms")]
    pub command_timeout_ms: u64,
}

const fn default_pool_size() -> usize {
    16
}

const fn default_command_timeout_ms() -> u64 {
    500
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: None,
            pool_size: default_pool_size(),
            command_timeout_ms: default_command_timeout_ms(),
        }
    }
}
