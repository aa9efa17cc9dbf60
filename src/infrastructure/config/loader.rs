use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project config file, merged over the defaults.
pub const CONFIG_FILE: &str = "cacheward.yaml";

/// Optional local overrides, merged over [`CONFIG_FILE`].
pub const LOCAL_CONFIG_FILE: &str = "cacheward.local.yaml";

/// Prefix for environment overrides, e.g. `CACHEWARD_CACHE__BASE_TTL_MS`.
pub const ENV_PREFIX: &str = "CACHEWARD_";

/// Configuration error types
#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("Invalid jitter_fraction: {0}. Must be between 0.0 and 1.0")]
    InvalidJitterFraction(f64),

    #[error("Invalid base_ttl_ms: must be positive")]
    ZeroBaseTtl,

    #[error("Invalid negative_ttl_ms: {negative} must not exceed base_ttl_ms ({base})")]
    NegativeTtlExceedsBase { negative: u64, base: u64 },

    #[error("Invalid lock_lease_ms: must be positive")]
    ZeroLockLease,

    #[error(
        "Invalid lock poll configuration: lock_poll_initial_ms ({0}) must be positive and at most lock_poll_max_ms ({1})"
    )]
    InvalidLockPoll(u64, u64),

    #[error(
        "Invalid backoff configuration: delete_initial_backoff_ms ({0}) must be positive and at most delete_max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid redis pool_size: must be at least 1")]
    InvalidPoolSize,

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. cacheward.yaml
    /// 3. cacheward.local.yaml (optional local overrides)
    /// 4. Environment variables (CACHEWARD_* prefix, `__` separates sections)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(CONFIG_FILE))
            .merge(Yaml::file(LOCAL_CONFIG_FILE))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring environment overrides
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        let cache = &config.cache;

        if !(0.0..=1.0).contains(&cache.jitter_fraction) {
            return Err(ConfigError::InvalidJitterFraction(cache.jitter_fraction));
        }

        if cache.base_ttl_ms == 0 {
            return Err(ConfigError::ZeroBaseTtl);
        }

        if cache.negative_ttl_ms > cache.base_ttl_ms {
            return Err(ConfigError::NegativeTtlExceedsBase {
                negative: cache.negative_ttl_ms,
                base: cache.base_ttl_ms,
            });
        }

        if cache.lock_lease_ms == 0 {
            return Err(ConfigError::ZeroLockLease);
        }

        if cache.lock_poll_initial_ms == 0 || cache.lock_poll_initial_ms > cache.lock_poll_max_ms {
            return Err(ConfigError::InvalidLockPoll(
                cache.lock_poll_initial_ms,
                cache.lock_poll_max_ms,
            ));
        }

        if cache.delete_initial_backoff_ms == 0
            || cache.delete_initial_backoff_ms > cache.delete_max_backoff_ms
        {
            return Err(ConfigError::InvalidBackoff(
                cache.delete_initial_backoff_ms,
                cache.delete_max_backoff_ms,
            ));
        }

        if cache.stale_ttl_ms == Some(0) {
            return Err(ConfigError::ValidationFailed(
                "stale_ttl_ms must be positive when set".to_string(),
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        if config.redis.pool_size == 0 {
            return Err(ConfigError::InvalidPoolSize);
        }

        if config.redis.url.as_deref().is_some_and(str::is_empty) {
            return Err(ConfigError::ValidationFailed(
                "redis url cannot be empty when set".to_string(),
            ));
        }

        Ok(())
    }
}
