//! `cacheward config`: show the effective configuration or validate a file.

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::cli::output::{key_value_table, output, CommandOutput};
use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommands,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Print the merged configuration (defaults, files, environment)
    Show,
    /// Check that the configuration loads and passes validation
    Validate,
}

#[derive(Debug, Serialize)]
pub struct ConfigShowOutput {
    pub source: String,
    pub config: Config,
}

impl CommandOutput for ConfigShowOutput {
    fn to_human(&self) -> String {
        let cache = &self.config.cache;
        let table = key_value_table(
            ("Setting", "Value"),
            [
                ("cache.base_ttl_ms", cache.base_ttl_ms.to_string()),
                ("cache.jitter_fraction", cache.jitter_fraction.to_string()),
                ("cache.negative_caching", cache.negative_caching.to_string()),
                ("cache.negative_ttl_ms", cache.negative_ttl_ms.to_string()),
                ("cache.lock_lease_ms", cache.lock_lease_ms.to_string()),
                ("cache.lock_wait_ms", cache.lock_wait_ms.to_string()),
                (
                    "cache.lock_poll_ms",
                    format!("{}..{}", cache.lock_poll_initial_ms, cache.lock_poll_max_ms),
                ),
                ("cache.fallback_polls", cache.fallback_polls.to_string()),
                (
                    "cache.stale_ttl_ms",
                    cache
                        .stale_ttl_ms
                        .map_or_else(|| "disabled".to_string(), |ms| ms.to_string()),
                ),
                ("cache.local_coalescing", cache.local_coalescing.to_string()),
                ("cache.delete_retries", cache.delete_retries.to_string()),
                ("logging.level", self.config.logging.level.clone()),
                ("logging.format", format!("{:?}", self.config.logging.format).to_lowercase()),
                (
                    "redis.url",
                    self.config
                        .redis
                        .url
                        .clone()
                        .unwrap_or_else(|| "unset (in-memory store)".to_string()),
                ),
                ("redis.pool_size", self.config.redis.pool_size.to_string()),
            ],
        );
        format!("Configuration from {}:\n{table}", self.source)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

#[derive(Debug, Serialize)]
pub struct ConfigValidateOutput {
    pub source: String,
    pub valid: bool,
}

impl CommandOutput for ConfigValidateOutput {
    fn to_human(&self) -> String {
        format!("Configuration from {} is valid.", self.source)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub fn execute(args: ConfigArgs, file: Option<&Path>, json_mode: bool) -> Result<()> {
    let (config, source) = load(file)?;
    match args.command {
        ConfigCommands::Show => output(&ConfigShowOutput { source, config }, json_mode),
        ConfigCommands::Validate => output(&ConfigValidateOutput { source, valid: true }, json_mode),
    }
    Ok(())
}

fn load(file: Option<&Path>) -> Result<(Config, String)> {
    match file {
        Some(path) => {
            let config = ConfigLoader::load_from_file(path)
                .with_context(|| format!("Invalid configuration in {}", path.display()))?;
            Ok((config, path.display().to_string()))
        }
        None => {
            let config = ConfigLoader::load().context("Invalid configuration")?;
            let source = PathBuf::from(crate::infrastructure::config::loader::CONFIG_FILE);
            Ok((config, format!("{} (with defaults and environment)", source.display())))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_reports_file_source() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "cache:\n  stale_ttl_ms: 60000").unwrap();

        let (config, source) = load(Some(file.path())).unwrap();
        assert_eq!(config.cache.stale_ttl_ms, Some(60_000));
        assert_eq!(source, file.path().display().to_string());
    }

    #[test]
    fn test_invalid_file_names_the_path() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "logging:\n  level: chatty").unwrap();

        let err = load(Some(file.path())).unwrap_err();
        assert!(format!("{err:#}").contains("chatty"));
    }

    #[test]
    fn test_show_output_mentions_stale_setting() {
        let out = ConfigShowOutput {
            source: "test".to_string(),
            config: Config::default(),
        };
        assert!(out.to_human().contains("disabled"));
        assert_eq!(out.to_json()["config"]["cache"]["negative_ttl_ms"], 30_000);
    }
}
