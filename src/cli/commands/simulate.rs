//! `cacheward simulate`: drive a burst of concurrent reads, then a round of
//! writes, through a [`CachedRepository`] and report what the cache did.

use anyhow::{Context, Result};
use clap::Args;
use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use uuid::Uuid;

use crate::adapters::cache::CachedRepository;
use crate::adapters::memory::{InMemoryBackingStore, InMemoryCacheStore};
use crate::cli::output::{key_value_table, output, CommandOutput};
use crate::domain::models::{CacheKey, Config, Lookup};
use crate::domain::ports::CacheStore;
use crate::services::metrics::MetricsSnapshot;

#[derive(Args, Debug, Clone)]
pub struct SimulateArgs {
    /// Concurrent readers per round
    #[arg(short = 'n', long, default_value = "100")]
    pub concurrency: usize,

    /// Distinct keys the readers spread over
    #[arg(short, long, default_value = "1")]
    pub keys: u64,

    /// Read rounds; every round after the first should be served from cache
    #[arg(short, long, default_value = "2")]
    pub rounds: u32,

    /// Artificial backing store latency
    #[arg(long, default_value = "50")]
    pub loader_delay_ms: u64,

    /// Fraction of keys absent from the backing store (0.0-1.0)
    #[arg(long, default_value = "0.0", value_parser = parse_ratio)]
    pub missing_ratio: f64,

    /// Writes applied after the read rounds, each followed by a verification read
    #[arg(short, long, default_value = "1")]
    pub writes: u32,
}

impl Default for SimulateArgs {
    fn default() -> Self {
        Self {
            concurrency: 100,
            keys: 1,
            rounds: 2,
            loader_delay_ms: 50,
            missing_ratio: 0.0,
            writes: 1,
        }
    }
}

fn parse_ratio(raw: &str) -> Result<f64, String> {
    let ratio: f64 = raw.parse().map_err(|e| format!("{e}"))?;
    if (0.0..=1.0).contains(&ratio) {
        Ok(ratio)
    } else {
        Err(format!("{ratio} is not between 0.0 and 1.0"))
    }
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub cache_store: &'static str,
    pub requests: u64,
    pub found: u64,
    pub not_found: u64,
    pub errors: u64,
    /// Distinct answers observed for a single key within one round
    pub divergent_reads: u64,
    pub backing_loads: u64,
    pub writes: u32,
    pub consistency_warnings: u64,
    /// Reads after a write that returned the pre-write value
    pub stale_reads: u64,
    pub elapsed_ms: u128,
    pub metrics: MetricsSnapshot,
}

impl CommandOutput for SimulationReport {
    fn to_human(&self) -> String {
        let table = key_value_table(
            ("Measure", "Value"),
            [
                ("cache store", self.cache_store.to_string()),
                ("requests", self.requests.to_string()),
                ("found", self.found.to_string()),
                ("not found", self.not_found.to_string()),
                ("errors", self.errors.to_string()),
                ("divergent reads", self.divergent_reads.to_string()),
                ("backing store loads", self.backing_loads.to_string()),
                ("cache hits", self.metrics.hits.to_string()),
                ("sentinel hits", self.metrics.sentinel_hits.to_string()),
                ("misses", self.metrics.misses.to_string()),
                ("lock timeouts", self.metrics.lock_timeouts.to_string()),
                ("direct loads", self.metrics.direct_loads.to_string()),
                ("stale served", self.metrics.stale_served.to_string()),
                ("cache errors", self.metrics.cache_errors.to_string()),
                ("writes", self.writes.to_string()),
                ("evictions", self.metrics.evictions.to_string()),
                ("consistency warnings", self.consistency_warnings.to_string()),
                ("stale reads after write", self.stale_reads.to_string()),
                ("elapsed", format!("{} ms", self.elapsed_ms)),
            ],
        );
        format!("Simulation summary:\n{table}")
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }
}

pub async fn execute(args: SimulateArgs, config: Config, json_mode: bool) -> Result<()> {
    let (store, label) = cache_store(&config)?;
    let report = run(&args, &config, store, label).await?;
    output(&report, json_mode);
    Ok(())
}

#[cfg(feature = "redis")]
fn cache_store(config: &Config) -> Result<(Arc<dyn CacheStore>, &'static str)> {
    use crate::adapters::redis::RedisCacheStore;

    if config.redis.url.is_some() {
        let store = RedisCacheStore::from_config(&config.redis)
            .context("Failed to build Redis cache store")?;
        return Ok((Arc::new(store), "redis"));
    }
    Ok((Arc::new(InMemoryCacheStore::new()), "memory"))
}

#[cfg(not(feature = "redis"))]
fn cache_store(config: &Config) -> Result<(Arc<dyn CacheStore>, &'static str)> {
    if config.redis.url.is_some() {
        anyhow::bail!("redis.url is set but cacheward was built without the `redis` feature");
    }
    Ok((Arc::new(InMemoryCacheStore::new()), "memory"))
}

/// Run a simulation against `store` with an in-memory backing store.
pub async fn run(
    args: &SimulateArgs,
    config: &Config,
    store: Arc<dyn CacheStore>,
    cache_store: &'static str,
) -> Result<SimulationReport> {
    anyhow::ensure!(args.keys > 0, "--keys must be at least 1");

    // Fresh namespace per run so a shared store never answers from an old run.
    let namespace = format!("sim_{}", Uuid::new_v4().simple());
    let keys = (0..args.keys)
        .map(|id| CacheKey::new(&namespace, id))
        .collect::<Result<Vec<_>, _>>()
        .context("Failed to build simulation keys")?;

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let missing = (args.keys as f64 * args.missing_ratio).round() as u64;
    let backing = InMemoryBackingStore::with_load_delay(Duration::from_millis(args.loader_delay_ms)).shared();
    for (id, key) in keys.iter().enumerate().skip(missing as usize) {
        backing.seed(key.clone(), format!("value-{id}-v0")).await;
    }

    let repo = Arc::new(CachedRepository::new(
        Arc::clone(&backing),
        store,
        config.cache.clone(),
    ));

    info!(
        concurrency = args.concurrency,
        keys = args.keys,
        rounds = args.rounds,
        missing,
        "starting simulation"
    );
    let started = Instant::now();

    let mut report = SimulationReport {
        cache_store,
        requests: 0,
        found: 0,
        not_found: 0,
        errors: 0,
        divergent_reads: 0,
        backing_loads: 0,
        writes: args.writes,
        consistency_warnings: 0,
        stale_reads: 0,
        elapsed_ms: 0,
        metrics: MetricsSnapshot::default(),
    };

    for _ in 0..args.rounds {
        let reads = (0..args.concurrency).map(|i| {
            let repo = Arc::clone(&repo);
            let key = keys[i % keys.len()].clone();
            tokio::spawn(async move {
                let result = repo.get(&key).await;
                (key, result)
            })
        });

        let mut answers: std::collections::HashMap<CacheKey, Lookup<String>> =
            std::collections::HashMap::new();
        for joined in join_all(reads).await {
            let (key, result) = joined.context("Simulated reader panicked")?;
            report.requests += 1;
            match result {
                Ok(lookup) => {
                    if lookup.is_found() {
                        report.found += 1;
                    } else {
                        report.not_found += 1;
                    }
                    match answers.get(&key) {
                        Some(first) if *first != lookup => report.divergent_reads += 1,
                        Some(_) => {}
                        None => {
                            answers.insert(key, lookup);
                        }
                    }
                }
                Err(_) => report.errors += 1,
            }
        }
    }

    let write_key = &keys[keys.len() - 1];
    for version in 1..=args.writes {
        let value = format!("value-written-v{version}");
        let put = repo
            .save(write_key, value.clone())
            .await
            .context("Simulated write failed")?;
        if put.warning.is_some() {
            report.consistency_warnings += 1;
        }
        match repo.get(write_key).await {
            Ok(Lookup::Found(seen)) if seen == value => {}
            Ok(_) => report.stale_reads += 1,
            Err(_) => report.errors += 1,
        }
    }

    report.elapsed_ms = started.elapsed().as_millis();
    report.backing_loads = backing.load_count();
    report.metrics = repo.metrics();
    info!(
        requests = report.requests,
        backing_loads = report.backing_loads,
        elapsed_ms = report.elapsed_ms,
        "simulation finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_hot_key_burst_loads_once() {
        let args = SimulateArgs {
            concurrency: 50,
            loader_delay_ms: 20,
            writes: 0,
            ..SimulateArgs::default()
        };
        let report = run(&args, &Config::default(), Arc::new(InMemoryCacheStore::new()), "memory")
            .await
            .unwrap();

        assert_eq!(report.requests, 100);
        assert_eq!(report.found, 100);
        assert_eq!(report.errors, 0);
        assert_eq!(report.divergent_reads, 0);
        assert_eq!(report.backing_loads, 1);
    }

    #[tokio::test]
    async fn test_missing_keys_are_cached_as_absent() {
        let args = SimulateArgs {
            concurrency: 20,
            keys: 2,
            missing_ratio: 0.5,
            loader_delay_ms: 5,
            writes: 0,
            ..SimulateArgs::default()
        };
        let report = run(&args, &Config::default(), Arc::new(InMemoryCacheStore::new()), "memory")
            .await
            .unwrap();

        assert_eq!(report.found, 20);
        assert_eq!(report.not_found, 20);
        assert_eq!(report.backing_loads, 2);
        assert!(report.metrics.sentinel_hits > 0);
    }

    #[tokio::test]
    async fn test_writes_are_never_read_stale() {
        let args = SimulateArgs {
            concurrency: 10,
            loader_delay_ms: 0,
            writes: 3,
            ..SimulateArgs::default()
        };
        let report = run(&args, &Config::default(), Arc::new(InMemoryCacheStore::new()), "memory")
            .await
            .unwrap();

        assert_eq!(report.stale_reads, 0);
        assert_eq!(report.consistency_warnings, 0);
        assert_eq!(report.metrics.evictions, 3);
    }

    #[test]
    fn test_parse_ratio_bounds() {
        assert_eq!(parse_ratio("0.25"), Ok(0.25));
        assert!(parse_ratio("-0.1").is_err());
        assert!(parse_ratio("abc").is_err());
    }

    #[test]
    fn test_human_output_lists_loads() {
        let report = SimulationReport {
            cache_store: "memory",
            requests: 10,
            found: 10,
            not_found: 0,
            errors: 0,
            divergent_reads: 0,
            backing_loads: 1,
            writes: 0,
            consistency_warnings: 0,
            stale_reads: 0,
            elapsed_ms: 12,
            metrics: MetricsSnapshot::default(),
        };
        let human = report.to_human();
        assert!(human.contains("backing store loads"));
        assert!(human.contains("memory"));
    }
}
