//! CLI type definitions
//!
//! This module contains clap command structures that define the CLI interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::cli::commands::config::ConfigArgs;
use crate::cli::commands::simulate::SimulateArgs;

#[derive(Parser, Debug)]
#[command(name = "cacheward")]
#[command(about = "Cacheward - read-through cache consistency layer", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Load configuration from this file instead of cacheward.yaml
    #[arg(short, long, global = true, env = "CACHEWARD_CONFIG")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Drive concurrent reads and writes through the cache and report what happened
    Simulate(SimulateArgs),

    /// Inspect and validate configuration
    Config(ConfigArgs),
}
