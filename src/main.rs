//! Cacheward CLI entry point.

use clap::Parser;

use cacheward::cli::commands::{config, simulate};
use cacheward::cli::{Cli, Commands};
use cacheward::domain::models::LoggingConfig;
use cacheward::infrastructure::config::ConfigLoader;
use cacheward::infrastructure::logging::LoggerImpl;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    };

    // An invalid config still gets logged with the defaults; the command reports it.
    let logging = loaded
        .as_ref()
        .map(|c| c.logging.clone())
        .unwrap_or_else(|_| LoggingConfig::default());
    let _logger = match LoggerImpl::init(&logging) {
        Ok(logger) => Some(logger),
        Err(err) => {
            eprintln!("Warning: logging disabled: {err:#}");
            None
        }
    };

    let result = match cli.command {
        Commands::Simulate(args) => match loaded {
            Ok(config) => simulate::execute(args, config, cli.json).await,
            Err(err) => Err(err),
        },
        Commands::Config(args) => config::execute(args, cli.config.as_deref(), cli.json),
    };

    if let Err(err) = result {
        cacheward::cli::handle_error(err, cli.json);
    }
}
