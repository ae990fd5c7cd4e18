//! txgate entry point.
//!
//! Parses the command line, loads configuration and runs the command
//! against the applications this binary ships.

use clap::Parser;
use tracing_subscriber::EnvFilter;

use txgate::cli::{self, Cli};
use txgate::config::OrmConfig;
use txgate::puppies;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    // Load configuration
    let config = match OrmConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!(error = %e, "invalid configuration");
            std::process::exit(1);
        }
    };

    let catalog = puppies::catalog(config.clone());
    if let Err(e) = cli::run(cli, config, &catalog).await {
        tracing::error!("command failed: {e:#}");
        std::process::exit(1);
    }
}
