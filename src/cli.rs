//! Command-line interface of the `txgate` binary.
//!
//! Uses clap derive macros. Every command first resolves the application
//! named by `--app` (or `APISTAR_APP`) in the binary's [`AppLocator`].

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tower_http::cors::CorsLayer;

use crate::app::AppLocator;
use crate::config::OrmConfig;
use crate::error::OrmError;
use crate::manager::Manager;

/// Database migrations and models management for transactional apps.
#[derive(Parser, Debug)]
#[command(name = "txgate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Application locator (<package>.<module>:<variable>)
    #[arg(short, long, global = true, env = "APISTAR_APP")]
    pub app: Option<String>,

    /// Directory holding migration files [default: MIGRATIONS_DIR or migrations]
    #[arg(long, global = true)]
    pub migrate_dir: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Database migrations and models status
    Status,
    /// Run database migrations sequentially
    Upgrade {
        /// Last migration to be applied
        target: Option<String>,
        /// Record migrations without running them
        #[arg(long)]
        fake: bool,
    },
    /// Roll back database migrations sequentially
    Downgrade {
        /// Last migration to be rolled back
        target: Option<String>,
    },
    /// Merge all migrations into a single one
    Merge {
        /// Resulting migration name
        name: Option<String>,
    },
    /// Create a new migration, generated from a module's models when one is given
    Create {
        /// Migration name
        name: String,
        /// Module whose models define the migration
        module: Option<String>,
    },
    /// Create the tables of every registered model
    CreateTables,
    /// Drop the tables of every registered model
    DropTables,
    /// Serve the application over HTTP
    Serve,
}

impl Cli {
    /// The application locator.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Configuration`] when neither `--app` nor
    /// `APISTAR_APP` is set.
    pub fn locator(&self) -> Result<&str, OrmError> {
        self.app
            .as_deref()
            .filter(|app| !app.trim().is_empty())
            .ok_or_else(|| {
                OrmError::Configuration(
                    "application not specified, use the APISTAR_APP environment variable or --app"
                        .to_string(),
                )
            })
    }
}

/// Runs the parsed command.
///
/// # Errors
///
/// Returns the failure of the command, with context.
pub async fn run(cli: Cli, config: OrmConfig, catalog: &AppLocator) -> anyhow::Result<()> {
    let locator = cli.locator()?;

    if cli.command == Command::Serve {
        return serve(locator, &config, catalog).await;
    }

    let migrate_dir = cli
        .migrate_dir
        .clone()
        .unwrap_or_else(|| config.migrations_dir.clone());
    let manager = Manager::from_locator(locator, catalog, migrate_dir)
        .await
        .with_context(|| format!("cannot load app {locator}"))?;

    match cli.command {
        Command::Status => {
            let status = manager.status().await?;
            println!("{status}");
        }
        Command::Upgrade { target, fake } => {
            let applied = manager.upgrade(target.as_deref(), fake).await?;
            tracing::info!(count = applied.len(), fake, "upgrade finished");
        }
        Command::Downgrade { target } => {
            let reverted = manager.downgrade(target.as_deref()).await?;
            tracing::info!(count = reverted.len(), "downgrade finished");
        }
        Command::Merge { name } => {
            let merged = manager.merge(name.as_deref()).await?;
            tracing::info!(migration = %merged, "merge finished");
        }
        Command::Create { name, module } => {
            let created = manager.create(&name, module.as_deref()).await?;
            tracing::info!(migration = %created, "migration created");
        }
        Command::CreateTables => {
            manager.create_tables().await?;
            tracing::info!(models = manager.models().len(), "tables created");
        }
        Command::DropTables => {
            manager.drop_tables().await?;
            tracing::info!(models = manager.models().len(), "tables dropped");
        }
        Command::Serve => {}
    }
    Ok(())
}

async fn serve(locator: &str, config: &OrmConfig, catalog: &AppLocator) -> anyhow::Result<()> {
    let app = catalog
        .resolve(locator)
        .await
        .with_context(|| format!("cannot load app {locator}"))?;
    tracing::info!(app = %app.name(), addr = %config.listen_addr, "starting server");

    let router = app.into_router().layer(CorsLayer::permissive());
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("cannot bind {}", config.listen_addr))?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutting down");
        })
        .await
        .context("server failed")
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        match Cli::try_parse_from(args) {
            Ok(cli) => cli,
            Err(e) => panic!("{args:?} should parse: {e}"),
        }
    }

    #[test]
    fn commands_parse() {
        let cli = parse(&["txgate", "--app", "puppies.app:app", "upgrade", "002_b", "--fake"]);
        assert_eq!(cli.locator().ok(), Some("puppies.app:app"));
        assert_eq!(
            cli.command,
            Command::Upgrade {
                target: Some("002_b".to_string()),
                fake: true
            }
        );

        let cli = parse(&["txgate", "create", "add_puppy", "puppies.models", "-a", "x.y:z"]);
        assert_eq!(
            cli.command,
            Command::Create {
                name: "add_puppy".to_string(),
                module: Some("puppies.models".to_string())
            }
        );
        assert_eq!(cli.app.as_deref(), Some("x.y:z"));

        assert_eq!(parse(&["txgate", "-a", "a:b", "create-tables"]).command, Command::CreateTables);
        assert_eq!(
            parse(&["txgate", "-a", "a:b", "downgrade"]).command,
            Command::Downgrade { target: None }
        );
        assert_eq!(
            parse(&["txgate", "-a", "a:b", "merge"]).command,
            Command::Merge { name: None }
        );
    }

    #[test]
    fn create_requires_a_name() {
        assert!(Cli::try_parse_from(["txgate", "create"]).is_err());
    }

    #[test]
    fn blank_locator_is_a_configuration_error() {
        let cli = Cli {
            app: Some("  ".to_string()),
            migrate_dir: None,
            verbose: false,
            command: Command::Status,
        };
        assert!(matches!(cli.locator(), Err(OrmError::Configuration(_))));
    }
}
