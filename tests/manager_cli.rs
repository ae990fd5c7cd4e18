//! Integration tests for app resolution, the manager and the CLI commands.
//!
//! Tests:
//! - `puppies.app:app` resolves; malformed and unknown locators do not
//! - a full migration workflow against an on-disk SQLite database, one
//!   CLI invocation per step, as an operator would run it
//! - table creation and removal through the CLI

#![allow(clippy::panic)]

mod common;

use std::path::Path;

use clap::Parser;
use tempfile::TempDir;

use txgate::app::AppLocator;
use txgate::cli::{self, Cli};
use txgate::config::OrmConfig;
use txgate::error::OrmError;
use txgate::manager::Manager;
use txgate::puppies;

fn file_config(dir: &Path) -> OrmConfig {
    OrmConfig {
        database_url: format!("sqlite://{}", dir.join("puppies.db").display()),
        migrations_dir: dir.join("migrations"),
        ..common::memory_config()
    }
}

fn workspace() -> TempDir {
    match tempfile::tempdir() {
        Ok(dir) => dir,
        Err(e) => panic!("tempdir should be created: {e}"),
    }
}

async fn txgate(config: &OrmConfig, args: &[&str]) -> anyhow::Result<()> {
    let mut argv = vec!["txgate", "--app", "puppies.app:app"];
    argv.extend_from_slice(args);
    let cli = match Cli::try_parse_from(argv) {
        Ok(cli) => cli,
        Err(e) => panic!("{args:?} should parse: {e}"),
    };
    let catalog: AppLocator = puppies::catalog(config.clone());
    cli::run(cli, config.clone(), &catalog).await
}

async fn manager(config: &OrmConfig) -> Manager {
    let catalog = puppies::catalog(config.clone());
    match Manager::from_locator("puppies.app:app", &catalog, &config.migrations_dir).await {
        Ok(manager) => manager,
        Err(e) => panic!("manager should load: {e}"),
    }
}

#[tokio::test]
async fn locators_resolve_or_fail_with_resolution_errors() {
    let catalog = puppies::catalog(common::memory_config());

    let Ok(app) = catalog.resolve("puppies.app:app").await else {
        panic!("puppies.app:app should resolve");
    };
    assert!(app.provider().is_some());

    for locator in ["not-a-locator", "pkg.mod:missing_name", "puppies.app:missing_name"] {
        let result = Manager::from_locator(locator, &catalog, "migrations").await;
        assert!(
            matches!(result, Err(OrmError::Resolution(_))),
            "{locator:?} should not resolve"
        );
    }
}

#[tokio::test]
async fn missing_locator_is_a_configuration_error() {
    let cli = Cli {
        app: None,
        migrate_dir: None,
        verbose: false,
        command: cli::Command::Status,
    };
    let catalog = puppies::catalog(common::memory_config());
    let Err(e) = cli::run(cli, common::memory_config(), &catalog).await else {
        panic!("status without an app should fail");
    };
    assert!(matches!(
        e.downcast_ref::<OrmError>(),
        Some(OrmError::Configuration(_))
    ));
}

#[tokio::test]
async fn migration_workflow_across_invocations() {
    let dir = workspace();
    let config = file_config(dir.path());

    assert!(txgate(&config, &["create", "add_puppy", "puppies.models"]).await.is_ok());
    assert!(txgate(&config, &["create", "tweak"]).await.is_ok());

    let status = match manager(&config).await.status().await {
        Ok(status) => status,
        Err(e) => panic!("status should load: {e}"),
    };
    assert!(status.done.is_empty());
    assert_eq!(status.pending, ["001_add_puppy", "002_tweak"]);
    assert_eq!(status.models, ["puppies.models.Puppy"]);

    assert!(txgate(&config, &["upgrade", "001_add_puppy"]).await.is_ok());
    assert!(txgate(&config, &["upgrade", "--fake"]).await.is_ok());
    assert!(txgate(&config, &["status"]).await.is_ok());

    let manager = manager(&config).await;
    assert_eq!(
        manager.router().done().await.ok(),
        Some(vec!["001_add_puppy".to_string(), "002_tweak".to_string()])
    );
    let Some(provider) = manager.app().provider() else {
        panic!("demo registers a provider");
    };
    let count: Result<i64, _> = sqlx::query_scalar("SELECT COUNT(*) FROM puppy")
        .fetch_one(provider.database().pool())
        .await;
    assert_eq!(count.ok(), Some(0));

    assert!(txgate(&config, &["merge"]).await.is_ok());
    assert_eq!(
        manager.router().todo().await.ok(),
        Some(vec!["001_initial".to_string()])
    );
    assert_eq!(
        manager.router().done().await.ok(),
        Some(vec!["001_initial".to_string()])
    );

    assert!(txgate(&config, &["downgrade"]).await.is_ok());
    assert_eq!(manager.router().done().await.ok(), Some(Vec::new()));
    let gone: Result<i64, _> = sqlx::query_scalar("SELECT COUNT(*) FROM puppy")
        .fetch_one(provider.database().pool())
        .await;
    assert!(gone.is_err(), "downgrade should drop the puppy table");

    assert!(txgate(&config, &["downgrade"]).await.is_err());
}

#[tokio::test]
async fn create_and_drop_tables_commands() {
    let dir = workspace();
    let config = file_config(dir.path());

    assert!(txgate(&config, &["create-tables"]).await.is_ok());
    let manager = manager(&config).await;
    let Some(provider) = manager.app().provider() else {
        panic!("demo registers a provider");
    };
    let count: Result<i64, _> = sqlx::query_scalar("SELECT COUNT(*) FROM puppy")
        .fetch_one(provider.database().pool())
        .await;
    assert_eq!(count.ok(), Some(0));

    assert!(txgate(&config, &["drop-tables"]).await.is_ok());
    let gone: Result<i64, _> = sqlx::query_scalar("SELECT COUNT(*) FROM puppy")
        .fetch_one(provider.database().pool())
        .await;
    assert!(gone.is_err());
}
