//! Database management for a composed application.
//!
//! [`Manager`] finds the [`DatabaseProvider`] of an [`App`] and exposes the
//! operations behind the CLI: migrations through a [`MigrationRouter`],
//! table creation and removal for every registered model, and a status
//! report.

pub mod router;
pub mod script;

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

pub use router::MigrationRouter;
pub use script::MigrationScript;

use crate::app::{App, AppLocator};
use crate::db::DatabaseProvider;
use crate::error::OrmError;
use crate::model::ModelDefinition;

/// Default directory for migration files.
pub const DEFAULT_MIGRATE_DIR: &str = "migrations";

/// Database manager bound to one application.
#[derive(Debug)]
pub struct Manager {
    app: App,
    provider: Arc<DatabaseProvider>,
    router: MigrationRouter,
}

impl Manager {
    /// Manager for `app`, with migrations in `migrate_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Resolution`] if the app has no
    /// [`DatabaseProvider`] component.
    pub fn new(app: App, migrate_dir: impl Into<PathBuf>) -> Result<Self, OrmError> {
        let provider = app.provider().ok_or_else(|| {
            OrmError::Resolution(format!("no DatabaseProvider found in app {}", app.name()))
        })?;
        let router = MigrationRouter::new(
            provider.resolve(),
            provider.registry().clone(),
            migrate_dir,
        );
        Ok(Self {
            app,
            provider,
            router,
        })
    }

    /// Resolves `locator` in `catalog` and builds a manager for it.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Resolution`] if the locator cannot be resolved or
    /// the app has no [`DatabaseProvider`].
    pub async fn from_locator(
        locator: &str,
        catalog: &AppLocator,
        migrate_dir: impl Into<PathBuf>,
    ) -> Result<Self, OrmError> {
        let app = catalog.resolve(locator).await?;
        Self::new(app, migrate_dir)
    }

    /// The managed application.
    #[must_use]
    pub fn app(&self) -> &App {
        &self.app
    }

    /// The migration router.
    #[must_use]
    pub fn router(&self) -> &MigrationRouter {
        &self.router
    }

    /// Applies migrations up to `target` (all pending without one).
    ///
    /// # Errors
    ///
    /// See [`MigrationRouter::run`].
    pub async fn upgrade(&self, target: Option<&str>, fake: bool) -> Result<Vec<String>, OrmError> {
        self.router.run(target, fake).await
    }

    /// Rolls migrations back down to `target` (the last one without one).
    ///
    /// # Errors
    ///
    /// See [`MigrationRouter::rollback`].
    pub async fn downgrade(&self, target: Option<&str>) -> Result<Vec<String>, OrmError> {
        self.router.rollback(target).await
    }

    /// Merges every migration into one.
    ///
    /// # Errors
    ///
    /// See [`MigrationRouter::merge`].
    pub async fn merge(&self, name: Option<&str>) -> Result<String, OrmError> {
        self.router.merge(name).await
    }

    /// Creates a migration, generated from `module`'s models when given.
    ///
    /// # Errors
    ///
    /// See [`MigrationRouter::create`].
    pub async fn create(&self, name: &str, module: Option<&str>) -> Result<String, OrmError> {
        self.router.create(name, module).await
    }

    /// Registered models, ordered by qualified name.
    #[must_use]
    pub fn models(&self) -> Vec<Arc<ModelDefinition>> {
        self.provider.registry().list()
    }

    /// Creates the tables of every registered model.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Query`] if a statement fails.
    pub async fn create_tables(&self) -> Result<(), OrmError> {
        self.provider.database().create_tables(&self.models()).await
    }

    /// Drops the tables of every registered model.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Query`] if a statement fails.
    pub async fn drop_tables(&self) -> Result<(), OrmError> {
        self.provider.database().drop_tables(&self.models()).await
    }

    /// Applied and pending migrations plus registered models.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Migration`] if the migrations cannot be listed.
    pub async fn status(&self) -> Result<Status, OrmError> {
        Ok(Status {
            done: self.router.done().await?,
            pending: self.router.diff().await?,
            models: self
                .models()
                .iter()
                .map(|model| model.qualified_name())
                .collect(),
        })
    }
}

/// Snapshot returned by [`Manager::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    /// Applied migrations.
    pub done: Vec<String>,
    /// Pending migrations.
    pub pending: Vec<String>,
    /// Qualified names of registered models.
    pub models: Vec<String>,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Migrations")?;
        writeln!(f, "----------")?;
        for name in &self.done {
            writeln!(f, "[x] {name}")?;
        }
        for name in &self.pending {
            writeln!(f, "[ ] {name}")?;
        }
        writeln!(f)?;
        writeln!(f, "Models")?;
        writeln!(f, "------")?;
        match self.models.len() {
            0 => write!(f, "No models found.")?,
            1 => write!(f, "1 model found:")?,
            n => write!(f, "{n} models found:")?,
        }
        for model in &self.models {
            write!(f, "\n - {model}")?;
        }
        Ok(())
    }
}
