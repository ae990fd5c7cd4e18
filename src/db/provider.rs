//! The database provider component.

use std::fmt;

use super::{Database, DatabaseOptions, DatabaseUrl};
use crate::error::OrmError;
use crate::model::ModelRegistry;

/// Builds the database handle once and serves it for the life of the app.
///
/// Connecting binds the handle into the registry's proxy, so every model
/// declared on that registry (before or after) uses it. Connecting a second
/// provider against the same registry rebinds the proxy.
#[derive(Clone)]
pub struct DatabaseProvider {
    database: Database,
    registry: ModelRegistry,
}

impl DatabaseProvider {
    /// Parses `url`, opens the pool eagerly and binds it for `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Configuration`] for a malformed or unsupported
    /// URL, or when the backend cannot be reached.
    pub async fn connect(
        url: &str,
        options: DatabaseOptions,
        registry: &ModelRegistry,
    ) -> Result<Self, OrmError> {
        let url = DatabaseUrl::parse(url)?;
        tracing::debug!(url = %url, dialect = %url.dialect(), "opening database");

        let database = Database::open(url, &options).await?;
        match registry.proxy().bind(database.clone()) {
            Some(_) => tracing::info!(url = %database.url(), "database rebound"),
            None => tracing::info!(url = %database.url(), "database bound"),
        }

        Ok(Self {
            database,
            registry: registry.clone(),
        })
    }

    /// The shared handle. Every call returns the same instance.
    #[must_use]
    pub fn resolve(&self) -> Database {
        self.database.clone()
    }

    /// Borrows the shared handle.
    #[must_use]
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// Registry whose models this provider serves.
    #[must_use]
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }
}

impl fmt::Debug for DatabaseProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseProvider")
            .field("url", self.database.url())
            .field("models", &self.registry.len())
            .finish()
    }
}
