//! The shared, pooled database handle.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use sqlx::any::AnyPoolOptions;
use sqlx::{Any, AnyPool, Executor, Transaction};

use super::{DatabaseUrl, Dialect};
use crate::error::OrmError;
use crate::model::{ModelDefinition, schema};

/// Backend options passed through to the connection pool and driver.
///
/// Unset values keep the `sqlx` defaults. `extra` pairs are appended to the
/// driver URL untouched (`sslmode`, `application_name`, `cache`, ...).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatabaseOptions {
    /// Maximum number of pooled connections.
    pub max_connections: Option<u32>,
    /// Minimum number of idle connections kept open.
    pub min_connections: Option<u32>,
    /// Maximum time to wait for a connection.
    pub acquire_timeout: Option<Duration>,
    /// Idle connections older than this are closed.
    pub idle_timeout: Option<Duration>,
    /// Driver-specific URL parameters.
    pub extra: BTreeMap<String, String>,
}

impl DatabaseOptions {
    /// Sets the maximum pool size.
    #[must_use]
    pub fn max_connections(mut self, max: u32) -> Self {
        self.max_connections = Some(max);
        self
    }

    /// Sets the minimum pool size.
    #[must_use]
    pub fn min_connections(mut self, min: u32) -> Self {
        self.min_connections = Some(min);
        self
    }

    /// Sets the connection acquire timeout.
    #[must_use]
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    /// Sets the idle connection timeout.
    #[must_use]
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Adds a driver-specific URL parameter.
    #[must_use]
    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

#[derive(Debug)]
struct DatabaseInner {
    pool: AnyPool,
    url: DatabaseUrl,
}

/// Handle to a live, pooled database.
///
/// Cloning is cheap; every clone refers to the same pool. Use
/// [`Database::ptr_eq`] to check whether two handles are the same instance.
#[derive(Debug, Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

impl Database {
    /// Opens a pool for `url` and checks that one connection can be made.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Configuration`] when the backend cannot be
    /// reached or initialized.
    pub async fn open(url: DatabaseUrl, options: &DatabaseOptions) -> Result<Self, OrmError> {
        sqlx::any::install_default_drivers();

        let mut pool_options = AnyPoolOptions::new();
        if let Some(max) = options.max_connections {
            pool_options = pool_options.max_connections(max);
        }
        if let Some(timeout) = options.acquire_timeout {
            pool_options = pool_options.acquire_timeout(timeout);
        }
        if url.is_in_memory() {
            // the database lives only as long as one of its connections
            pool_options = pool_options
                .min_connections(options.min_connections.unwrap_or(0).max(1))
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>);
        } else {
            if let Some(min) = options.min_connections {
                pool_options = pool_options.min_connections(min);
            }
            if let Some(timeout) = options.idle_timeout {
                pool_options = pool_options.idle_timeout(timeout);
            }
        }

        let pool = pool_options
            .connect(&url.connect_string(&options.extra))
            .await
            .map_err(|e| {
                OrmError::Configuration(format!("cannot initialize database {url}: {e}"))
            })?;

        Ok(Self {
            inner: Arc::new(DatabaseInner { pool, url }),
        })
    }

    /// The underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &AnyPool {
        &self.inner.pool
    }

    /// The URL this handle was opened with.
    #[must_use]
    pub fn url(&self) -> &DatabaseUrl {
        &self.inner.url
    }

    /// SQL dialect of the backend.
    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.inner.url.dialect()
    }

    /// Returns `true` if both handles share the same pool instance.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Acquires a connection and begins a transaction on it.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Transaction`] when no connection can be acquired
    /// or `BEGIN` fails.
    pub async fn begin(&self) -> Result<Transaction<'static, Any>, OrmError> {
        self.inner
            .pool
            .begin()
            .await
            .map_err(|e| OrmError::Transaction(format!("cannot begin transaction: {e}")))
    }

    /// Creates the tables of `models` (if missing) in one transaction.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Query`] if any statement fails; nothing is
    /// created in that case.
    pub async fn create_tables(&self, models: &[Arc<ModelDefinition>]) -> Result<(), OrmError> {
        let statements: Vec<String> = models
            .iter()
            .map(|model| schema::create_table_sql(model, self.dialect()))
            .collect();
        self.execute_in_transaction(&statements).await?;
        tracing::info!(count = models.len(), "tables created");
        Ok(())
    }

    /// Drops the tables of `models` (if present), in reverse order, in one
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Query`] if any statement fails.
    pub async fn drop_tables(&self, models: &[Arc<ModelDefinition>]) -> Result<(), OrmError> {
        let statements: Vec<String> = models
            .iter()
            .rev()
            .map(|model| schema::drop_table_sql(model))
            .collect();
        self.execute_in_transaction(&statements).await?;
        tracing::info!(count = models.len(), "tables dropped");
        Ok(())
    }

    async fn execute_in_transaction(&self, statements: &[String]) -> Result<(), OrmError> {
        let mut tx = self.begin().await?;
        for statement in statements {
            (&mut *tx)
                .execute(statement.as_str())
                .await
                .map_err(|e| OrmError::Query(format!("{statement}: {e}")))?;
        }
        tx.commit()
            .await
            .map_err(|e| OrmError::Transaction(format!("cannot commit: {e}")))
    }
}
