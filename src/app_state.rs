//! Shared application state injected into all Axum handlers.

use axum::extract::FromRef;

use crate::db::{Database, DatabaseProvider};
use crate::model::ModelRegistry;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Database handle served by the provider.
    pub database: Database,
    /// Registry of the models bound to `database`.
    pub registry: ModelRegistry,
}

impl AppState {
    /// State backed by `provider`.
    #[must_use]
    pub fn from_provider(provider: &DatabaseProvider) -> Self {
        Self {
            database: provider.resolve(),
            registry: provider.registry().clone(),
        }
    }
}

impl FromRef<AppState> for Database {
    fn from_ref(state: &AppState) -> Self {
        state.database.clone()
    }
}

impl FromRef<AppState> for ModelRegistry {
    fn from_ref(state: &AppState) -> Self {
        state.registry.clone()
    }
}
