//! The puppies demo application, addressable as `puppies.app:app`.
//!
//! One model (`puppies.models.Puppy`, a single `name` column), the routes
//! of [`crate::api`] and the transaction hook around all of them.

use crate::api;
use crate::app::{App, AppLocator};
use crate::config::OrmConfig;
use crate::db::DatabaseProvider;
use crate::error::OrmError;
use crate::hook::TransactionHook;
use crate::model::{Field, Model, ModelDefinition, ModelRegistry};

/// Module path of the demo application.
pub const APP_MODULE: &str = "puppies.app";

/// Attribute under which the demo application is registered.
pub const APP_ATTRIBUTE: &str = "app";

/// Module path of the demo models.
pub const MODELS_MODULE: &str = "puppies.models";

/// Qualified name of the puppy model.
pub const PUPPY_MODEL: &str = "puppies.models.Puppy";

/// Declares the puppy model on `registry`.
pub fn declare_models(registry: &ModelRegistry) -> Model {
    registry.declare(
        ModelDefinition::builder("Puppy", MODELS_MODULE)
            .field(Field::char("name"))
            .build(),
    )
}

/// Builds the demo application against the configured database.
///
/// # Errors
///
/// Returns [`OrmError::Configuration`] when the database cannot be opened.
pub async fn app(config: &OrmConfig) -> Result<App, OrmError> {
    let registry = ModelRegistry::new();
    declare_models(&registry);
    let provider =
        DatabaseProvider::connect(&config.database_url, config.database_options(), &registry)
            .await?;

    App::builder(format!("{APP_MODULE}:{APP_ATTRIBUTE}"))
        .database(provider)
        .routes(api::build_router())
        .event_hook(TransactionHook::new())
        .build()
}

/// Catalog with every application this crate ships.
#[must_use]
pub fn catalog(config: OrmConfig) -> AppLocator {
    AppLocator::new().register(APP_MODULE, APP_ATTRIBUTE, move || {
        let config = config.clone();
        async move { app(&config).await }
    })
}
