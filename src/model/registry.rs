//! Model registry and the late-bound database slot shared by its models.
//!
//! [`ModelRegistry`] is an explicitly passed set of model definitions keyed
//! by qualified name. Cloning the registry shares it. Applications create
//! one at startup; tests that need isolation create a fresh one.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::sync::{Arc, PoisonError, RwLock};

use super::ModelDefinition;
use crate::db::Database;
use crate::error::OrmError;

/// Late-bound database handle shared by every model of a registry.
///
/// Empty until a [`crate::db::DatabaseProvider`] binds a handle. Binding
/// again replaces the handle for all models at once.
#[derive(Debug, Clone, Default)]
pub struct DatabaseProxy {
    slot: Arc<RwLock<Option<Database>>>,
}

impl DatabaseProxy {
    /// Binds `database`, returning the previously bound handle.
    pub fn bind(&self, database: Database) -> Option<Database> {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.replace(database)
    }

    /// The bound handle, if any.
    #[must_use]
    pub fn get(&self) -> Option<Database> {
        self.slot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// The bound handle.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Configuration`] when no provider has bound a
    /// database yet.
    pub fn database(&self) -> Result<Database, OrmError> {
        self.get().ok_or_else(|| {
            OrmError::Configuration("no database bound; construct a DatabaseProvider".to_string())
        })
    }
}

/// A declared model: its definition plus the registry's database slot.
#[derive(Debug, Clone)]
pub struct Model {
    definition: Arc<ModelDefinition>,
    proxy: DatabaseProxy,
}

impl Model {
    /// The model's schema.
    #[must_use]
    pub fn definition(&self) -> &Arc<ModelDefinition> {
        &self.definition
    }

    /// Model name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.definition.name()
    }

    /// `module.Name`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        self.definition.qualified_name()
    }

    /// Table name.
    #[must_use]
    pub fn table(&self) -> &str {
        self.definition.table()
    }

    /// Database currently bound for this model.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Configuration`] when nothing is bound.
    pub fn database(&self) -> Result<Database, OrmError> {
        self.proxy.database()
    }
}

/// Set of concrete model definitions declared on this registry.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: Arc<RwLock<BTreeMap<String, Arc<ModelDefinition>>>>,
    proxy: DatabaseProxy,
}

impl ModelRegistry {
    /// Creates an empty registry with nothing bound.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Defines a model and, unless it is abstract, registers it.
    ///
    /// Registration has set semantics: declaring a qualified name that is
    /// already registered returns the existing definition.
    pub fn declare(&self, definition: ModelDefinition) -> Model {
        let qualified = definition.qualified_name();
        let definition = Arc::new(definition);

        if definition.is_abstract() {
            tracing::debug!(model = %qualified, "abstract model declared, not registered");
            return self.model(definition);
        }

        let mut models = self.models.write().unwrap_or_else(PoisonError::into_inner);
        let registered = match models.entry(qualified) {
            Entry::Occupied(entry) => {
                tracing::debug!(model = %entry.key(), "model already registered");
                Arc::clone(entry.get())
            }
            Entry::Vacant(entry) => {
                tracing::debug!(model = %entry.key(), table = definition.table(), "model registered");
                Arc::clone(entry.insert(definition))
            }
        };
        drop(models);

        self.model(registered)
    }

    fn model(&self, definition: Arc<ModelDefinition>) -> Model {
        Model {
            definition,
            proxy: self.proxy.clone(),
        }
    }

    /// All registered definitions, ordered by qualified name.
    #[must_use]
    pub fn list(&self) -> Vec<Arc<ModelDefinition>> {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    /// Registered definitions owned by `module` or one of its submodules.
    #[must_use]
    pub fn list_module(&self, module: &str) -> Vec<Arc<ModelDefinition>> {
        let nested = format!("{module}.");
        self.list()
            .into_iter()
            .filter(|def| def.module() == module || def.module().starts_with(&nested))
            .collect()
    }

    /// Whether `qualified` (`module.Name`) is registered.
    #[must_use]
    pub fn contains(&self, qualified: &str) -> bool {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(qualified)
    }

    /// Looks up a registered model.
    #[must_use]
    pub fn get(&self, qualified: &str) -> Option<Model> {
        let definition = self
            .models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(qualified)
            .cloned()?;
        Some(self.model(definition))
    }

    /// Looks up a registered model.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::NotFound`] if `qualified` is not registered.
    pub fn require(&self, qualified: &str) -> Result<Model, OrmError> {
        self.get(qualified)
            .ok_or_else(|| OrmError::NotFound(format!("model {qualified}")))
    }

    /// Number of registered models.
    #[must_use]
    pub fn len(&self) -> usize {
        self.models
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The database slot shared by this registry's models.
    #[must_use]
    pub fn proxy(&self) -> &DatabaseProxy {
        &self.proxy
    }

    /// Swaps in an empty set and returns the previous one.
    #[cfg(test)]
    pub(crate) fn reset_for_test(&self) -> BTreeMap<String, Arc<ModelDefinition>> {
        let mut models = self.models.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut *models)
    }

    /// Puts back a set taken by [`ModelRegistry::reset_for_test`].
    #[cfg(test)]
    pub(crate) fn restore(&self, previous: BTreeMap<String, Arc<ModelDefinition>>) {
        let mut models = self.models.write().unwrap_or_else(PoisonError::into_inner);
        *models = previous;
    }
}
