//! Typed component container.

use std::any::{Any, TypeId, type_name};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::OrmError;

struct Component {
    name: &'static str,
    value: Arc<dyn Any + Send + Sync>,
}

/// Components registered at composition time, looked up by type.
///
/// Holds at most one component per type; registering a type again replaces
/// the earlier one.
#[derive(Default, Clone)]
pub struct Injector {
    components: HashMap<TypeId, Arc<Component>>,
}

impl Injector {
    /// Creates an empty injector.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `component` under its own type.
    pub fn insert<T>(&mut self, component: T)
    where
        T: Any + Send + Sync,
    {
        let previous = self.components.insert(
            TypeId::of::<T>(),
            Arc::new(Component {
                name: type_name::<T>(),
                value: Arc::new(component),
            }),
        );
        if previous.is_some() {
            tracing::debug!(component = type_name::<T>(), "component replaced");
        }
    }

    /// The registered component of type `T`, if any.
    #[must_use]
    pub fn get<T>(&self) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        let component = self.components.get(&TypeId::of::<T>())?;
        Arc::clone(&component.value).downcast::<T>().ok()
    }

    /// The registered component of type `T`.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Configuration`] if no such component exists.
    pub fn resolve<T>(&self) -> Result<Arc<T>, OrmError>
    where
        T: Any + Send + Sync,
    {
        self.get::<T>().ok_or_else(|| {
            OrmError::Configuration(format!("no component of type {}", type_name::<T>()))
        })
    }

    /// Whether a component of type `T` is registered.
    #[must_use]
    pub fn contains<T>(&self) -> bool
    where
        T: Any + Send + Sync,
    {
        self.components.contains_key(&TypeId::of::<T>())
    }

    /// Number of registered components.
    #[must_use]
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.components.values().map(|c| c.name).collect();
        names.sort_unstable();
        f.debug_struct("Injector")
            .field("components", &names)
            .finish()
    }
}
