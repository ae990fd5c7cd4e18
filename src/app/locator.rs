//! Resolving applications from `<package>.<module>:<variable>` locators.
//!
//! Applications are not discovered at runtime: the binary registers each
//! one it knows about in an [`AppLocator`] catalog, keyed by module path and
//! attribute name, and the CLI resolves the locator string against it.

use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;

use super::App;
use crate::error::OrmError;

type AppFactory = Arc<dyn Fn() -> BoxFuture<'static, Result<App, OrmError>> + Send + Sync>;

const LOCATOR_FORMAT: &str = "<package>.<module>:<variable>";

/// Catalog of application factories addressable by locator.
#[derive(Default, Clone)]
pub struct AppLocator {
    modules: BTreeMap<String, BTreeMap<String, AppFactory>>,
}

impl AppLocator {
    /// Creates an empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` as `module:attribute`.
    #[must_use]
    pub fn register<F, Fut>(
        mut self,
        module: impl Into<String>,
        attribute: impl Into<String>,
        factory: F,
    ) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<App, OrmError>> + Send + 'static,
    {
        let factory: AppFactory = Arc::new(move || factory().boxed());
        self.modules
            .entry(module.into())
            .or_default()
            .insert(attribute.into(), factory);
        self
    }

    /// Every registered locator, sorted.
    #[must_use]
    pub fn locators(&self) -> Vec<String> {
        self.modules
            .iter()
            .flat_map(|(module, attributes)| {
                attributes.keys().map(move |attribute| format!("{module}:{attribute}"))
            })
            .collect()
    }

    /// Splits a locator into module path and attribute.
    ///
    /// The split is on the last `:`.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Resolution`] when either part is missing.
    pub fn parse(locator: &str) -> Result<(&str, &str), OrmError> {
        match locator.trim().rsplit_once(':') {
            Some((module, attribute)) if !module.is_empty() && !attribute.is_empty() => {
                Ok((module, attribute))
            }
            _ => Err(OrmError::Resolution(format!(
                "wrong app locator {locator:?}, expected {LOCATOR_FORMAT}"
            ))),
        }
    }

    /// Builds the application registered under `locator`.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Resolution`] for a malformed locator, an unknown
    /// module or an unknown attribute. Errors from the factory itself are
    /// passed through.
    pub async fn resolve(&self, locator: &str) -> Result<App, OrmError> {
        let (module, attribute) = Self::parse(locator)?;
        let factory = self
            .modules
            .get(module)
            .ok_or_else(|| OrmError::Resolution(format!("app module not found: {module}")))?
            .get(attribute)
            .ok_or_else(|| {
                OrmError::Resolution(format!("app not found: {module} has no {attribute}"))
            })?;

        tracing::debug!(%module, %attribute, "resolving app");
        factory().await
    }
}

impl fmt::Debug for AppLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppLocator")
            .field("locators", &self.locators())
            .finish()
    }
}
