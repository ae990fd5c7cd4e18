//! Application composition.

use std::any::Any;
use std::sync::Arc;

use axum::Router;
use axum::middleware;
use tower_http::trace::TraceLayer;

use super::Injector;
use crate::app_state::AppState;
use crate::db::DatabaseProvider;
use crate::error::OrmError;
use crate::hook::{TransactionHook, transaction_middleware};

/// A composed application: its components and its HTTP router.
#[derive(Debug, Clone)]
pub struct App {
    name: String,
    injector: Injector,
    router: Router,
    hook: Option<TransactionHook>,
}

impl App {
    /// Starts composing an application called `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> AppBuilder {
        AppBuilder {
            name: name.into(),
            injector: Injector::new(),
            routes: None,
            hook: None,
        }
    }

    /// Application name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Components registered at composition time.
    #[must_use]
    pub fn injector(&self) -> &Injector {
        &self.injector
    }

    /// Shortcut for [`Injector::get`].
    #[must_use]
    pub fn component<T>(&self) -> Option<Arc<T>>
    where
        T: Any + Send + Sync,
    {
        self.injector.get::<T>()
    }

    /// The registered database provider, if any.
    #[must_use]
    pub fn provider(&self) -> Option<Arc<DatabaseProvider>> {
        self.injector.get::<DatabaseProvider>()
    }

    /// The transaction hook, if one was installed.
    #[must_use]
    pub const fn hook(&self) -> Option<TransactionHook> {
        self.hook
    }

    /// A clone of the ready-to-serve router.
    #[must_use]
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Consumes the app, returning its router.
    #[must_use]
    pub fn into_router(self) -> Router {
        self.router
    }
}

/// Builder for [`App`].
#[derive(Debug)]
pub struct AppBuilder {
    name: String,
    injector: Injector,
    routes: Option<Router<AppState>>,
    hook: Option<TransactionHook>,
}

impl AppBuilder {
    /// Registers a component.
    #[must_use]
    pub fn component<T>(mut self, component: T) -> Self
    where
        T: Any + Send + Sync,
    {
        self.injector.insert(component);
        self
    }

    /// Registers the database provider.
    #[must_use]
    pub fn database(self, provider: DatabaseProvider) -> Self {
        self.component(provider)
    }

    /// Sets the HTTP routes. Handlers receive [`AppState`].
    #[must_use]
    pub fn routes(mut self, routes: Router<AppState>) -> Self {
        self.routes = Some(routes);
        self
    }

    /// Installs the transaction hook around every route.
    #[must_use]
    pub const fn event_hook(mut self, hook: TransactionHook) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Finishes composition.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Configuration`] when routes or the transaction
    /// hook are configured but no [`DatabaseProvider`] was registered.
    pub fn build(self) -> Result<App, OrmError> {
        let provider = self.injector.get::<DatabaseProvider>();

        let router = match (provider, self.routes) {
            (Some(provider), routes) => {
                let state = AppState::from_provider(&provider);
                let mut routes = routes.unwrap_or_default();
                if self.hook.is_some() {
                    routes = routes.layer(middleware::from_fn_with_state(
                        state.database.clone(),
                        transaction_middleware,
                    ));
                }
                routes.layer(TraceLayer::new_for_http()).with_state(state)
            }
            (None, None) if self.hook.is_none() => Router::new(),
            (None, _) => {
                return Err(OrmError::Configuration(format!(
                    "app {} has routes or an event hook but no DatabaseProvider",
                    self.name
                )));
            }
        };

        tracing::debug!(
            app = %self.name,
            components = self.injector.len(),
            hook = self.hook.is_some(),
            "app built"
        );

        Ok(App {
            name: self.name,
            injector: self.injector,
            router,
            hook: self.hook,
        })
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::routing::get;

    use super::*;
    use crate::db::DatabaseOptions;
    use crate::model::ModelRegistry;

    async fn provider() -> DatabaseProvider {
        let Ok(provider) =
            DatabaseProvider::connect("sqlite://", DatabaseOptions::default(), &ModelRegistry::new())
                .await
        else {
            panic!("memory database should connect");
        };
        provider
    }

    #[tokio::test]
    async fn build_registers_components() {
        let Ok(app) = App::builder("puppies")
            .database(provider().await)
            .component(42_u16)
            .routes(Router::new().route("/", get(|| async { "ok" })))
            .event_hook(TransactionHook::new())
            .build()
        else {
            panic!("app should build");
        };
        assert_eq!(app.name(), "puppies");
        assert!(app.provider().is_some());
        assert_eq!(app.component::<u16>().as_deref(), Some(&42));
        assert!(app.hook().is_some());
    }

    #[test]
    fn hook_without_provider_is_rejected() {
        let result = App::builder("broken")
            .event_hook(TransactionHook::new())
            .build();
        assert!(matches!(result, Err(OrmError::Configuration(_))));

        let result = App::builder("broken")
            .routes(Router::new().route("/", get(|| async { "ok" })))
            .build();
        assert!(matches!(result, Err(OrmError::Configuration(_))));
    }

    #[test]
    fn bare_app_builds_without_provider() {
        let Ok(app) = App::builder("bare").build() else {
            panic!("bare app should build");
        };
        assert!(app.provider().is_none());
        assert!(app.injector().is_empty());
    }
}
