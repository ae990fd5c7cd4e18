//! Application composition and lookup.
//!
//! An [`App`] bundles an [`Injector`] of components (at least the
//! [`crate::db::DatabaseProvider`] for anything that touches the database)
//! with an axum router wrapped in the transaction hook. The CLI finds apps
//! through an [`AppLocator`].

pub mod builder;
pub mod injector;
pub mod locator;

pub use builder::{App, AppBuilder};
pub use injector::Injector;
pub use locator::AppLocator;
