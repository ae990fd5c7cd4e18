//! Database layer: connection URLs, the shared handle and its provider.
//!
//! [`DatabaseProvider`] is constructed once at startup. It turns a
//! connection URL into a pooled [`Database`] handle, binds that handle for
//! every declared model and hands it to the dependency-injection layer.

pub mod database;
pub mod provider;
pub mod url;

pub use database::{Database, DatabaseOptions};
pub use provider::DatabaseProvider;
pub use url::{DatabaseUrl, Dialect};
