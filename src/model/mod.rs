//! Model layer: table definitions, the model registry and data access.
//!
//! Models are declared through [`ModelRegistry::declare`], which both
//! defines and registers a table. Every concrete model declared on a
//! registry shares the database handle bound to that registry by the
//! [`crate::db::DatabaseProvider`].

pub mod definition;
pub mod query;
pub mod registry;
pub mod schema;

pub use definition::{Field, FieldKind, ModelDefinition, ModelDefinitionBuilder};
pub use registry::{DatabaseProxy, Model, ModelRegistry};

/// A row as a JSON object keyed by column name.
pub type Record = serde_json::Map<String, serde_json::Value>;
