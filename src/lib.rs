//! # txgate
//!
//! Request-scoped database transactions for axum applications, with a
//! model registry and a migration manager.
//!
//! Every request handled by an [`app::App`] runs inside one transaction on
//! one pooled connection: it commits when the handler succeeds and rolls
//! back when the handler fails or panics. The `txgate` binary manages the
//! schema of an application found through its locator.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP)                    txgate CLI
//!     │                                 │
//!     ├── Routes (api/)                 ├── AppLocator (app/)
//!     ├── TransactionHook (hook/)       ├── Manager (manager/)
//!     │                                 │     └── MigrationRouter
//!     ├── ModelRegistry (model/)  ◄─────┤
//!     │                                 │
//!     └── DatabaseProvider (db/) ◄──────┘
//!           └── sqlx AnyPool (SQLite, PostgreSQL)
//! ```

pub mod api;
pub mod app;
pub mod app_state;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod hook;
pub mod manager;
pub mod model;
pub mod puppies;
