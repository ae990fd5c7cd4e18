//! Shared fixtures for the integration tests.

#![allow(dead_code, clippy::panic)]

use std::net::SocketAddr;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use serde_json::Value;
use tower::ServiceExt;

use txgate::app::App;
use txgate::config::OrmConfig;
use txgate::db::DatabaseProvider;
use txgate::puppies::{self, PUPPY_MODEL};

/// Configuration pointing at a fresh in-memory database.
pub fn memory_config() -> OrmConfig {
    OrmConfig {
        listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
        database_url: "sqlite://".to_string(),
        database_max_connections: 32,
        database_min_connections: 0,
        database_connect_timeout_secs: 10,
        migrations_dir: "migrations".into(),
    }
}

/// The puppies demo with its tables created.
pub async fn puppies_app() -> App {
    let app = match puppies::app(&memory_config()).await {
        Ok(app) => app,
        Err(e) => panic!("demo app should build: {e}"),
    };
    let provider = provider(&app);
    let created = provider
        .database()
        .create_tables(&provider.registry().list())
        .await;
    assert!(created.is_ok(), "tables should be created: {created:?}");
    app
}

/// The provider registered on `app`.
pub fn provider(app: &App) -> std::sync::Arc<DatabaseProvider> {
    let Some(provider) = app.provider() else {
        panic!("app should register a DatabaseProvider");
    };
    provider
}

/// Rows in the puppy table, read outside any request.
pub async fn stored_puppies(app: &App) -> i64 {
    let Ok(model) = provider(app).registry().require(PUPPY_MODEL) else {
        panic!("puppy model should be registered");
    };
    match model.count_all().await {
        Ok(count) => count,
        Err(e) => panic!("count should succeed: {e}"),
    }
}

/// Sends one request and returns the status and JSON body (`Null` when the
/// body is empty or not JSON).
pub async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let Ok(request) = builder.body(body) else {
        panic!("request should build");
    };
    let Ok(response) = router.clone().oneshot(request).await else {
        panic!("router is infallible");
    };
    let status = response.status();
    let Ok(bytes) = axum::body::to_bytes(response.into_body(), usize::MAX).await else {
        panic!("body should be readable");
    };
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}
