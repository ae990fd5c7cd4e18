//! REST API of the puppies demo: route handlers, DTOs, and router
//! composition.

pub mod dto;
pub mod handlers;
pub mod openapi;

use axum::Router;

use crate::app_state::AppState;

/// Builds the complete API router.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .merge(handlers::puppy::routes())
        .merge(handlers::system::routes())
}
