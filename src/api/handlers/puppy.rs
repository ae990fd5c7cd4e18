//! Puppy handlers: create and list.
//!
//! Both run on the request's transaction connection, so a create that
//! fails after writing leaves nothing behind.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{CreatePuppyParams, PuppyDto};
use crate::app_state::AppState;
use crate::error::{ErrorResponse, OrmError};
use crate::hook::RequestTransaction;
use crate::model::Record;
use crate::puppies::PUPPY_MODEL;

/// `POST /puppy/`: Create a puppy.
///
/// # Errors
///
/// Returns [`OrmError::Validation`] for a malformed body and
/// [`OrmError::Handler`] when `raise_exception` is set.
#[utoipa::path(
    post,
    path = "/puppy/",
    tag = "Puppies",
    summary = "Create a puppy",
    description = "Stores a puppy inside the request transaction. With `raise_exception=true` the row is written and the request then fails, so the transaction is rolled back.",
    params(CreatePuppyParams),
    request_body = PuppyDto,
    responses(
        (status = 201, description = "Puppy created", body = PuppyDto),
        (status = 400, description = "Invalid puppy", body = ErrorResponse),
        (status = 500, description = "Requested failure", body = ErrorResponse),
    )
)]
pub async fn create_puppy(
    State(state): State<AppState>,
    tx: RequestTransaction,
    Query(params): Query<CreatePuppyParams>,
    Json(puppy): Json<Record>,
) -> Result<impl IntoResponse, OrmError> {
    let model = state.registry.require(PUPPY_MODEL)?;
    let created = {
        let mut conn = tx.connection().await?;
        model.insert(&mut conn, puppy).await?
    };

    if params.raise_exception {
        return Err(OrmError::Handler(format!(
            "raise_exception requested after storing puppy {}",
            created.get("id").cloned().unwrap_or_default()
        )));
    }

    Ok((StatusCode::CREATED, Json(created)))
}

/// `GET /puppy/`: List puppies.
///
/// # Errors
///
/// Returns [`OrmError::Query`] on database failures.
#[utoipa::path(
    get,
    path = "/puppy/",
    tag = "Puppies",
    summary = "List puppies",
    description = "Returns every stored puppy ordered by id.",
    responses(
        (status = 200, description = "All puppies", body = Vec<PuppyDto>),
    )
)]
pub async fn list_puppies(
    State(state): State<AppState>,
    tx: RequestTransaction,
) -> Result<impl IntoResponse, OrmError> {
    let model = state.registry.require(PUPPY_MODEL)?;
    let mut conn = tx.connection().await?;
    let puppies = model.select_all(&mut conn).await?;
    Ok(Json(puppies))
}

/// Puppy routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/puppy/", get(list_puppies).post(create_puppy))
}
