//! Puppy DTOs for the create and list operations.

use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// A puppy as sent by clients and returned by the API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PuppyDto {
    /// Primary key; assigned by the database, ignored when `null`.
    #[serde(default)]
    pub id: Option<i64>,
    /// Puppy name (max 255 chars).
    pub name: String,
}

/// Query parameters of `POST /puppy/`.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct CreatePuppyParams {
    /// Fail the request after the row has been written.
    #[serde(default)]
    pub raise_exception: bool,
}
