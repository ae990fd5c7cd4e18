//! Error types with HTTP status code mapping.
//!
//! [`OrmError`] is the central error type of the crate. Each variant maps to
//! a numeric error code and an HTTP status. When rendered as a response the
//! error also leaves a [`HandlerFailure`] marker in the response extensions
//! so the transaction hook knows the request must not be committed.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 1001,
///     "message": "validation failed: missing field `name`"
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Optional additional details.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Marker left in response extensions when a handler failed.
///
/// The transaction hook treats its presence as a captured exception and
/// rolls the request transaction back instead of committing it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerFailure {
    /// Numeric code of the failure (see [`OrmError::error_code`]).
    pub code: u32,
    /// Failure description.
    pub message: String,
}

impl HandlerFailure {
    /// Derives the captured failure of a finished response.
    ///
    /// An explicit marker wins; otherwise any client or server error status
    /// counts as a failure.
    #[must_use]
    pub fn from_response(response: &Response) -> Option<Self> {
        if let Some(failure) = response.extensions().get::<Self>() {
            return Some(failure.clone());
        }
        let status = response.status();
        if status.is_client_error() || status.is_server_error() {
            return Some(Self {
                code: u32::from(status.as_u16()),
                message: status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
            });
        }
        None
    }
}

/// Crate-wide error enum with HTTP status code mapping.
///
/// # Error Code Ranges
///
/// | Range     | Category    | HTTP Status               |
/// |-----------|-------------|---------------------------|
/// | 1000–1999 | Validation  | 400 Bad Request           |
/// | 2000–2999 | Not Found   | 404 Not Found             |
/// | 3000–3999 | Server      | 500 Internal Server Error |
#[derive(Debug, thiserror::Error)]
pub enum OrmError {
    /// Bad connection URL, missing component registration or missing
    /// environment variable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Application locator is malformed or points at nothing usable.
    #[error("resolution error: {0}")]
    Resolution(String),

    /// Failure to acquire a connection or to begin, commit or roll back a
    /// transaction.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// Migration discovery, execution or bookkeeping failed.
    #[error("migration error: {0}")]
    Migration(String),

    /// A query against a model table failed.
    #[error("query error: {0}")]
    Query(String),

    /// Input rejected before reaching the database.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Requested record or model does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The request handler panicked.
    #[error("handler failed: {0}")]
    Handler(String),
}

impl OrmError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Validation(_) => 1001,
            Self::NotFound(_) => 2001,
            Self::Handler(_) => 3000,
            Self::Transaction(_) => 3001,
            Self::Configuration(_) => 3002,
            Self::Resolution(_) => 3003,
            Self::Migration(_) => 3004,
            Self::Query(_) => 3005,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Handler(_)
            | Self::Transaction(_)
            | Self::Configuration(_)
            | Self::Resolution(_)
            | Self::Migration(_)
            | Self::Query(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for OrmError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.error_code();
        let message = self.to_string();
        let body = ErrorResponse {
            error: ErrorBody {
                code,
                message: message.clone(),
                details: None,
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
            .extensions_mut()
            .insert(HandlerFailure { code, message });
        response
    }
}
