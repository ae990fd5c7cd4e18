//! axum glue for the transaction hook.
//!
//! [`transaction_middleware`] drives [`TransactionHook`] around every
//! request and publishes the [`RequestTransaction`] through request
//! extensions, where handlers pick it up as an extractor.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use futures_util::FutureExt;

use super::{RequestTransaction, TransactionHook};
use crate::db::Database;
use crate::error::{HandlerFailure, OrmError};

/// Wraps the request in a transaction.
///
/// Install with `axum::middleware::from_fn_with_state(database,
/// transaction_middleware)`. A handler that returns normally ends in
/// [`TransactionHook::on_response`]; a handler that panics ends in
/// [`TransactionHook::on_error`] and is answered with a 500.
pub async fn transaction_middleware(
    State(database): State<Database>,
    mut request: Request,
    next: Next,
) -> Response {
    let hook = TransactionHook::new();

    let tx = match hook.on_request(&database).await {
        Ok(tx) => tx,
        Err(e) => {
            tracing::error!(error = %e, "cannot open request transaction");
            return e.into_response();
        }
    };
    request.extensions_mut().insert(tx.clone());

    match AssertUnwindSafe(next.run(request)).catch_unwind().await {
        Ok(response) => {
            let failure = HandlerFailure::from_response(&response);
            match hook.on_response(response, &tx, failure.as_ref()).await {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(tx = %tx.id(), error = %e, "request teardown failed");
                    e.into_response()
                }
            }
        }
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            tracing::error!(tx = %tx.id(), %message, "handler panicked");
            if let Err(e) = hook.on_error(&tx).await {
                tracing::error!(tx = %tx.id(), error = %e, "rollback after panic failed");
            }
            OrmError::Handler(message).into_response()
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

impl<S> FromRequestParts<S> for RequestTransaction
where
    S: Send + Sync,
{
    type Rejection = OrmError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<Self>().cloned().ok_or_else(|| {
            OrmError::Configuration("transaction middleware is not installed".to_string())
        })
    }
}
