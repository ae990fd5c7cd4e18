//! The transaction lifecycle hook.
//!
//! [`TransactionHook`] carries no state of its own: everything about a
//! request's transaction lives on the [`RequestTransaction`] passed to each
//! callback, so one hook can serve any number of concurrent requests.

use axum::response::Response;

use super::transaction::{Outcome, RequestTransaction, TeardownPath};
use crate::db::Database;
use crate::error::{HandlerFailure, OrmError};

/// Request/response/error callbacks that wrap every request in a
/// transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransactionHook;

impl TransactionHook {
    /// Creates the hook.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Request start: opens the request's connection and transaction.
    ///
    /// Must complete before the handler runs.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Transaction`] if the transaction cannot be
    /// started; the request must then fail without reaching the handler.
    pub async fn on_request(&self, database: &Database) -> Result<RequestTransaction, OrmError> {
        let tx = RequestTransaction::new();
        tx.begin(database).await?;
        Ok(tx)
    }

    /// Request end: commits when `failure` is `None`, rolls back otherwise,
    /// then releases the connection. The response is returned unchanged.
    ///
    /// A context the handler already closed is left alone.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Transaction`] if the commit or rollback fails.
    pub async fn on_response(
        &self,
        response: Response,
        tx: &RequestTransaction,
        failure: Option<&HandlerFailure>,
    ) -> Result<Response, OrmError> {
        let outcome = match failure {
            None => Outcome::Committed,
            Some(failure) => {
                tracing::debug!(tx = %tx.id(), code = failure.code, "handler failed");
                Outcome::RolledBack
            }
        };
        tx.finish(outcome, TeardownPath::Response).await?;
        Ok(response)
    }

    /// Request error: rolls back and releases the connection.
    ///
    /// A context the handler already closed is left alone.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Transaction`] if the rollback fails.
    pub async fn on_error(&self, tx: &RequestTransaction) -> Result<(), OrmError> {
        tx.finish(Outcome::RolledBack, TeardownPath::Error).await?;
        Ok(())
    }
}
