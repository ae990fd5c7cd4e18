//! Request-scoped transaction context.
//!
//! A [`RequestTransaction`] owns at most one open `sqlx` transaction for a
//! single in-flight request. It moves through
//! `Idle → Open → (Committed | RolledBack) → Idle`; once back in `Idle` the
//! connection has been returned to the pool and the context is closed.
//!
//! Clones share the same context, so the middleware and the handler look
//! at the same state. If every clone is dropped while the transaction is
//! still open (request cancelled), `sqlx` rolls it back on drop.

use std::fmt;
use std::sync::Arc;

use sqlx::{Any, AnyConnection, Transaction};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};
use uuid::Uuid;

use crate::db::Database;
use crate::error::OrmError;

/// Lifecycle state of a request transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxState {
    /// No transaction; the connection (if any) is released.
    Idle,
    /// A transaction is open on an acquired connection.
    Open,
    /// Commit in progress.
    Committed,
    /// Rollback in progress.
    RolledBack,
}

/// How a transaction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Changes were persisted.
    Committed,
    /// Changes were discarded.
    RolledBack,
}

/// Which code path ended the transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownPath {
    /// The hook's response callback.
    Response,
    /// The hook's error callback.
    Error,
    /// The handler itself.
    Handler,
}

/// Record of the last teardown of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Teardown {
    /// Commit or rollback.
    pub outcome: Outcome,
    /// Path that performed it.
    pub path: TeardownPath,
}

struct Slot {
    state: TxState,
    tx: Option<Transaction<'static, Any>>,
    last: Option<Teardown>,
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Slot")
            .field("state", &self.state)
            .field("open", &self.tx.is_some())
            .field("last", &self.last)
            .finish()
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        if self.tx.is_some() {
            tracing::warn!("request transaction abandoned while open; rolling back");
        }
    }
}

/// Transaction context of one in-flight request.
#[derive(Debug, Clone)]
pub struct RequestTransaction {
    id: Uuid,
    slot: Arc<Mutex<Slot>>,
}

impl Default for RequestTransaction {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestTransaction {
    /// Creates an idle, closed context.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            slot: Arc::new(Mutex::new(Slot {
                state: TxState::Idle,
                tx: None,
                last: None,
            })),
        }
    }

    /// Identifier used in log lines.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Acquires a connection from `db` and begins a transaction on it.
    ///
    /// If the context is already open the existing connection is reused and
    /// no second transaction is started.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Transaction`] if no connection can be acquired or
    /// `BEGIN` fails. The context stays idle in that case.
    pub async fn begin(&self, db: &Database) -> Result<(), OrmError> {
        let mut slot = self.slot.lock().await;
        if slot.tx.is_some() {
            tracing::debug!(tx = %self.id, "reusing open transaction");
            return Ok(());
        }
        let tx = db.begin().await?;
        slot.tx = Some(tx);
        slot.state = TxState::Open;
        tracing::debug!(tx = %self.id, "begin");
        Ok(())
    }

    /// `true` when no transaction is open (never begun, or already ended).
    pub async fn is_closed(&self) -> bool {
        self.slot.lock().await.tx.is_none()
    }

    /// Current lifecycle state.
    pub async fn state(&self) -> TxState {
        self.slot.lock().await.state
    }

    /// How the last transaction on this context ended.
    pub async fn last_teardown(&self) -> Option<Teardown> {
        self.slot.lock().await.last
    }

    /// Locks the open connection for running queries.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Transaction`] if the context is closed.
    pub async fn connection(&self) -> Result<MappedMutexGuard<'_, AnyConnection>, OrmError> {
        let slot = self.slot.lock().await;
        MutexGuard::try_map(slot, |slot| slot.tx.as_deref_mut())
            .map_err(|_| OrmError::Transaction("request transaction is closed".to_string()))
    }

    /// Commits from inside a handler. The hook then leaves the context alone.
    ///
    /// Returns `false` if the context was already closed.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Transaction`] if the commit fails.
    pub async fn commit(&self) -> Result<bool, OrmError> {
        self.finish(Outcome::Committed, TeardownPath::Handler).await
    }

    /// Rolls back from inside a handler. The hook then leaves the context
    /// alone.
    ///
    /// Returns `false` if the context was already closed.
    ///
    /// # Errors
    ///
    /// Returns [`OrmError::Transaction`] if the rollback fails.
    pub async fn rollback(&self) -> Result<bool, OrmError> {
        self.finish(Outcome::RolledBack, TeardownPath::Handler).await
    }

    /// Ends the open transaction with `outcome` and releases the connection.
    ///
    /// Closed contexts are left untouched and `Ok(false)` is returned, so
    /// repeated teardown never commits or rolls back twice.
    pub(crate) async fn finish(
        &self,
        outcome: Outcome,
        path: TeardownPath,
    ) -> Result<bool, OrmError> {
        let mut slot = self.slot.lock().await;
        let Some(tx) = slot.tx.take() else {
            tracing::trace!(tx = %self.id, ?path, "already closed");
            return Ok(false);
        };

        let result = match outcome {
            Outcome::Committed => {
                slot.state = TxState::Committed;
                tx.commit().await
            }
            Outcome::RolledBack => {
                slot.state = TxState::RolledBack;
                tx.rollback().await
            }
        };
        slot.state = TxState::Idle;

        match result {
            Ok(()) => {
                slot.last = Some(Teardown { outcome, path });
                match outcome {
                    Outcome::Committed => tracing::debug!(tx = %self.id, ?path, "commit"),
                    Outcome::RolledBack => tracing::debug!(tx = %self.id, ?path, "rollback"),
                }
                Ok(true)
            }
            Err(e) => Err(OrmError::Transaction(format!(
                "cannot end transaction {}: {e}",
                self.id
            ))),
        }
    }
}
