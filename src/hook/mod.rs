//! Request-scoped transaction lifecycle.
//!
//! ```text
//! on_request ──► Idle → Open ──► handler ──┬─► on_response ─► Committed | RolledBack ─► Idle
//!                                          └─► on_error ────► RolledBack ─────────────► Idle
//! ```
//!
//! State lives on each request's [`RequestTransaction`]; the
//! [`TransactionHook`] itself is stateless.

pub mod lifecycle;
pub mod middleware;
pub mod transaction;

pub use lifecycle::TransactionHook;
pub use middleware::transaction_middleware;
pub use transaction::{Outcome, RequestTransaction, Teardown, TeardownPath, TxState};
