use thiserror::Error;

use crate::domain::expense::{ExpenseId, ExpenseStatus};
use crate::domain::user::UserId;

/// Failures at the storage boundary. `Conflict` marks a lost
/// compare-and-update race and is retried by the engine; everything else is
/// an opaque backend fault.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("concurrent update conflict")]
    Conflict,
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Engine-surface failures. Every variant carries a distinct, stable message
/// callers can branch on; validation variants are raised before any mutation
/// is attempted.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("submitter `{0}` was not found")]
    SubmitterNotFound(UserId),
    #[error("expense request `{0}` was not found")]
    RequestNotFound(ExpenseId),
    #[error("expense request `{id}` is not pending (status {status:?})")]
    RequestNotPending { id: ExpenseId, status: ExpenseStatus },
    #[error("user `{approver_id}` is not an approver on expense request `{id}`")]
    NotAnApprover { id: ExpenseId, approver_id: UserId },
    #[error("approver `{approver_id}` has already decided on expense request `{id}`")]
    AlreadyDecided { id: ExpenseId, approver_id: UserId },
    #[error("expense request `{0}` is temporarily unavailable, retry shortly")]
    TemporarilyUnavailable(ExpenseId),
    #[error("storage failure: {0}")]
    Store(String),
}

impl From<StoreError> for EngineError {
    fn from(error: StoreError) -> Self {
        Self::Store(error.to_string())
    }
}
