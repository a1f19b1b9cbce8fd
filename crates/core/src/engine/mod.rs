//! The stateful shell around the pure consensus rules. The engine owns no
//! state of its own; every call fetches what it needs from the directory and
//! the store, runs the evaluator, and commits through the store's
//! compare-and-update.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use tracing::{debug, info};
use uuid::Uuid;

use crate::consensus::{build_slots, evaluate, is_visible_to, settle};
use crate::domain::expense::{
    Decision, ExpenseCategory, ExpenseId, ExpenseRequest, ExpenseStatus, Verdict,
};
use crate::domain::user::UserId;
use crate::domain::workflow::WorkflowConfig;
use crate::errors::{EngineError, StoreError};

/// Attempts per decision before a lost compare-and-update race surfaces as
/// `TemporarilyUnavailable`.
const MAX_DECIDE_ATTEMPTS: u32 = 3;

#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn exists(&self, user_id: &UserId) -> Result<bool, StoreError>;
    async fn workflow_config(&self, user_id: &UserId)
        -> Result<Option<WorkflowConfig>, StoreError>;
}

/// Per-record atomic storage for expense requests.
///
/// `compare_and_update` must commit `next` only if the stored revision still
/// equals `expected_revision`, and fail with [`StoreError::Conflict`]
/// otherwise. That single guarantee is what serializes concurrent decisions
/// on one request.
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn insert(&self, request: ExpenseRequest) -> Result<(), StoreError>;
    async fn fetch(&self, id: &ExpenseId) -> Result<Option<ExpenseRequest>, StoreError>;
    async fn compare_and_update(
        &self,
        expected_revision: i64,
        next: ExpenseRequest,
    ) -> Result<(), StoreError>;
    async fn query_pending_with_approver(
        &self,
        approver_id: &UserId,
    ) -> Result<Vec<ExpenseRequest>, StoreError>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitTarget {
    Draft,
    Pending,
}

/// Submitter-provided fields of a new expense. The engine fills in identity,
/// snapshot, and bookkeeping fields.
#[derive(Clone, Debug)]
pub struct ExpenseDraft {
    pub submitter_id: UserId,
    pub description: String,
    pub expense_date: NaiveDate,
    pub category: ExpenseCategory,
    pub paid_by: String,
    pub amount: Decimal,
    pub currency: String,
    pub remarks: String,
    pub receipt_file_name: Option<String>,
}

pub struct ApprovalEngine<D, S> {
    directory: D,
    store: S,
}

impl<D, S> ApprovalEngine<D, S>
where
    D: UserDirectory,
    S: RequestStore,
{
    pub fn new(directory: D, store: S) -> Self {
        Self { directory, store }
    }

    /// Persists a new expense. Submitting as `Pending` snapshots the
    /// submitter's current workflow onto the request; the snapshot is the
    /// only copy consulted from then on. An empty snapshot is settled
    /// immediately, so a zero-approver workflow with a zero threshold
    /// auto-approves without any decision.
    pub async fn submit(
        &self,
        draft: ExpenseDraft,
        target: SubmitTarget,
    ) -> Result<ExpenseRequest, EngineError> {
        if !self.directory.exists(&draft.submitter_id).await? {
            return Err(EngineError::SubmitterNotFound(draft.submitter_id));
        }

        let (status, slots, workflow) = match target {
            SubmitTarget::Draft => (ExpenseStatus::Draft, Vec::new(), WorkflowConfig::default()),
            SubmitTarget::Pending => {
                let workflow = self
                    .directory
                    .workflow_config(&draft.submitter_id)
                    .await?
                    .ok_or_else(|| EngineError::SubmitterNotFound(draft.submitter_id.clone()))?;
                let slots = build_slots(&workflow);
                let status = if slots.is_empty() {
                    settle(&slots, workflow.min_approval_percentage)
                } else {
                    ExpenseStatus::Pending
                };
                (status, slots, workflow)
            }
        };

        let now = Utc::now();
        let request = ExpenseRequest {
            id: ExpenseId(Uuid::new_v4().to_string()),
            submitter_id: draft.submitter_id,
            description: draft.description,
            expense_date: draft.expense_date,
            category: draft.category,
            paid_by: draft.paid_by,
            amount: draft.amount,
            currency: draft.currency,
            remarks: draft.remarks,
            receipt_file_name: draft.receipt_file_name,
            status,
            slots,
            is_sequenced: workflow.is_sequenced,
            min_approval_percentage: workflow.min_approval_percentage,
            special_approver_id: workflow.special_approver_id,
            revision: 0,
            created_at: now,
            updated_at: now,
        };

        self.store.insert(request.clone()).await?;
        info!(
            event_name = "approvals.expense_submitted",
            expense_id = %request.id,
            submitter_id = %request.submitter_id,
            status = ?request.status,
            approver_count = request.slots.len(),
            "expense request submitted"
        );
        Ok(request)
    }

    /// Requests currently awaiting `approver_id`'s decision, in store order.
    pub async fn list_queue_for(
        &self,
        approver_id: &UserId,
    ) -> Result<Vec<ExpenseId>, EngineError> {
        let candidates = self.store.query_pending_with_approver(approver_id).await?;
        Ok(candidates
            .into_iter()
            .filter(|request| is_visible_to(request, approver_id))
            .map(|request| request.id)
            .collect())
    }

    /// Records one approver's verdict and settles the request status in a
    /// single atomic unit. Validation failures never mutate anything; a lost
    /// compare-and-update race is re-read and re-validated from scratch, up
    /// to [`MAX_DECIDE_ATTEMPTS`] times.
    pub async fn decide(
        &self,
        request_id: &ExpenseId,
        approver_id: &UserId,
        verdict: Verdict,
    ) -> Result<ExpenseStatus, EngineError> {
        for attempt in 0..MAX_DECIDE_ATTEMPTS {
            let current = self
                .store
                .fetch(request_id)
                .await?
                .ok_or_else(|| EngineError::RequestNotFound(request_id.clone()))?;

            if current.status != ExpenseStatus::Pending {
                return Err(EngineError::RequestNotPending {
                    id: request_id.clone(),
                    status: current.status,
                });
            }

            let Some(index) = current.slot_index(approver_id) else {
                return Err(EngineError::NotAnApprover {
                    id: request_id.clone(),
                    approver_id: approver_id.clone(),
                });
            };
            if current.slots[index].decision != Decision::Pending {
                return Err(EngineError::AlreadyDecided {
                    id: request_id.clone(),
                    approver_id: approver_id.clone(),
                });
            }

            let mut next = current.clone();
            next.slots[index].decision = Decision::from(verdict);
            next.status = evaluate(
                &next.slots,
                next.min_approval_percentage,
                next.special_approver_id.as_ref(),
                approver_id,
                verdict,
            );
            next.revision += 1;
            next.updated_at = Utc::now();
            let status = next.status;

            match self.store.compare_and_update(current.revision, next).await {
                Ok(()) => {
                    info!(
                        event_name = "approvals.decision_recorded",
                        expense_id = %request_id,
                        approver_id = %approver_id,
                        verdict = ?verdict,
                        status = ?status,
                        "approver decision recorded"
                    );
                    return Ok(status);
                }
                Err(StoreError::Conflict) => {
                    debug!(
                        event_name = "approvals.decision_conflict",
                        expense_id = %request_id,
                        approver_id = %approver_id,
                        attempt,
                        "lost update race, re-reading request"
                    );
                }
                Err(error) => return Err(error.into()),
            }
        }

        Err(EngineError::TemporarilyUnavailable(request_id.clone()))
    }
}
