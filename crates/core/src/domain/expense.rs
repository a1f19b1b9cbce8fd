use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExpenseId(pub String);

impl std::fmt::Display for ExpenseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenseStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
}

impl ExpenseStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Rejected)
    }
}

/// One approver's decision on one request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Pending,
    Approved,
    Rejected,
}

/// What an approver may actually submit. Kept separate from [`Decision`] so
/// a `Pending` write can never be expressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Approved,
    Rejected,
}

impl From<Verdict> for Decision {
    fn from(verdict: Verdict) -> Self {
        match verdict {
            Verdict::Approved => Decision::Approved,
            Verdict::Rejected => Decision::Rejected,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExpenseCategory {
    Food,
    Travel,
    Accommodation,
    Other,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApproverSlot {
    pub approver_id: UserId,
    pub decision: Decision,
}

impl ApproverSlot {
    pub fn pending(approver_id: UserId) -> Self {
        Self { approver_id, decision: Decision::Pending }
    }
}

/// An expense submission. `slots`, `is_sequenced`, `min_approval_percentage`
/// and `special_approver_id` are copied from the submitter's workflow when
/// the request enters `Pending` and are never re-read from the live workflow
/// afterwards. `revision` backs the store's compare-and-update.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRequest {
    pub id: ExpenseId,
    pub submitter_id: UserId,
    pub description: String,
    pub expense_date: NaiveDate,
    pub category: ExpenseCategory,
    pub paid_by: String,
    pub amount: Decimal,
    pub currency: String,
    pub remarks: String,
    pub receipt_file_name: Option<String>,
    pub status: ExpenseStatus,
    pub slots: Vec<ApproverSlot>,
    pub is_sequenced: bool,
    pub min_approval_percentage: u8,
    pub special_approver_id: Option<UserId>,
    pub revision: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ExpenseRequest {
    pub fn slot_index(&self, approver_id: &UserId) -> Option<usize> {
        self.slots.iter().position(|slot| &slot.approver_id == approver_id)
    }

    pub fn slot_for(&self, approver_id: &UserId) -> Option<&ApproverSlot> {
        self.slot_index(approver_id).map(|index| &self.slots[index])
    }
}
