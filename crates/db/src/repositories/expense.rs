use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::Row;

use spendgate_core::domain::expense::{
    ApproverSlot, ExpenseCategory, ExpenseId, ExpenseRequest, ExpenseStatus,
};
use spendgate_core::domain::user::UserId;
use spendgate_core::engine::RequestStore;
use spendgate_core::errors::StoreError;

use super::RepositoryError;
use crate::DbPool;

pub struct SqlExpenseRepository {
    pool: DbPool,
}

impl SqlExpenseRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// How many requests are sitting in approval across all submitters.
    pub async fn count_pending(&self) -> Result<i64, RepositoryError> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM expense_request WHERE status = 'pending'")
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    /// A submitter's own requests, newest first.
    pub async fn list_for_submitter(
        &self,
        submitter_id: &UserId,
    ) -> Result<Vec<ExpenseRequest>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expense_request
             WHERE submitter_id = ? ORDER BY created_at DESC"
        ))
        .bind(&submitter_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_expense).collect()
    }
}

fn parse_status(s: &str) -> Result<ExpenseStatus, RepositoryError> {
    match s {
        "draft" => Ok(ExpenseStatus::Draft),
        "pending" => Ok(ExpenseStatus::Pending),
        "approved" => Ok(ExpenseStatus::Approved),
        "rejected" => Ok(ExpenseStatus::Rejected),
        other => Err(RepositoryError::Decode(format!("unknown status `{other}`"))),
    }
}

pub fn status_as_str(status: ExpenseStatus) -> &'static str {
    match status {
        ExpenseStatus::Draft => "draft",
        ExpenseStatus::Pending => "pending",
        ExpenseStatus::Approved => "approved",
        ExpenseStatus::Rejected => "rejected",
    }
}

fn parse_category(s: &str) -> Result<ExpenseCategory, RepositoryError> {
    match s {
        "food" => Ok(ExpenseCategory::Food),
        "travel" => Ok(ExpenseCategory::Travel),
        "accommodation" => Ok(ExpenseCategory::Accommodation),
        "other" => Ok(ExpenseCategory::Other),
        other => Err(RepositoryError::Decode(format!("unknown category `{other}`"))),
    }
}

pub fn category_as_str(category: ExpenseCategory) -> &'static str {
    match category {
        ExpenseCategory::Food => "food",
        ExpenseCategory::Travel => "travel",
        ExpenseCategory::Accommodation => "accommodation",
        ExpenseCategory::Other => "other",
    }
}

const EXPENSE_COLUMNS: &str = "id, submitter_id, description, expense_date, category, paid_by, \
                               amount, currency, remarks, receipt_file_name, status, slots, \
                               is_sequenced, min_approval_pct, special_approver_id, revision, \
                               created_at, updated_at";

fn decode<T: std::fmt::Display>(e: T) -> RepositoryError {
    RepositoryError::Decode(e.to_string())
}

fn row_to_expense(row: &sqlx::sqlite::SqliteRow) -> Result<ExpenseRequest, RepositoryError> {
    let id: String = row.try_get("id").map_err(decode)?;
    let submitter_id: String = row.try_get("submitter_id").map_err(decode)?;
    let description: String = row.try_get("description").map_err(decode)?;
    let expense_date_str: String = row.try_get("expense_date").map_err(decode)?;
    let category_str: String = row.try_get("category").map_err(decode)?;
    let paid_by: String = row.try_get("paid_by").map_err(decode)?;
    let amount_str: String = row.try_get("amount").map_err(decode)?;
    let currency: String = row.try_get("currency").map_err(decode)?;
    let remarks: String = row.try_get("remarks").map_err(decode)?;
    let receipt_file_name: Option<String> = row.try_get("receipt_file_name").map_err(decode)?;
    let status_str: String = row.try_get("status").map_err(decode)?;
    let slots_json: String = row.try_get("slots").map_err(decode)?;
    let is_sequenced: bool = row.try_get("is_sequenced").map_err(decode)?;
    let min_approval_pct: i64 = row.try_get("min_approval_pct").map_err(decode)?;
    let special_approver_id: Option<String> =
        row.try_get("special_approver_id").map_err(decode)?;
    let revision: i64 = row.try_get("revision").map_err(decode)?;
    let created_at_str: String = row.try_get("created_at").map_err(decode)?;
    let updated_at_str: String = row.try_get("updated_at").map_err(decode)?;

    let expense_date = NaiveDate::parse_from_str(&expense_date_str, "%Y-%m-%d")
        .map_err(|e| RepositoryError::Decode(format!("expense_date: {e}")))?;
    let amount = Decimal::from_str(&amount_str)
        .map_err(|e| RepositoryError::Decode(format!("amount: {e}")))?;
    let slots: Vec<ApproverSlot> = serde_json::from_str(&slots_json)
        .map_err(|e| RepositoryError::Decode(format!("slots: {e}")))?;
    let min_approval_percentage = u8::try_from(min_approval_pct)
        .map_err(|_| RepositoryError::Decode(format!("percentage {min_approval_pct}")))?;
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("created_at: {e}")))?;
    let updated_at = DateTime::parse_from_rfc3339(&updated_at_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("updated_at: {e}")))?;

    Ok(ExpenseRequest {
        id: ExpenseId(id),
        submitter_id: UserId(submitter_id),
        description,
        expense_date,
        category: parse_category(&category_str)?,
        paid_by,
        amount,
        currency,
        remarks,
        receipt_file_name,
        status: parse_status(&status_str)?,
        slots,
        is_sequenced,
        min_approval_percentage,
        special_approver_id: special_approver_id.map(UserId),
        revision,
        created_at,
        updated_at,
    })
}

fn backend<T: std::fmt::Display>(e: T) -> StoreError {
    StoreError::Backend(e.to_string())
}

#[async_trait::async_trait]
impl RequestStore for SqlExpenseRepository {
    async fn insert(&self, request: ExpenseRequest) -> Result<(), StoreError> {
        let slots_json = serde_json::to_string(&request.slots).map_err(backend)?;

        sqlx::query(
            "INSERT INTO expense_request
                 (id, submitter_id, description, expense_date, category, paid_by, amount,
                  currency, remarks, receipt_file_name, status, slots, is_sequenced,
                  min_approval_pct, special_approver_id, revision, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.id.0)
        .bind(&request.submitter_id.0)
        .bind(&request.description)
        .bind(request.expense_date.format("%Y-%m-%d").to_string())
        .bind(category_as_str(request.category))
        .bind(&request.paid_by)
        .bind(request.amount.to_string())
        .bind(&request.currency)
        .bind(&request.remarks)
        .bind(&request.receipt_file_name)
        .bind(status_as_str(request.status))
        .bind(&slots_json)
        .bind(request.is_sequenced)
        .bind(i64::from(request.min_approval_percentage))
        .bind(request.special_approver_id.as_ref().map(|id| id.0.clone()))
        .bind(request.revision)
        .bind(request.created_at.to_rfc3339())
        .bind(request.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        Ok(())
    }

    async fn fetch(&self, id: &ExpenseId) -> Result<Option<ExpenseRequest>, StoreError> {
        let row = sqlx::query(&format!("SELECT {EXPENSE_COLUMNS} FROM expense_request WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(backend)?;

        match row {
            Some(ref r) => Ok(Some(row_to_expense(r).map_err(backend)?)),
            None => Ok(None),
        }
    }

    /// Single-statement CAS on the revision column. Zero affected rows means
    /// another writer committed first (or the row is gone); the caller
    /// re-reads and retries either way.
    async fn compare_and_update(
        &self,
        expected_revision: i64,
        next: ExpenseRequest,
    ) -> Result<(), StoreError> {
        let slots_json = serde_json::to_string(&next.slots).map_err(backend)?;

        let result = sqlx::query(
            "UPDATE expense_request
             SET status = ?, slots = ?, revision = ?, updated_at = ?
             WHERE id = ? AND revision = ?",
        )
        .bind(status_as_str(next.status))
        .bind(&slots_json)
        .bind(next.revision)
        .bind(next.updated_at.to_rfc3339())
        .bind(&next.id.0)
        .bind(expected_revision)
        .execute(&self.pool)
        .await
        .map_err(backend)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Conflict);
        }
        Ok(())
    }

    async fn query_pending_with_approver(
        &self,
        approver_id: &UserId,
    ) -> Result<Vec<ExpenseRequest>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {EXPENSE_COLUMNS} FROM expense_request
             WHERE status = 'pending'
               AND EXISTS (
                   SELECT 1 FROM json_each(expense_request.slots)
                   WHERE json_extract(json_each.value, '$.approver_id') = ?
                     AND json_extract(json_each.value, '$.decision') = 'Pending'
               )
             ORDER BY created_at ASC"
        ))
        .bind(&approver_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(backend)?;

        rows.iter().map(|row| row_to_expense(row).map_err(backend)).collect()
    }
}
