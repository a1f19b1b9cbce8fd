use serde_json::Value;
use sqlx::{Executor, Row};

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

const SEED_USER_IDS: &[&str] = &[
    "user-admin-001",
    "user-mgr-001",
    "user-fin-001",
    "user-dir-001",
    "user-emp-001",
    "user-emp-002",
];

const SEED_EXPENSE_IDS: &[&str] =
    &["expense-seed-001", "expense-seed-002", "expense-seed-003", "expense-seed-004"];

const SEED_PENDING_EXPENSE_IDS: &[&str] = &["expense-seed-001", "expense-seed-003"];

/// Deterministic demo fixtures: an admin, three approvers, two employees
/// with contrasting workflows (parallel majority vs. sequenced unanimous
/// with a special approver), and requests in every lifecycle stage.
pub struct SeedDataset;

#[derive(Debug)]
pub struct SeedResult {
    pub users_seeded: usize,
    pub expenses_seeded: usize,
}

#[derive(Debug)]
pub struct VerificationResult {
    pub passed: bool,
    pub checks: Vec<SeedCheck>,
}

#[derive(Debug)]
pub struct SeedCheck {
    pub name: String,
    pub passed: bool,
    pub detail: String,
}

impl SeedDataset {
    pub const SQL: &str = include_str!("../../../config/fixtures/seed_data.sql");

    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            users_seeded: SEED_USER_IDS.len(),
            expenses_seeded: SEED_EXPENSE_IDS.len(),
        })
    }

    /// Verify that seed data exists and matches the contract.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let user_count: i64 = sqlx::query(&count_query("app_user", SEED_USER_IDS))
            .fetch_one(pool)
            .await?
            .get("n");
        checks.push(SeedCheck {
            name: "seed_users_present".to_string(),
            passed: user_count == SEED_USER_IDS.len() as i64,
            detail: format!("expected {} users, found {user_count}", SEED_USER_IDS.len()),
        });

        let expense_count: i64 = sqlx::query(&count_query("expense_request", SEED_EXPENSE_IDS))
            .fetch_one(pool)
            .await?
            .get("n");
        checks.push(SeedCheck {
            name: "seed_expenses_present".to_string(),
            passed: expense_count == SEED_EXPENSE_IDS.len() as i64,
            detail: format!("expected {} expenses, found {expense_count}", SEED_EXPENSE_IDS.len()),
        });

        let pending_count: i64 = sqlx::query(&format!(
            "SELECT COUNT(*) AS n FROM expense_request WHERE status = 'pending' AND id IN ({})",
            sql_id_list(SEED_PENDING_EXPENSE_IDS)
        ))
        .fetch_one(pool)
        .await?
        .get("n");
        checks.push(SeedCheck {
            name: "seed_pending_expenses".to_string(),
            passed: pending_count == SEED_PENDING_EXPENSE_IDS.len() as i64,
            detail: format!(
                "expected {} pending expenses, found {pending_count}",
                SEED_PENDING_EXPENSE_IDS.len()
            ),
        });

        let slots_json: Option<String> =
            sqlx::query("SELECT slots FROM expense_request WHERE id = 'expense-seed-003'")
                .fetch_optional(pool)
                .await?
                .map(|row| row.get("slots"));
        let slots_valid = slots_json
            .as_deref()
            .and_then(|json| serde_json::from_str::<Value>(json).ok())
            .and_then(|value| value.as_array().map(|slots| slots.len() == 3))
            .unwrap_or(false);
        checks.push(SeedCheck {
            name: "sequenced_expense_slot_shape".to_string(),
            passed: slots_valid,
            detail: "expense-seed-003 carries three approver slots".to_string(),
        });

        let passed = checks.iter().all(|check| check.passed);
        Ok(VerificationResult { passed, checks })
    }
}

fn sql_id_list(ids: &[&str]) -> String {
    ids.iter().map(|id| format!("'{id}'")).collect::<Vec<_>>().join(", ")
}

fn count_query(table: &str, ids: &[&str]) -> String {
    format!("SELECT COUNT(*) AS n FROM {table} WHERE id IN ({})", sql_id_list(ids))
}
