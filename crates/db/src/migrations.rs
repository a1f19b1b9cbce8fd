use sqlx::migrate::{MigrateError, Migrator};

use crate::DbPool;

pub static MIGRATOR: Migrator = sqlx::migrate!("../../migrations");

pub async fn run_pending(pool: &DbPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

pub fn known_count() -> usize {
    MIGRATOR.migrations.len()
}

/// Migrations recorded in the database's own ledger. Errors when the ledger
/// table does not exist yet, which reads as "never migrated".
pub async fn applied_count(pool: &DbPool) -> Result<i64, sqlx::Error> {
    use sqlx::Row;

    sqlx::query("SELECT COUNT(*) AS n FROM _sqlx_migrations")
        .fetch_one(pool)
        .await
        .map(|row| row.get("n"))
}

#[cfg(test)]
mod tests {
    use sqlx::Row;

    use super::run_pending;
    use crate::connect_with_settings;

    const MANAGED_SCHEMA_OBJECTS: &[&str] = &[
        "app_user",
        "expense_request",
        "idx_app_user_role",
        "idx_expense_request_status",
        "idx_expense_request_submitter_id",
    ];

    #[tokio::test]
    async fn migrations_create_managed_schema_objects() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("migrations");

        let rows = sqlx::query(
            "SELECT name FROM sqlite_master WHERE type IN ('table', 'index') AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx_%'",
        )
        .fetch_all(&pool)
        .await
        .expect("schema query");

        let names: Vec<String> =
            rows.iter().map(|row| row.get::<String, _>("name")).collect();
        for object in MANAGED_SCHEMA_OBJECTS {
            assert!(names.iter().any(|name| name == object), "missing schema object `{object}`");
        }
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        run_pending(&pool).await.expect("first run");
        run_pending(&pool).await.expect("second run");

        let applied = super::applied_count(&pool).await.expect("ledger count");
        assert_eq!(applied, super::known_count() as i64);
    }
}
