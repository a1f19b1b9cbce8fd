use chrono::Utc;
use sqlx::Row;

use spendgate_core::domain::user::{Role, User, UserId};
use spendgate_core::domain::workflow::WorkflowConfig;
use spendgate_core::engine::UserDirectory;
use spendgate_core::errors::StoreError;

use super::{RepositoryError, UserRepository};
use crate::DbPool;

pub struct SqlUserRepository {
    pool: DbPool,
}

impl SqlUserRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn parse_role(s: &str) -> Result<Role, RepositoryError> {
    match s {
        "admin" => Ok(Role::Admin),
        "manager" => Ok(Role::Manager),
        "finance" => Ok(Role::Finance),
        "director" => Ok(Role::Director),
        "employee" => Ok(Role::Employee),
        other => Err(RepositoryError::Decode(format!("unknown role `{other}`"))),
    }
}

pub fn role_as_str(role: Role) -> &'static str {
    match role {
        Role::Admin => "admin",
        Role::Manager => "manager",
        Role::Finance => "finance",
        Role::Director => "director",
        Role::Employee => "employee",
    }
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let email: String =
        row.try_get("email").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let role_str: String =
        row.try_get("role").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let manager_id: Option<String> =
        row.try_get("manager_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(User {
        id: UserId(id),
        name,
        email,
        role: parse_role(&role_str)?,
        manager_id: manager_id.map(UserId),
    })
}

fn row_to_workflow(row: &sqlx::sqlite::SqliteRow) -> Result<WorkflowConfig, RepositoryError> {
    let approvers_json: String = row
        .try_get("workflow_approvers")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let approvers: Vec<UserId> = serde_json::from_str(&approvers_json)
        .map_err(|e| RepositoryError::Decode(format!("workflow approvers: {e}")))?;
    let is_sequenced: bool = row
        .try_get("workflow_is_sequenced")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let min_approval_percentage: i64 = row
        .try_get("workflow_min_approval_pct")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let special_approver_id: Option<String> = row
        .try_get("workflow_special_approver_id")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let min_approval_percentage = u8::try_from(min_approval_percentage).map_err(|_| {
        RepositoryError::Decode(format!(
            "workflow percentage {min_approval_percentage} out of range"
        ))
    })?;

    Ok(WorkflowConfig {
        approvers,
        is_sequenced,
        min_approval_percentage,
        special_approver_id: special_approver_id.map(UserId),
    })
}

const USER_COLUMNS: &str = "id, name, email, role, manager_id";
const WORKFLOW_COLUMNS: &str = "workflow_approvers, workflow_is_sequenced, \
                                workflow_min_approval_pct, workflow_special_approver_id";

#[async_trait::async_trait]
impl UserRepository for SqlUserRepository {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {USER_COLUMNS} FROM app_user WHERE id = ?"))
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_user(r)?)),
            None => Ok(None),
        }
    }

    /// Upserts the identity fields. A fresh user gets the default workflow;
    /// an existing user's workflow is left untouched.
    async fn save(&self, user: User) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            "INSERT INTO app_user (id, name, email, role, manager_id, workflow_approvers,
                                   workflow_is_sequenced, workflow_min_approval_pct,
                                   workflow_special_approver_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, '[]', 0, 50, NULL, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 name = excluded.name,
                 email = excluded.email,
                 role = excluded.role,
                 manager_id = excluded.manager_id,
                 updated_at = excluded.updated_at",
        )
        .bind(&user.id.0)
        .bind(&user.name)
        .bind(&user.email)
        .bind(role_as_str(user.role))
        .bind(user.manager_id.as_ref().map(|id| id.0.clone()))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<User>, RepositoryError> {
        let rows =
            sqlx::query(&format!("SELECT {USER_COLUMNS} FROM app_user ORDER BY name ASC"))
                .fetch_all(&self.pool)
                .await?;

        rows.iter().map(row_to_user).collect()
    }

    async fn list_managers(&self) -> Result<Vec<User>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM app_user WHERE role = 'manager' ORDER BY name ASC"
        ))
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_user).collect()
    }

    async fn workflow_for(&self, id: &UserId) -> Result<Option<WorkflowConfig>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {WORKFLOW_COLUMNS} FROM app_user WHERE id = ?"))
                .bind(&id.0)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_workflow(r)?)),
            None => Ok(None),
        }
    }

    async fn save_workflow(
        &self,
        id: &UserId,
        workflow: WorkflowConfig,
    ) -> Result<bool, RepositoryError> {
        workflow.validate(id)?;

        let approvers_json = serde_json::to_string(&workflow.approvers)
            .map_err(|e| RepositoryError::Decode(format!("workflow approvers: {e}")))?;

        let result = sqlx::query(
            "UPDATE app_user SET
                 workflow_approvers = ?,
                 workflow_is_sequenced = ?,
                 workflow_min_approval_pct = ?,
                 workflow_special_approver_id = ?,
                 updated_at = ?
             WHERE id = ?",
        )
        .bind(&approvers_json)
        .bind(workflow.is_sequenced)
        .bind(i64::from(workflow.min_approval_percentage))
        .bind(workflow.special_approver_id.as_ref().map(|id| id.0.clone()))
        .bind(Utc::now().to_rfc3339())
        .bind(&id.0)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait::async_trait]
impl UserDirectory for SqlUserRepository {
    async fn exists(&self, user_id: &UserId) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM app_user WHERE id = ?")
            .bind(&user_id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(row.is_some())
    }

    async fn workflow_config(
        &self,
        user_id: &UserId,
    ) -> Result<Option<WorkflowConfig>, StoreError> {
        self.workflow_for(user_id).await.map_err(|e| StoreError::Backend(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use spendgate_core::domain::user::{Role, User, UserId};
    use spendgate_core::domain::workflow::WorkflowConfig;
    use spendgate_core::engine::UserDirectory;

    use super::SqlUserRepository;
    use crate::repositories::{RepositoryError, UserRepository};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn sample_user(id: &str, role: Role) -> User {
        User {
            id: UserId(id.to_string()),
            name: format!("User {id}"),
            email: format!("{id}@example.test"),
            role,
            manager_id: None,
        }
    }

    #[tokio::test]
    async fn save_and_find_round_trip() {
        let pool = setup().await;
        let repo = SqlUserRepository::new(pool);

        repo.save(sample_user("u-emp", Role::Employee)).await.expect("save");
        let found =
            repo.find_by_id(&UserId("u-emp".to_string())).await.expect("find").expect("exists");
        assert_eq!(found.role, Role::Employee);
        assert_eq!(found.email, "u-emp@example.test");
    }

    #[tokio::test]
    async fn new_user_starts_with_default_workflow() {
        let pool = setup().await;
        let repo = SqlUserRepository::new(pool);

        repo.save(sample_user("u-emp", Role::Employee)).await.expect("save");
        let workflow = repo
            .workflow_for(&UserId("u-emp".to_string()))
            .await
            .expect("workflow")
            .expect("present");
        assert_eq!(workflow, WorkflowConfig::default());
    }

    #[tokio::test]
    async fn saving_a_workflow_does_not_clobber_on_user_update() {
        let pool = setup().await;
        let repo = SqlUserRepository::new(pool);
        let id = UserId("u-emp".to_string());

        repo.save(sample_user("u-emp", Role::Employee)).await.expect("save user");
        repo.save(sample_user("u-mgr", Role::Manager)).await.expect("save manager");

        let workflow = WorkflowConfig {
            approvers: vec![UserId("u-mgr".to_string())],
            is_sequenced: true,
            min_approval_percentage: 100,
            special_approver_id: None,
        };
        assert!(repo.save_workflow(&id, workflow.clone()).await.expect("save workflow"));

        // Re-saving the user record keeps the configured workflow intact.
        let mut renamed = sample_user("u-emp", Role::Employee);
        renamed.name = "Renamed".to_string();
        repo.save(renamed).await.expect("resave");

        let stored = repo.workflow_for(&id).await.expect("workflow").expect("present");
        assert_eq!(stored, workflow);
    }

    #[tokio::test]
    async fn workflow_validation_is_enforced_on_save() {
        let pool = setup().await;
        let repo = SqlUserRepository::new(pool);
        let id = UserId("u-emp".to_string());

        repo.save(sample_user("u-emp", Role::Employee)).await.expect("save");

        let workflow = WorkflowConfig { approvers: vec![id.clone()], ..WorkflowConfig::default() };
        let error = repo.save_workflow(&id, workflow).await.unwrap_err();
        assert!(matches!(error, RepositoryError::InvalidWorkflow(_)));
    }

    #[tokio::test]
    async fn save_workflow_for_missing_user_reports_not_found() {
        let pool = setup().await;
        let repo = SqlUserRepository::new(pool);

        let updated = repo
            .save_workflow(&UserId("u-ghost".to_string()), WorkflowConfig::default())
            .await
            .expect("save workflow");
        assert!(!updated);
    }

    #[tokio::test]
    async fn list_managers_filters_by_role() {
        let pool = setup().await;
        let repo = SqlUserRepository::new(pool);

        repo.save(sample_user("u-emp", Role::Employee)).await.expect("save 1");
        repo.save(sample_user("u-mgr-1", Role::Manager)).await.expect("save 2");
        repo.save(sample_user("u-mgr-2", Role::Manager)).await.expect("save 3");

        let managers = repo.list_managers().await.expect("list managers");
        assert_eq!(managers.len(), 2);
        assert!(managers.iter().all(|user| user.role == Role::Manager));
    }

    #[tokio::test]
    async fn directory_exists_reflects_stored_users() {
        let pool = setup().await;
        let repo = SqlUserRepository::new(pool);

        repo.save(sample_user("u-emp", Role::Employee)).await.expect("save");
        assert!(repo.exists(&UserId("u-emp".to_string())).await.expect("exists"));
        assert!(!repo.exists(&UserId("u-ghost".to_string())).await.expect("exists"));
    }
}
