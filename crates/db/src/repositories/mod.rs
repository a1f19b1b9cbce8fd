use async_trait::async_trait;
use thiserror::Error;

use spendgate_core::domain::user::{User, UserId};
use spendgate_core::domain::workflow::{WorkflowConfig, WorkflowConfigError};

pub mod expense;
pub mod memory;
pub mod user;

pub use expense::SqlExpenseRepository;
pub use memory::{InMemoryRequestStore, InMemoryUserDirectory};
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error(transparent)]
    InvalidWorkflow(#[from] WorkflowConfigError),
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    async fn save(&self, user: User) -> Result<(), RepositoryError>;
    async fn list(&self) -> Result<Vec<User>, RepositoryError>;
    async fn list_managers(&self) -> Result<Vec<User>, RepositoryError>;
    async fn workflow_for(&self, id: &UserId) -> Result<Option<WorkflowConfig>, RepositoryError>;
    /// Validates and replaces a user's workflow. Returns `false` when the
    /// user does not exist.
    async fn save_workflow(
        &self,
        id: &UserId,
        workflow: WorkflowConfig,
    ) -> Result<bool, RepositoryError>;
}
