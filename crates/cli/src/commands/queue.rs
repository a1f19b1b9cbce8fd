use spendgate_core::domain::user::UserId;
use spendgate_core::engine::ApprovalEngine;
use spendgate_db::repositories::{SqlExpenseRepository, SqlUserRepository};

use crate::commands::{engine_error_class, with_pool, CommandResult};

pub fn run(approver: String) -> CommandResult {
    with_pool("queue", |pool| async move {
        let engine = ApprovalEngine::new(
            SqlUserRepository::new(pool.clone()),
            SqlExpenseRepository::new(pool.clone()),
        );

        let queue = engine
            .list_queue_for(&UserId(approver.clone()))
            .await
            .map_err(|error| (engine_error_class(&error), error.to_string(), 5u8))?;

        if queue.is_empty() {
            return Ok(format!("no expense requests awaiting `{approver}`"));
        }

        let ids = queue.iter().map(|id| id.0.as_str()).collect::<Vec<_>>().join(", ");
        Ok(format!("{} awaiting `{approver}`: {ids}", queue.len()))
    })
}
