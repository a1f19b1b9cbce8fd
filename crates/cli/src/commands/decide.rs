use spendgate_core::domain::expense::{ExpenseId, Verdict};
use spendgate_core::domain::user::UserId;
use spendgate_core::engine::ApprovalEngine;
use spendgate_db::repositories::{SqlExpenseRepository, SqlUserRepository};

use crate::commands::{engine_error_class, with_pool, CommandResult};

pub fn run(request: String, approver: String, decision: String) -> CommandResult {
    let verdict = match decision.trim().to_ascii_lowercase().as_str() {
        "approved" | "approve" => Verdict::Approved,
        "rejected" | "reject" => Verdict::Rejected,
        other => {
            return CommandResult::failure(
                "decide",
                "invalid_argument",
                format!("unknown decision `{other}` (expected approved|rejected)"),
                2,
            );
        }
    };

    with_pool("decide", |pool| async move {
        let engine = ApprovalEngine::new(
            SqlUserRepository::new(pool.clone()),
            SqlExpenseRepository::new(pool.clone()),
        );

        let status = engine
            .decide(&ExpenseId(request.clone()), &UserId(approver.clone()), verdict)
            .await
            .map_err(|error| (engine_error_class(&error), error.to_string(), 5u8))?;

        Ok(format!("recorded {verdict:?} by `{approver}` on `{request}`; status is now {status:?}"))
    })
}
