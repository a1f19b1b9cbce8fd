use spendgate_core::domain::user::UserId;
use spendgate_db::repositories::expense::status_as_str;
use spendgate_db::repositories::SqlExpenseRepository;

use crate::commands::{with_pool, CommandResult};

pub fn run(submitter: String) -> CommandResult {
    with_pool("expenses", |pool| async move {
        let store = SqlExpenseRepository::new(pool);

        let requests = store
            .list_for_submitter(&UserId(submitter.clone()))
            .await
            .map_err(|error| ("store", error.to_string(), 5u8))?;

        if requests.is_empty() {
            return Ok(format!("no expense requests submitted by `{submitter}`"));
        }

        let lines = requests
            .iter()
            .map(|request| {
                format!(
                    "{} ({}, {} {})",
                    request.id,
                    status_as_str(request.status),
                    request.amount,
                    request.currency
                )
            })
            .collect::<Vec<_>>()
            .join("; ");
        Ok(format!("{} submitted by `{submitter}`: {lines}", requests.len()))
    })
}
