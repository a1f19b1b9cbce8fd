use chrono::NaiveDate;
use rust_decimal::Decimal;
use std::str::FromStr;

use spendgate_core::domain::expense::ExpenseCategory;
use spendgate_core::domain::user::UserId;
use spendgate_core::engine::{ApprovalEngine, ExpenseDraft, SubmitTarget};
use spendgate_db::repositories::{SqlExpenseRepository, SqlUserRepository};

use crate::commands::{engine_error_class, with_pool, CommandResult};

#[derive(Clone, Debug)]
pub struct SubmitArgs {
    pub submitter: String,
    pub description: String,
    pub date: String,
    pub category: String,
    pub amount: String,
    pub currency: String,
    pub paid_by: Option<String>,
    pub remarks: Option<String>,
    pub draft: bool,
}

fn parse_category(raw: &str) -> Result<ExpenseCategory, String> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "food" => Ok(ExpenseCategory::Food),
        "travel" => Ok(ExpenseCategory::Travel),
        "accommodation" => Ok(ExpenseCategory::Accommodation),
        "other" => Ok(ExpenseCategory::Other),
        other => Err(format!("unknown category `{other}` (expected food|travel|accommodation|other)")),
    }
}

pub fn run(args: SubmitArgs) -> CommandResult {
    let expense_date = match NaiveDate::parse_from_str(&args.date, "%Y-%m-%d") {
        Ok(date) => date,
        Err(error) => {
            return CommandResult::failure(
                "submit",
                "invalid_argument",
                format!("invalid --date `{}`: {error}", args.date),
                2,
            );
        }
    };
    let category = match parse_category(&args.category) {
        Ok(category) => category,
        Err(message) => return CommandResult::failure("submit", "invalid_argument", message, 2),
    };
    let amount = match Decimal::from_str(&args.amount) {
        Ok(amount) => amount,
        Err(error) => {
            return CommandResult::failure(
                "submit",
                "invalid_argument",
                format!("invalid --amount `{}`: {error}", args.amount),
                2,
            );
        }
    };

    with_pool("submit", |pool| async move {
        let engine = ApprovalEngine::new(
            SqlUserRepository::new(pool.clone()),
            SqlExpenseRepository::new(pool.clone()),
        );

        let draft = ExpenseDraft {
            submitter_id: UserId(args.submitter.clone()),
            description: args.description,
            expense_date,
            category,
            paid_by: args.paid_by.unwrap_or(args.submitter),
            amount,
            currency: args.currency.to_ascii_uppercase(),
            remarks: args.remarks.unwrap_or_default(),
            receipt_file_name: None,
        };
        let target = if args.draft { SubmitTarget::Draft } else { SubmitTarget::Pending };

        let request = engine
            .submit(draft, target)
            .await
            .map_err(|error| (engine_error_class(&error), error.to_string(), 5u8))?;

        Ok(format!("created expense request `{}` with status {:?}", request.id, request.status))
    })
}
