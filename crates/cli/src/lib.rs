pub mod commands;

use clap::{Parser, Subcommand};
use std::process::ExitCode;

use commands::submit::SubmitArgs;
use commands::workflow::WorkflowArgs;

#[derive(Debug, Parser)]
#[command(
    name = "spendgate",
    about = "Spendgate operator CLI",
    long_about = "Operate Spendgate expense approvals: migrations, demo fixtures, submissions, approval queues, and decisions.",
    after_help = "Examples:\n  spendgate doctor --json\n  spendgate queue --approver user-mgr-001\n  spendgate decide --request expense-seed-001 --approver user-mgr-001 --decision approved"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load deterministic demo users, workflows, and expense requests")]
    Seed,
    #[command(about = "Validate configuration and database connectivity checks")]
    Doctor {
        #[arg(long, help = "Emit machine-readable JSON output")]
        json: bool,
    },
    #[command(about = "Submit an expense request as a draft or straight into approval")]
    Submit {
        #[arg(long, help = "User id of the submitter")]
        submitter: String,
        #[arg(long, help = "Short description of the expense")]
        description: String,
        #[arg(long, help = "Expense date as YYYY-MM-DD")]
        date: String,
        #[arg(long, help = "Category: food, travel, accommodation, or other")]
        category: String,
        #[arg(long, help = "Amount as a decimal string, e.g. 42.50")]
        amount: String,
        #[arg(long, default_value = "USD", help = "ISO currency code")]
        currency: String,
        #[arg(long, help = "Who paid, when different from the submitter")]
        paid_by: Option<String>,
        #[arg(long, help = "Free-form remarks")]
        remarks: Option<String>,
        #[arg(long, help = "Save as a draft instead of entering approval")]
        draft: bool,
    },
    #[command(about = "List a submitter's own expense requests, newest first")]
    Expenses {
        #[arg(long, help = "User id of the submitter")]
        submitter: String,
    },
    #[command(about = "List expense requests currently awaiting a given approver")]
    Queue {
        #[arg(long, help = "User id of the approver")]
        approver: String,
    },
    #[command(about = "Record an approver's decision on a pending expense request")]
    Decide {
        #[arg(long, help = "Expense request id")]
        request: String,
        #[arg(long, help = "User id of the approver")]
        approver: String,
        #[arg(long, help = "approved or rejected")]
        decision: String,
    },
    #[command(about = "Show or update a user's approval workflow")]
    Workflow {
        #[arg(long, help = "User id whose workflow to show or update")]
        user: String,
        #[arg(long, value_delimiter = ',', help = "Replace the approver list (comma-separated user ids)")]
        approvers: Option<Vec<String>>,
        #[arg(long, help = "Require approvers to act in listed order (true/false)")]
        sequenced: Option<bool>,
        #[arg(long, help = "Minimum approval percentage, 0-100")]
        min_percentage: Option<u8>,
        #[arg(long, help = "Set the special approver whose approval settles the request alone")]
        special: Option<String>,
        #[arg(long, conflicts_with = "special", help = "Remove the special approver")]
        clear_special: bool,
    },
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Doctor { json } => {
            commands::CommandResult { exit_code: 0, output: commands::doctor::run(json) }
        }
        Command::Submit {
            submitter,
            description,
            date,
            category,
            amount,
            currency,
            paid_by,
            remarks,
            draft,
        } => commands::submit::run(SubmitArgs {
            submitter,
            description,
            date,
            category,
            amount,
            currency,
            paid_by,
            remarks,
            draft,
        }),
        Command::Expenses { submitter } => commands::expenses::run(submitter),
        Command::Queue { approver } => commands::queue::run(approver),
        Command::Decide { request, approver, decision } => {
            commands::decide::run(request, approver, decision)
        }
        Command::Workflow { user, approvers, sequenced, min_percentage, special, clear_special } => {
            commands::workflow::run(WorkflowArgs {
                user,
                approvers,
                sequenced,
                min_percentage,
                special,
                clear_special,
            })
        }
    };

    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
