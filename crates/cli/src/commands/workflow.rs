use spendgate_core::domain::user::UserId;
use spendgate_core::domain::workflow::WorkflowConfig;
use spendgate_db::repositories::{SqlUserRepository, UserRepository};

use crate::commands::{with_pool, CommandResult};

#[derive(Clone, Debug, Default)]
pub struct WorkflowArgs {
    pub user: String,
    pub approvers: Option<Vec<String>>,
    pub sequenced: Option<bool>,
    pub min_percentage: Option<u8>,
    pub special: Option<String>,
    pub clear_special: bool,
}

impl WorkflowArgs {
    fn is_update(&self) -> bool {
        self.approvers.is_some()
            || self.sequenced.is_some()
            || self.min_percentage.is_some()
            || self.special.is_some()
            || self.clear_special
    }
}

fn describe(workflow: &WorkflowConfig) -> String {
    let approvers = workflow
        .approvers
        .iter()
        .map(|id| id.0.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    let special = workflow
        .special_approver_id
        .as_ref()
        .map(|id| id.0.as_str())
        .unwrap_or("none");
    format!(
        "approvers=[{approvers}] sequenced={} min_approval={}% special={special}",
        workflow.is_sequenced, workflow.min_approval_percentage
    )
}

pub fn run(args: WorkflowArgs) -> CommandResult {
    with_pool("workflow", |pool| async move {
        let users = SqlUserRepository::new(pool);
        let user_id = UserId(args.user.clone());

        let current = users
            .workflow_for(&user_id)
            .await
            .map_err(|error| ("store", error.to_string(), 5u8))?
            .ok_or_else(|| {
                ("user_not_found", format!("no user with id `{}`", args.user), 5u8)
            })?;

        if !args.is_update() {
            return Ok(format!("workflow for `{}`: {}", args.user, describe(&current)));
        }

        let mut next = current;
        if let Some(approvers) = args.approvers {
            next.approvers = approvers.into_iter().map(UserId).collect();
        }
        if let Some(sequenced) = args.sequenced {
            next.is_sequenced = sequenced;
        }
        if let Some(percentage) = args.min_percentage {
            next.min_approval_percentage = percentage;
        }
        if args.clear_special {
            next.special_approver_id = None;
        } else if let Some(special) = args.special {
            next.special_approver_id = Some(UserId(special));
        }

        let saved = users
            .save_workflow(&user_id, next.clone())
            .await
            .map_err(|error| match error {
                spendgate_db::repositories::RepositoryError::InvalidWorkflow(cause) => {
                    ("invalid_workflow", cause.to_string(), 2u8)
                }
                other => ("store", other.to_string(), 5u8),
            })?;
        if !saved {
            return Err(("user_not_found", format!("no user with id `{}`", args.user), 5u8));
        }

        Ok(format!("updated workflow for `{}`: {}", args.user, describe(&next)))
    })
}
