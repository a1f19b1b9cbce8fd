use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::user::UserId;

/// A submitter's approval workflow. One per user, editable by admins; every
/// submission copies the relevant fields onto the request, so later edits
/// never touch requests already in flight.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub approvers: Vec<UserId>,
    pub is_sequenced: bool,
    pub min_approval_percentage: u8,
    pub special_approver_id: Option<UserId>,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            approvers: Vec::new(),
            is_sequenced: false,
            min_approval_percentage: 50,
            special_approver_id: None,
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum WorkflowConfigError {
    #[error("approver `{0}` appears more than once")]
    DuplicateApprover(UserId),
    #[error("submitter `{0}` cannot approve their own expenses")]
    OwnerIsApprover(UserId),
    #[error("minimum approval percentage {0} is out of range 0-100")]
    PercentageOutOfRange(u8),
}

impl WorkflowConfig {
    pub fn validate(&self, owner: &UserId) -> Result<(), WorkflowConfigError> {
        let mut seen = HashSet::new();
        for approver in &self.approvers {
            if !seen.insert(approver) {
                return Err(WorkflowConfigError::DuplicateApprover(approver.clone()));
            }
            if approver == owner {
                return Err(WorkflowConfigError::OwnerIsApprover(owner.clone()));
            }
        }

        if self.min_approval_percentage > 100 {
            return Err(WorkflowConfigError::PercentageOutOfRange(self.min_approval_percentage));
        }

        Ok(())
    }
}
