use std::collections::HashMap;

use tokio::sync::RwLock;

use spendgate_core::domain::expense::{Decision, ExpenseId, ExpenseRequest, ExpenseStatus};
use spendgate_core::domain::user::UserId;
use spendgate_core::domain::workflow::WorkflowConfig;
use spendgate_core::engine::{RequestStore, UserDirectory};
use spendgate_core::errors::StoreError;

/// Directory backed by a map of user id to workflow. Every registered user
/// has a workflow, mirroring the default-on-creation behavior of the SQL
/// repository.
#[derive(Default)]
pub struct InMemoryUserDirectory {
    workflows: RwLock<HashMap<String, WorkflowConfig>>,
}

impl InMemoryUserDirectory {
    pub async fn register(&self, user_id: &UserId, workflow: WorkflowConfig) {
        self.workflows.write().await.insert(user_id.0.clone(), workflow);
    }
}

#[async_trait::async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn exists(&self, user_id: &UserId) -> Result<bool, StoreError> {
        Ok(self.workflows.read().await.contains_key(&user_id.0))
    }

    async fn workflow_config(
        &self,
        user_id: &UserId,
    ) -> Result<Option<WorkflowConfig>, StoreError> {
        Ok(self.workflows.read().await.get(&user_id.0).cloned())
    }
}

/// Revision-checked in-memory request store with the same conflict semantics
/// as the SQL implementation.
#[derive(Default)]
pub struct InMemoryRequestStore {
    requests: RwLock<HashMap<String, ExpenseRequest>>,
}

#[async_trait::async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn insert(&self, request: ExpenseRequest) -> Result<(), StoreError> {
        self.requests.write().await.insert(request.id.0.clone(), request);
        Ok(())
    }

    async fn fetch(&self, id: &ExpenseId) -> Result<Option<ExpenseRequest>, StoreError> {
        Ok(self.requests.read().await.get(&id.0).cloned())
    }

    async fn compare_and_update(
        &self,
        expected_revision: i64,
        next: ExpenseRequest,
    ) -> Result<(), StoreError> {
        let mut requests = self.requests.write().await;
        match requests.get(&next.id.0) {
            Some(stored) if stored.revision == expected_revision => {
                requests.insert(next.id.0.clone(), next);
                Ok(())
            }
            _ => Err(StoreError::Conflict),
        }
    }

    async fn query_pending_with_approver(
        &self,
        approver_id: &UserId,
    ) -> Result<Vec<ExpenseRequest>, StoreError> {
        let requests = self.requests.read().await;
        let mut matches: Vec<ExpenseRequest> = requests
            .values()
            .filter(|request| {
                request.status == ExpenseStatus::Pending
                    && request
                        .slot_for(approver_id)
                        .is_some_and(|slot| slot.decision == Decision::Pending)
            })
            .cloned()
            .collect();
        matches.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use rust_decimal::Decimal;

    use spendgate_core::domain::expense::{
        ApproverSlot, ExpenseCategory, ExpenseId, ExpenseRequest, ExpenseStatus,
    };
    use spendgate_core::domain::user::UserId;
    use spendgate_core::engine::RequestStore;
    use spendgate_core::errors::StoreError;

    use super::InMemoryRequestStore;

    fn request(id: &str, revision: i64) -> ExpenseRequest {
        let now = Utc::now();
        ExpenseRequest {
            id: ExpenseId(id.to_string()),
            submitter_id: UserId("u-emp".to_string()),
            description: "Team lunch".to_string(),
            expense_date: NaiveDate::from_ymd_opt(2026, 4, 2).expect("valid date"),
            category: ExpenseCategory::Food,
            paid_by: "u-emp".to_string(),
            amount: Decimal::new(6_400, 2),
            currency: "USD".to_string(),
            remarks: String::new(),
            receipt_file_name: None,
            status: ExpenseStatus::Pending,
            slots: vec![ApproverSlot::pending(UserId("u-mgr".to_string()))],
            is_sequenced: false,
            min_approval_percentage: 50,
            special_approver_id: None,
            revision,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn cas_succeeds_only_at_current_revision() {
        let store = InMemoryRequestStore::default();
        store.insert(request("EXP-1", 0)).await.expect("insert");

        store.compare_and_update(0, request("EXP-1", 1)).await.expect("first cas");
        let error = store.compare_and_update(0, request("EXP-1", 1)).await.unwrap_err();
        assert_eq!(error, StoreError::Conflict);
    }

    #[tokio::test]
    async fn cas_on_missing_request_conflicts() {
        let store = InMemoryRequestStore::default();
        let error = store.compare_and_update(0, request("EXP-ghost", 1)).await.unwrap_err();
        assert_eq!(error, StoreError::Conflict);
    }
}
