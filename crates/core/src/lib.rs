pub mod config;
pub mod consensus;
pub mod domain;
pub mod engine;
pub mod errors;

pub use consensus::{build_slots, evaluate, is_visible_to, settle};
pub use domain::expense::{
    ApproverSlot, Decision, ExpenseCategory, ExpenseId, ExpenseRequest, ExpenseStatus, Verdict,
};
pub use domain::user::{Role, User, UserId};
pub use domain::workflow::{WorkflowConfig, WorkflowConfigError};
pub use engine::{ApprovalEngine, ExpenseDraft, RequestStore, SubmitTarget, UserDirectory};
pub use errors::{EngineError, StoreError};
