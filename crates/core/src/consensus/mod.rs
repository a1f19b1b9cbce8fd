//! Pure consensus rules: slot snapshots, the decision evaluator, and queue
//! visibility. No I/O and no store access; the engine feeds these from
//! whatever it fetched per call.

use crate::domain::expense::{ApproverSlot, Decision, ExpenseRequest, ExpenseStatus, Verdict};
use crate::domain::user::UserId;
use crate::domain::workflow::WorkflowConfig;

/// Copies the workflow's approver list into fresh `Pending` slots.
///
/// An empty approver list yields an empty snapshot; the submission still
/// proceeds, and [`settle`] decides whether it auto-approves.
pub fn build_slots(config: &WorkflowConfig) -> Vec<ApproverSlot> {
    config.approvers.iter().cloned().map(ApproverSlot::pending).collect()
}

/// Computes the request status after `deciding_approver`'s verdict has been
/// written into its slot.
///
/// Rules, in order: any rejection is final; an approval from the special
/// approver is final; otherwise the threshold and exhaustion math in
/// [`settle`] applies. The first two are absorbing regardless of how
/// concurrent verdicts interleave, so the outcome is arrival-order
/// independent.
pub fn evaluate(
    slots: &[ApproverSlot],
    min_approval_percentage: u8,
    special_approver_id: Option<&UserId>,
    deciding_approver: &UserId,
    verdict: Verdict,
) -> ExpenseStatus {
    match verdict {
        Verdict::Rejected => ExpenseStatus::Rejected,
        Verdict::Approved if special_approver_id == Some(deciding_approver) => {
            ExpenseStatus::Approved
        }
        Verdict::Approved => settle(slots, min_approval_percentage),
    }
}

/// Threshold and exhaustion math over the current slot set.
///
/// The approved percentage is integer floor math, with `0/0` defined as 0%,
/// so an empty snapshot auto-approves exactly when the threshold is 0.
/// The all-voted-but-insufficient fallback rejects rather than stranding the
/// request, but never fires on an empty slot set: a zero-approver request
/// with a positive threshold stays `Pending`.
pub fn settle(slots: &[ApproverSlot], min_approval_percentage: u8) -> ExpenseStatus {
    let total = slots.len();
    let approved = slots.iter().filter(|slot| slot.decision == Decision::Approved).count();
    let rejected = slots.iter().filter(|slot| slot.decision == Decision::Rejected).count();

    let percentage = if total == 0 { 0 } else { 100 * approved / total };
    if percentage >= usize::from(min_approval_percentage) {
        return ExpenseStatus::Approved;
    }

    if total > 0 && approved + rejected == total {
        return ExpenseStatus::Rejected;
    }

    ExpenseStatus::Pending
}

/// Whether `approver_id` currently owes a decision on `request`.
///
/// Sequenced workflows gate on the predecessor chain: every slot before the
/// approver's own must already be `Approved`. A predecessor rejection has
/// already terminated the request, so that case collapses into the status
/// check.
pub fn is_visible_to(request: &ExpenseRequest, approver_id: &UserId) -> bool {
    if request.status != ExpenseStatus::Pending {
        return false;
    }

    let Some(index) = request.slot_index(approver_id) else {
        return false;
    };
    if request.slots[index].decision != Decision::Pending {
        return false;
    }

    if request.is_sequenced {
        return request.slots[..index].iter().all(|slot| slot.decision == Decision::Approved);
    }

    true
}
