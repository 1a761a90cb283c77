use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::request::{ReimbursementRequest, RequestStatus};

/// Caller-driven actions that move a request through its review lifecycle.
/// Raw field updates never change `status`; this is the only path.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewAction {
    /// Draft -> WAITING_APPROVAL.
    Submit,
    /// First- or second-stage approval, depending on the current status.
    Approve,
    /// First- or second-stage rejection, depending on the current status.
    Reject,
    /// Finance/ERP posting of a fully approved request.
    Process,
    /// System-detected processing failure; legal from any non-terminal status.
    Fail,
}

#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("invalid transition from {from:?} using action {action:?}")]
pub struct InvalidTransition {
    pub from: RequestStatus,
    pub action: ReviewAction,
}

pub fn next_status(
    current: RequestStatus,
    action: ReviewAction,
) -> Result<RequestStatus, InvalidTransition> {
    use RequestStatus::{
        Draft, Error, Processed, Stage1Approved, Stage1Rejected, Stage2Approved, Stage2Rejected,
        WaitingApproval,
    };
    use ReviewAction::{Approve, Fail, Process, Reject, Submit};

    let to = match (current, action) {
        (Draft, Submit) => WaitingApproval,
        (WaitingApproval, Approve) => Stage1Approved,
        (WaitingApproval, Reject) => Stage1Rejected,
        (Stage1Approved, Approve) => Stage2Approved,
        (Stage1Approved, Reject) => Stage2Rejected,
        (Stage2Approved, Process) => Processed,
        (from, Fail) if !from.is_terminal() => Error,
        _ => return Err(InvalidTransition { from: current, action }),
    };

    Ok(to)
}

impl ReimbursementRequest {
    pub fn can_apply(&self, action: ReviewAction) -> bool {
        next_status(self.status, action).is_ok()
    }

    pub fn apply_action(&mut self, action: ReviewAction) -> Result<(), InvalidTransition> {
        self.status = next_status(self.status, action)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::{next_status, InvalidTransition, ReviewAction};
    use crate::domain::request::{ReimbursementRequest, RequestId, RequestStatus};
    use crate::domain::user::UserId;

    fn request(status: RequestStatus) -> ReimbursementRequest {
        ReimbursementRequest {
            id: RequestId("REQ-1".to_string()),
            request_date: NaiveDate::from_ymd_opt(2026, 3, 2).expect("date"),
            requester_id: UserId("u-1".to_string()),
            requester_name: "Avery Chen".to_string(),
            approver: "Jane Doe".to_string(),
            approver_id: None,
            status,
            stage: "NEW".to_string(),
            line_items: Vec::new(),
            attached_bills: Vec::new(),
            overall_comments: String::new(),
            approver_comments: String::new(),
            bot_remarks: String::new(),
            version: 1,
            extra: serde_json::Map::new(),
        }
    }

    #[test]
    fn two_stage_approval_path_reaches_processed() {
        let mut record = request(RequestStatus::WaitingApproval);
        record.apply_action(ReviewAction::Approve).expect("stage 1");
        assert_eq!(record.status, RequestStatus::Stage1Approved);
        record.apply_action(ReviewAction::Approve).expect("stage 2");
        assert_eq!(record.status, RequestStatus::Stage2Approved);
        record.apply_action(ReviewAction::Process).expect("posting");
        assert_eq!(record.status, RequestStatus::Processed);
    }

    #[test]
    fn rejection_is_terminal_at_either_stage() {
        let mut record = request(RequestStatus::WaitingApproval);
        record.apply_action(ReviewAction::Reject).expect("stage 1 reject");
        assert_eq!(record.status, RequestStatus::Stage1Rejected);

        let error =
            record.apply_action(ReviewAction::Approve).expect_err("terminal status must refuse");
        assert_eq!(
            error,
            InvalidTransition {
                from: RequestStatus::Stage1Rejected,
                action: ReviewAction::Approve
            }
        );
    }

    #[test]
    fn draft_submits_into_waiting_approval() {
        let mut record = request(RequestStatus::Draft);
        record.apply_action(ReviewAction::Submit).expect("submit");
        assert_eq!(record.status, RequestStatus::WaitingApproval);
    }

    #[test]
    fn any_non_terminal_status_can_fail() {
        for status in [
            RequestStatus::Draft,
            RequestStatus::WaitingApproval,
            RequestStatus::Stage1Approved,
            RequestStatus::Stage2Approved,
        ] {
            assert_eq!(next_status(status, ReviewAction::Fail).expect("fail"), RequestStatus::Error);
        }

        for status in [
            RequestStatus::Stage1Rejected,
            RequestStatus::Stage2Rejected,
            RequestStatus::Processed,
            RequestStatus::Error,
        ] {
            assert!(next_status(status, ReviewAction::Fail).is_err());
        }
    }

    #[test]
    fn processing_requires_second_stage_approval() {
        assert!(next_status(RequestStatus::Stage1Approved, ReviewAction::Process).is_err());
        assert!(next_status(RequestStatus::WaitingApproval, ReviewAction::Process).is_err());
        assert!(request(RequestStatus::Stage2Approved).can_apply(ReviewAction::Process));
    }
}
