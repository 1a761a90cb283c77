use chrono::{DateTime, NaiveDate};
use rand::Rng;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::domain::request::{
    AttachedBill, LineItem, ReimbursementRequest, RequestId, RequestStatus,
};
use crate::domain::user::UserId;
use crate::errors::DomainError;
use crate::identity::VerifiedIdentity;

pub const INITIAL_STAGE: &str = "NEW";

/// Wire keys that callers may send but that never overwrite server-owned
/// fields, on creation or update.
const PINNED_FIELDS: &[&str] =
    &["id", "status", "version", "requesterId", "requesterName", "requestDate"];

/// Time-based token: millisecond timestamp plus a short random suffix so two
/// creations in the same millisecond still get distinct ids.
pub fn generate_request_id(now: DateTime<chrono::Utc>) -> RequestId {
    let suffix: u32 = rand::thread_rng().gen();
    RequestId(format!("REQ-{}-{suffix:08x}", now.timestamp_millis()))
}

/// Caller-supplied creation payload. Everything beyond the known fields is
/// carried through verbatim in `extra`.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRequest {
    #[serde(default)]
    pub approver: String,
    #[serde(default)]
    pub approver_id: Option<UserId>,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub attached_bills: Vec<AttachedBill>,
    #[serde(default)]
    pub overall_comments: String,
    #[serde(default)]
    pub stage: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Build a submitted request: generated id, today's date, WAITING_APPROVAL.
pub fn build_request(
    identity: &VerifiedIdentity,
    input: NewRequest,
    id: RequestId,
    today: NaiveDate,
) -> Result<ReimbursementRequest, DomainError> {
    if input.approver.trim().is_empty() && input.approver_id.is_none() {
        return Err(DomainError::Validation(
            "an approver is required when submitting a request".to_string(),
        ));
    }

    build_with_status(identity, input, id, today, RequestStatus::WaitingApproval)
}

/// Draft save: same shape, status Draft, no approver required yet.
pub fn build_draft(
    identity: &VerifiedIdentity,
    input: NewRequest,
    id: RequestId,
    today: NaiveDate,
) -> Result<ReimbursementRequest, DomainError> {
    build_with_status(identity, input, id, today, RequestStatus::Draft)
}

fn build_with_status(
    identity: &VerifiedIdentity,
    input: NewRequest,
    id: RequestId,
    today: NaiveDate,
    status: RequestStatus,
) -> Result<ReimbursementRequest, DomainError> {
    validate_line_items(&input.line_items)?;

    let mut extra = input.extra;
    strip_pinned_fields(&mut extra);

    Ok(ReimbursementRequest {
        id,
        request_date: today,
        requester_id: identity.user_id.clone(),
        requester_name: identity.display_name.clone().unwrap_or_else(|| identity.user_id.0.clone()),
        approver: input.approver,
        approver_id: input.approver_id,
        status,
        stage: input.stage.unwrap_or_else(|| INITIAL_STAGE.to_string()),
        line_items: input.line_items,
        attached_bills: input.attached_bills,
        overall_comments: input.overall_comments,
        approver_comments: String::new(),
        bot_remarks: String::new(),
        version: 1,
        extra,
    })
}

/// Partial update payload. `id`, `status`, `version`, the requester identity,
/// and the request date are pinned: whatever the caller sends for them is
/// discarded. Status moves only through the transition operation.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestPatch {
    pub approver: Option<String>,
    pub approver_id: Option<UserId>,
    pub line_items: Option<Vec<LineItem>>,
    pub attached_bills: Option<Vec<AttachedBill>>,
    pub overall_comments: Option<String>,
    pub approver_comments: Option<String>,
    pub bot_remarks: Option<String>,
    pub stage: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub fn apply_update(
    record: &mut ReimbursementRequest,
    patch: RequestPatch,
) -> Result<(), DomainError> {
    if let Some(line_items) = &patch.line_items {
        validate_line_items(line_items)?;
    }

    if let Some(approver) = patch.approver {
        record.approver = approver;
    }
    if let Some(approver_id) = patch.approver_id {
        record.approver_id = Some(approver_id);
    }
    if let Some(line_items) = patch.line_items {
        record.line_items = line_items;
    }
    if let Some(attached_bills) = patch.attached_bills {
        record.attached_bills = attached_bills;
    }
    if let Some(overall_comments) = patch.overall_comments {
        record.overall_comments = overall_comments;
    }
    if let Some(approver_comments) = patch.approver_comments {
        record.approver_comments = approver_comments;
    }
    if let Some(bot_remarks) = patch.bot_remarks {
        record.bot_remarks = bot_remarks;
    }
    if let Some(stage) = patch.stage {
        record.stage = stage;
    }

    let mut extra = patch.extra;
    strip_pinned_fields(&mut extra);
    record.extra.extend(extra);

    Ok(())
}

fn strip_pinned_fields(extra: &mut Map<String, Value>) {
    for field in PINNED_FIELDS {
        extra.remove(*field);
    }
}

fn validate_line_items(line_items: &[LineItem]) -> Result<(), DomainError> {
    for line in line_items {
        if line.amount.is_sign_negative() {
            return Err(DomainError::Validation(format!(
                "line item `{}` has a negative amount",
                line.bill_no
            )));
        }
    }
    Ok(())
}
