//! Role-scoped query/reporting engine.
//!
//! Every function here is a pure view over the full record set plus a
//! verified caller identity: no mutation, no I/O. The HTTP layer loads the
//! records and hands them in.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::request::{ReimbursementRequest, RequestId, RequestStatus};
use crate::domain::user::Role;
use crate::errors::DomainError;
use crate::identity::VerifiedIdentity;

pub const DEFAULT_RECENT_ACTIVITY_LIMIT: usize = 5;

/// How approver-scoped views resolve "my" requests. The `approver_id`
/// relation always wins when a record carries one; `Legacy` additionally
/// matches the free-text `approver` field by case-insensitive containment of
/// the caller's display name, for records predating the id relation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApproverMatching {
    Strict,
    Legacy,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFilter {
    /// Exact status label; `All` (or absence) disables the filter.
    pub status: Option<String>,
    /// Matches when any line item carries this bill type.
    pub bill_type: Option<String>,
    /// Inclusive lower bound on `request_date`; unparseable values are ignored.
    pub from_date: Option<String>,
    /// Inclusive upper bound on `request_date`; unparseable values are ignored.
    pub to_date: Option<String>,
    /// Case-insensitive substring probe across every scalar field.
    pub global_search: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportRow {
    pub id: RequestId,
    pub date: NaiveDate,
    pub amount: Decimal,
    pub approver: String,
    pub status: RequestStatus,
    pub bill_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequesterSummary {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub drafts: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRow {
    pub id: RequestId,
    pub date: NaiveDate,
    pub status: RequestStatus,
    pub amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApproverSummary {
    pub pending_my_approval: usize,
    pub approved_by_me: usize,
    pub rejected_by_me: usize,
    pub total_requests_reviewed: usize,
    pub total_amount_to_approve: Decimal,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRow {
    pub id: RequestId,
    pub request_date: NaiveDate,
    pub requester_name: String,
    pub approver: String,
    pub status: RequestStatus,
    pub total_amount: Decimal,
}

/// Requesters see their own records; approvers and admins see everything,
/// subject to the explicit filters.
pub fn requester_report(
    records: &[ReimbursementRequest],
    identity: &VerifiedIdentity,
    filter: &ReportFilter,
) -> Vec<ReportRow> {
    let status = normalized_status_filter(filter.status.as_deref());
    let bill_type = normalized_text(filter.bill_type.as_deref());
    let from_date = parse_filter_date(filter.from_date.as_deref());
    let to_date = parse_filter_date(filter.to_date.as_deref());
    let needle = normalized_text(filter.global_search.as_deref()).map(|s| s.to_lowercase());

    visible_records(records, identity)
        .filter(|record| match &status {
            Some(wanted) => record.status.label().eq_ignore_ascii_case(wanted),
            None => true,
        })
        .filter(|record| match &bill_type {
            Some(wanted) => record
                .line_items
                .iter()
                .any(|line| line.bill_type.eq_ignore_ascii_case(wanted)),
            None => true,
        })
        .filter(|record| from_date.map_or(true, |from| record.request_date >= from))
        .filter(|record| to_date.map_or(true, |to| record.request_date <= to))
        .filter(|record| needle.as_deref().map_or(true, |needle| matches_search(record, needle)))
        .map(report_row)
        .collect()
}

/// Counts over the caller's own records, bucketed by status class. Draft is
/// its own literal bucket; anything else outside the three classes is left
/// uncounted.
pub fn requester_summary(
    records: &[ReimbursementRequest],
    identity: &VerifiedIdentity,
) -> RequesterSummary {
    own_records(records, identity).fold(RequesterSummary::default(), |mut summary, record| {
        if record.status == RequestStatus::Draft {
            summary.drafts += 1;
        } else if record.status.is_pending_class() {
            summary.pending += 1;
        } else if record.status.is_approved_class() {
            summary.approved += 1;
        } else if record.status.is_rejected_class() {
            summary.rejected += 1;
        }
        summary
    })
}

/// The caller's own records, newest first, truncated to `limit`.
pub fn recent_activity(
    records: &[ReimbursementRequest],
    identity: &VerifiedIdentity,
    limit: usize,
) -> Vec<ActivityRow> {
    let mut own: Vec<&ReimbursementRequest> = own_records(records, identity).collect();
    own.sort_by(|left, right| {
        right
            .request_date
            .cmp(&left.request_date)
            .then_with(|| left.id.0.cmp(&right.id.0))
    });

    own.into_iter()
        .take(limit)
        .map(|record| {
            let bill = record.first_bill();
            ActivityRow {
                id: record.id.clone(),
                date: record.request_date,
                status: record.status,
                amount: record.total_amount(),
                file_path: bill.map(|bill| bill.url.clone()),
                file_name: bill.map(|bill| bill.name.clone()),
                mime_type: bill.map(|bill| bill.mime_type.clone()),
            }
        })
        .collect()
}

/// Dashboard counters over the approver's relevant set.
pub fn approver_summary(
    records: &[ReimbursementRequest],
    identity: &VerifiedIdentity,
    matching: ApproverMatching,
) -> Result<ApproverSummary, DomainError> {
    let relevant = relevant_records(records, identity, matching)?;

    let mut summary = ApproverSummary::default();
    for record in relevant {
        if record.status.is_pending_class() {
            summary.pending_my_approval += 1;
            summary.total_amount_to_approve += record.total_amount();
        } else if record.status.is_approved_class() {
            summary.approved_by_me += 1;
        } else if record.status.is_rejected_class() {
            summary.rejected_by_me += 1;
        }
    }
    summary.total_requests_reviewed = summary.approved_by_me + summary.rejected_by_me;

    Ok(summary)
}

/// Pending-class records from the relevant set, oldest first (FIFO review).
pub fn approver_pending_queue(
    records: &[ReimbursementRequest],
    identity: &VerifiedIdentity,
    matching: ApproverMatching,
) -> Result<Vec<PendingRow>, DomainError> {
    let mut pending: Vec<&ReimbursementRequest> = relevant_records(records, identity, matching)?
        .into_iter()
        .filter(|record| record.status.is_pending_class())
        .collect();

    pending.sort_by(|left, right| {
        left.request_date
            .cmp(&right.request_date)
            .then_with(|| left.id.0.cmp(&right.id.0))
    });

    Ok(pending
        .into_iter()
        .map(|record| PendingRow {
            id: record.id.clone(),
            request_date: record.request_date,
            requester_name: record.requester_name.clone(),
            approver: record.approver.clone(),
            status: record.status,
            total_amount: record.total_amount(),
        })
        .collect())
}

fn report_row(record: &ReimbursementRequest) -> ReportRow {
    let bill = record.first_bill();
    ReportRow {
        id: record.id.clone(),
        date: record.request_date,
        amount: record.total_amount(),
        approver: record.approver.clone(),
        status: record.status,
        bill_type: record.primary_bill_type().to_string(),
        file_path: bill.map(|bill| bill.url.clone()),
        file_name: bill.map(|bill| bill.name.clone()),
        mime_type: bill.map(|bill| bill.mime_type.clone()),
    }
}

fn own_records<'a>(
    records: &'a [ReimbursementRequest],
    identity: &'a VerifiedIdentity,
) -> impl Iterator<Item = &'a ReimbursementRequest> {
    records.iter().filter(move |record| record.requester_id == identity.user_id)
}

fn visible_records<'a>(
    records: &'a [ReimbursementRequest],
    identity: &'a VerifiedIdentity,
) -> Box<dyn Iterator<Item = &'a ReimbursementRequest> + 'a> {
    match identity.role {
        Role::Requester => Box::new(own_records(records, identity)),
        Role::Approver | Role::Admin => Box::new(records.iter()),
    }
}

/// Admin sees everything. Approvers see records assigned to them by id, plus
/// legacy display-name containment matches when that mode is enabled.
fn relevant_records<'a>(
    records: &'a [ReimbursementRequest],
    identity: &VerifiedIdentity,
    matching: ApproverMatching,
) -> Result<Vec<&'a ReimbursementRequest>, DomainError> {
    identity.authorize_role(&[Role::Approver, Role::Admin])?;

    let Some(name) = identity.reviewer_name()? else {
        return Ok(records.iter().collect());
    };
    let name_lower = name.to_lowercase();

    Ok(records
        .iter()
        .filter(|record| {
            if let Some(approver_id) = &record.approver_id {
                return *approver_id == identity.user_id;
            }
            matching == ApproverMatching::Legacy
                && record.approver.to_lowercase().contains(&name_lower)
        })
        .collect())
}

fn normalized_status_filter(raw: Option<&str>) -> Option<String> {
    let value = raw?.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("all") {
        return None;
    }
    Some(value.to_string())
}

fn normalized_text(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|value| !value.is_empty()).map(str::to_string)
}

fn parse_filter_date(raw: Option<&str>) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw?.trim(), "%Y-%m-%d").ok()
}

fn matches_search(record: &ReimbursementRequest, needle_lower: &str) -> bool {
    let hit = |text: &str| text.to_lowercase().contains(needle_lower);

    hit(&record.id.0)
        || hit(&record.request_date.to_string())
        || hit(&record.requester_id.0)
        || hit(&record.requester_name)
        || hit(&record.approver)
        || hit(record.status.label())
        || hit(&record.stage)
        || hit(&record.overall_comments)
        || hit(&record.approver_comments)
        || hit(&record.bot_remarks)
        || record.attached_bills.iter().any(|bill| hit(&bill.name))
        || record.line_items.iter().any(|line| {
            hit(&line.bill_no)
                || hit(&line.vendor)
                || hit(&line.bill_type)
                || hit(&line.requester_comments)
                || hit(&line.amount.to_string())
        })
        || record.extra.values().any(|value| scalar_hit(value, needle_lower))
}

fn scalar_hit(value: &Value, needle_lower: &str) -> bool {
    match value {
        Value::String(text) => text.to_lowercase().contains(needle_lower),
        Value::Number(number) => number.to_string().contains(needle_lower),
        Value::Bool(flag) => flag.to_string().contains(needle_lower),
        Value::Null | Value::Array(_) | Value::Object(_) => false,
    }
}
