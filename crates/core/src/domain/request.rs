use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::user::UserId;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub String);

/// Fallback bill type reported when a request carries no typed line item.
pub const MISCELLANEOUS_BILL_TYPE: &str = "Miscellaneous";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    Draft,
    #[serde(rename = "WAITING_APPROVAL")]
    WaitingApproval,
    #[serde(rename = "STAGE_1_APPROVED")]
    Stage1Approved,
    #[serde(rename = "STAGE_1_REJECTED")]
    Stage1Rejected,
    #[serde(rename = "STAGE_2_APPROVED")]
    Stage2Approved,
    #[serde(rename = "STAGE_2_REJECTED")]
    Stage2Rejected,
    #[serde(rename = "PROCESSED")]
    Processed,
    #[serde(rename = "ERROR")]
    Error,
}

impl RequestStatus {
    pub const fn label(self) -> &'static str {
        match self {
            RequestStatus::Draft => "Draft",
            RequestStatus::WaitingApproval => "WAITING_APPROVAL",
            RequestStatus::Stage1Approved => "STAGE_1_APPROVED",
            RequestStatus::Stage1Rejected => "STAGE_1_REJECTED",
            RequestStatus::Stage2Approved => "STAGE_2_APPROVED",
            RequestStatus::Stage2Rejected => "STAGE_2_REJECTED",
            RequestStatus::Processed => "PROCESSED",
            RequestStatus::Error => "ERROR",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        let all = [
            Self::Draft,
            Self::WaitingApproval,
            Self::Stage1Approved,
            Self::Stage1Rejected,
            Self::Stage2Approved,
            Self::Stage2Rejected,
            Self::Processed,
            Self::Error,
        ];
        all.into_iter().find(|status| status.label().eq_ignore_ascii_case(raw.trim()))
    }

    pub const fn is_pending_class(self) -> bool {
        matches!(self, RequestStatus::WaitingApproval)
    }

    pub const fn is_approved_class(self) -> bool {
        matches!(
            self,
            RequestStatus::Stage1Approved | RequestStatus::Stage2Approved | RequestStatus::Processed
        )
    }

    pub const fn is_rejected_class(self) -> bool {
        matches!(
            self,
            RequestStatus::Stage1Rejected | RequestStatus::Stage2Rejected | RequestStatus::Error
        )
    }

    /// No transition is defined out of a terminal status.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            RequestStatus::Stage1Rejected
                | RequestStatus::Stage2Rejected
                | RequestStatus::Processed
                | RequestStatus::Error
        )
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    #[serde(default)]
    pub bill_no: String,
    #[serde(default)]
    pub vendor: String,
    #[serde(default)]
    pub bill_type: String,
    #[serde(deserialize_with = "amount::deserialize")]
    pub amount: Decimal,
    #[serde(default)]
    pub requester_comments: String,
}

/// Line-item amounts arrive from the wire either as a decimal string or as a
/// bare JSON number; both must resolve to a non-negative decimal.
mod amount {
    use rust_decimal::Decimal;
    use serde::{de, Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Text(String),
            Number(f64),
        }

        let value = match Raw::deserialize(deserializer)? {
            Raw::Text(text) => text
                .trim()
                .parse::<Decimal>()
                .map_err(|_| de::Error::custom(format!("`{text}` is not a decimal amount")))?,
            Raw::Number(number) => Decimal::try_from(number)
                .map_err(|_| de::Error::custom(format!("{number} is not a decimal amount")))?,
        };

        if value.is_sign_negative() {
            return Err(de::Error::custom("line item amount must be non-negative"));
        }

        Ok(value)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachedBill {
    pub name: String,
    pub url: String,
    #[serde(rename = "type", default)]
    pub mime_type: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReimbursementRequest {
    pub id: RequestId,
    pub request_date: NaiveDate,
    pub requester_id: UserId,
    pub requester_name: String,
    #[serde(default)]
    pub approver: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub approver_id: Option<UserId>,
    pub status: RequestStatus,
    #[serde(default)]
    pub stage: String,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
    #[serde(default)]
    pub attached_bills: Vec<AttachedBill>,
    #[serde(default)]
    pub overall_comments: String,
    #[serde(default)]
    pub approver_comments: String,
    #[serde(default)]
    pub bot_remarks: String,
    #[serde(default = "initial_version")]
    pub version: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn initial_version() -> i64 {
    1
}

impl ReimbursementRequest {
    /// Total requested amount, computed on demand from the line items and
    /// never stored alongside the record.
    pub fn total_amount(&self) -> Decimal {
        self.line_items.iter().map(|line| line.amount).sum()
    }

    pub fn first_bill(&self) -> Option<&AttachedBill> {
        self.attached_bills.first()
    }

    pub fn primary_bill_type(&self) -> &str {
        self.line_items
            .first()
            .map(|line| line.bill_type.as_str())
            .filter(|bill_type| !bill_type.is_empty())
            .unwrap_or(MISCELLANEOUS_BILL_TYPE)
    }
}
