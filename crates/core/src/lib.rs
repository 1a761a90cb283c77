pub mod config;
pub mod domain;
pub mod errors;
pub mod identity;
pub mod lifecycle;
pub mod reports;
pub mod transitions;

pub use domain::request::{
    AttachedBill, LineItem, ReimbursementRequest, RequestId, RequestStatus,
};
pub use domain::user::{Role, User, UserId};
pub use errors::DomainError;
pub use identity::{CallerClaims, VerifiedIdentity};
pub use reports::{ApproverMatching, ReportFilter};
pub use transitions::{InvalidTransition, ReviewAction};
