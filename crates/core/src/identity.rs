use secrecy::{ExposeSecret, SecretString};
use sha2::{Digest, Sha256};

use crate::domain::request::ReimbursementRequest;
use crate::domain::user::{Role, User, UserId};
use crate::errors::DomainError;

/// Identity a caller claims to hold. At the HTTP boundary these come from
/// headers; the gate verifies them against the user set before any core
/// operation runs. Core code only ever sees the verified form.
#[derive(Clone, Debug, PartialEq)]
pub struct CallerClaims {
    pub user_id: UserId,
    pub role: Role,
    pub display_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VerifiedIdentity {
    pub user_id: UserId,
    pub role: Role,
    pub display_name: Option<String>,
}

/// Both the id and the claimed role must match a registered user exactly.
pub fn verify(claims: &CallerClaims, users: &[User]) -> Result<VerifiedIdentity, DomainError> {
    let matched =
        users.iter().any(|user| user.id == claims.user_id && user.role == claims.role);
    if !matched {
        return Err(DomainError::InvalidIdentity);
    }

    Ok(VerifiedIdentity {
        user_id: claims.user_id.clone(),
        role: claims.role,
        display_name: claims.display_name.clone(),
    })
}

impl VerifiedIdentity {
    pub fn authorize_role(&self, allowed: &[Role]) -> Result<(), DomainError> {
        if allowed.contains(&self.role) {
            return Ok(());
        }

        Err(DomainError::Forbidden(format!(
            "role {} is not permitted for this operation",
            self.role.label()
        )))
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    pub fn owns(&self, record: &ReimbursementRequest) -> bool {
        self.user_id == record.requester_id
    }

    /// Approver-scoped reporting needs a display name to match against; Admin
    /// bypasses the requirement and sees the unfiltered set.
    pub fn reviewer_name(&self) -> Result<Option<&str>, DomainError> {
        if self.is_admin() {
            return Ok(None);
        }

        match self.display_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(Some(name)),
            _ => Err(DomainError::Forbidden(
                "approver display name is required for this operation".to_string(),
            )),
        }
    }

    /// Mutation rule for update/delete: the caller must own the record or
    /// hold the Approver or Admin role.
    pub fn authorize_mutation(&self, record: &ReimbursementRequest) -> Result<(), DomainError> {
        if self.owns(record) || matches!(self.role, Role::Approver | Role::Admin) {
            return Ok(());
        }

        Err(DomainError::Forbidden(
            "only the requester, an approver, or an admin may modify this request".to_string(),
        ))
    }
}

/// Passwords are digested before they reach storage; the plaintext lives in a
/// `SecretString` so it is never logged or debug-printed.
pub fn hash_password(password: &SecretString) -> String {
    let digest = Sha256::digest(password.expose_secret().as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Same time-token scheme as request ids, with a `user-` prefix.
pub fn generate_user_id(now: chrono::DateTime<chrono::Utc>) -> UserId {
    use rand::Rng;
    let suffix: u32 = rand::thread_rng().gen();
    UserId(format!("user-{}-{suffix:08x}", now.timestamp_millis()))
}
