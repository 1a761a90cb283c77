use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use claimdesk_core::domain::user::{Role, UserId};
use claimdesk_core::identity::CallerClaims;

use crate::error::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";
pub const USER_NAME_HEADER: &str = "x-user-name";

/// Claimed caller identity lifted off the request headers. This is only a
/// claim: handlers must pass it through the identity gate before any core
/// operation sees it.
pub struct Caller(pub CallerClaims);

impl<S> FromRequestParts<S> for Caller
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = required_header(parts, USER_ID_HEADER)?;
        let role_raw = required_header(parts, USER_ROLE_HEADER)?;
        let role: Role = role_raw.parse().map_err(|_| ApiError::InvalidIdentity)?;

        let display_name = parts
            .headers
            .get(USER_NAME_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        Ok(Caller(CallerClaims { user_id: UserId(user_id), role, display_name }))
    }
}

fn required_header(parts: &Parts, name: &str) -> Result<String, ApiError> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .ok_or(ApiError::InvalidIdentity)
}
