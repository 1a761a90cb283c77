use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use claimdesk_core::errors::DomainError;
use claimdesk_db::repositories::RepositoryError;

/// Boundary error type: everything the core and storage layers can raise,
/// mapped onto an HTTP status and a structured JSON body.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("caller identity could not be verified")]
    InvalidIdentity,
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    InvalidTransition(String),
    #[error("storage failure: {0}")]
    Storage(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::InvalidIdentity => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) | ApiError::InvalidTransition(_) => StatusCode::CONFLICT,
            ApiError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn request_not_found(id: &str) -> Self {
        ApiError::NotFound(format!("no reimbursement request with id `{id}`"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({ "error": self.to_string() }));
        (self.status_code(), body).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(message) => ApiError::Validation(message),
            DomainError::InvalidIdentity => ApiError::InvalidIdentity,
            DomainError::Forbidden(message) => ApiError::Forbidden(message),
            DomainError::InvalidTransition(error) => ApiError::InvalidTransition(error.to_string()),
        }
    }
}

impl From<RepositoryError> for ApiError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::Conflict(message) => ApiError::Conflict(message),
            RepositoryError::StaleVersion { id, .. } => ApiError::Conflict(format!(
                "request `{id}` was modified concurrently; reload and retry"
            )),
            RepositoryError::Database(error) => ApiError::Storage(error.to_string()),
            RepositoryError::Decode(message) => ApiError::Storage(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use claimdesk_core::domain::request::RequestStatus;
    use claimdesk_core::errors::DomainError;
    use claimdesk_core::transitions::{InvalidTransition, ReviewAction};
    use claimdesk_db::repositories::RepositoryError;

    use super::ApiError;

    #[test]
    fn domain_errors_map_to_the_documented_statuses() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (DomainError::Validation("x".into()).into(), StatusCode::BAD_REQUEST),
            (DomainError::InvalidIdentity.into(), StatusCode::UNAUTHORIZED),
            (DomainError::Forbidden("x".into()).into(), StatusCode::FORBIDDEN),
            (
                DomainError::from(InvalidTransition {
                    from: RequestStatus::Processed,
                    action: ReviewAction::Approve,
                })
                .into(),
                StatusCode::CONFLICT,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(error.status_code(), expected, "{error}");
        }
    }

    #[test]
    fn stale_version_surfaces_as_conflict() {
        let error: ApiError =
            RepositoryError::StaleVersion { id: "REQ-1".to_string(), expected: 3 }.into();
        assert_eq!(error.status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn decode_failures_surface_as_storage_errors() {
        let error: ApiError = RepositoryError::Decode("bad row".to_string()).into();
        assert_eq!(error.status_code(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
