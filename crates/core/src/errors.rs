use thiserror::Error;

use crate::transitions::InvalidTransition;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    InvalidTransition(#[from] InvalidTransition),
    #[error("caller identity does not match any registered user")]
    InvalidIdentity,
    #[error("forbidden: {0}")]
    Forbidden(String),
}
