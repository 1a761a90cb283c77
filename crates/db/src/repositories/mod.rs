use async_trait::async_trait;
use thiserror::Error;

use claimdesk_core::domain::request::{ReimbursementRequest, RequestId};
use claimdesk_core::domain::user::{User, UserId};

pub mod memory;
pub mod request;
pub mod user;

pub use memory::{InMemoryRequestRepository, InMemoryUserRepository};
pub use request::SqlRequestRepository;
pub use user::SqlUserRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("conflict: {0}")]
    Conflict(String),
    /// The caller read an older version of the record than the one on disk;
    /// a concurrent writer got there first.
    #[error("stale version for request `{id}`: expected {expected}")]
    StaleVersion { id: String, expected: i64 },
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Fails with `Conflict` when the email is already registered.
    async fn insert(&self, user: User) -> Result<(), RepositoryError>;
    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError>;
    async fn list_all(&self) -> Result<Vec<User>, RepositoryError>;
}

#[async_trait]
pub trait RequestRepository: Send + Sync {
    async fn insert(&self, request: ReimbursementRequest) -> Result<(), RepositoryError>;

    /// Persists `request` if the stored row still carries `request.version`,
    /// bumping the version by one. Returns the stored record, `Ok(None)` when
    /// the id does not exist, and `StaleVersion` when a concurrent writer
    /// already moved the row on.
    async fn update(
        &self,
        request: ReimbursementRequest,
    ) -> Result<Option<ReimbursementRequest>, RepositoryError>;

    /// Hard delete. Returns whether a row was removed.
    async fn delete(&self, id: &RequestId) -> Result<bool, RepositoryError>;

    async fn find_by_id(
        &self,
        id: &RequestId,
    ) -> Result<Option<ReimbursementRequest>, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<ReimbursementRequest>, RepositoryError>;
}
