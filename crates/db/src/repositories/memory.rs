use std::collections::HashMap;

use tokio::sync::RwLock;

use claimdesk_core::domain::request::{ReimbursementRequest, RequestId};
use claimdesk_core::domain::user::{User, UserId};

use super::{RepositoryError, RequestRepository, UserRepository};

/// Test/demo double for the SQL repositories with the same contract,
/// including the email uniqueness and optimistic-version rules.
#[derive(Default)]
pub struct InMemoryUserRepository {
    users: RwLock<HashMap<String, User>>,
}

#[async_trait::async_trait]
impl UserRepository for InMemoryUserRepository {
    async fn insert(&self, user: User) -> Result<(), RepositoryError> {
        let mut users = self.users.write().await;
        if users.values().any(|existing| existing.email == user.email) {
            return Err(RepositoryError::Conflict(format!(
                "email `{}` is already registered",
                user.email
            )));
        }
        users.insert(user.id.0.clone(), user);
        Ok(())
    }

    async fn find_by_id(&self, id: &UserId) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.get(&id.0).cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, RepositoryError> {
        let users = self.users.read().await;
        Ok(users.values().find(|user| user.email == email).cloned())
    }

    async fn list_all(&self) -> Result<Vec<User>, RepositoryError> {
        let users = self.users.read().await;
        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by(|left, right| left.created_at.cmp(&right.created_at));
        Ok(all)
    }
}

#[derive(Default)]
pub struct InMemoryRequestRepository {
    requests: RwLock<HashMap<String, ReimbursementRequest>>,
}

#[async_trait::async_trait]
impl RequestRepository for InMemoryRequestRepository {
    async fn insert(&self, request: ReimbursementRequest) -> Result<(), RepositoryError> {
        let mut requests = self.requests.write().await;
        if requests.contains_key(&request.id.0) {
            return Err(RepositoryError::Conflict(format!(
                "request `{}` already exists",
                request.id.0
            )));
        }
        requests.insert(request.id.0.clone(), request);
        Ok(())
    }

    async fn update(
        &self,
        request: ReimbursementRequest,
    ) -> Result<Option<ReimbursementRequest>, RepositoryError> {
        let mut requests = self.requests.write().await;
        let Some(stored) = requests.get(&request.id.0) else {
            return Ok(None);
        };

        if stored.version != request.version {
            return Err(RepositoryError::StaleVersion {
                id: request.id.0.clone(),
                expected: request.version,
            });
        }

        let mut next = request;
        next.version += 1;
        requests.insert(next.id.0.clone(), next.clone());
        Ok(Some(next))
    }

    async fn delete(&self, id: &RequestId) -> Result<bool, RepositoryError> {
        let mut requests = self.requests.write().await;
        Ok(requests.remove(&id.0).is_some())
    }

    async fn find_by_id(
        &self,
        id: &RequestId,
    ) -> Result<Option<ReimbursementRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        Ok(requests.get(&id.0).cloned())
    }

    async fn list_all(&self) -> Result<Vec<ReimbursementRequest>, RepositoryError> {
        let requests = self.requests.read().await;
        let mut all: Vec<ReimbursementRequest> = requests.values().cloned().collect();
        all.sort_by(|left, right| {
            left.request_date.cmp(&right.request_date).then_with(|| left.id.0.cmp(&right.id.0))
        });
        Ok(all)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, Utc};
    use serde_json::Map;

    use claimdesk_core::domain::request::{ReimbursementRequest, RequestId, RequestStatus};
    use claimdesk_core::domain::user::{Role, User, UserId};

    use super::{InMemoryRequestRepository, InMemoryUserRepository};
    use crate::repositories::{RepositoryError, RequestRepository, UserRepository};

    fn request(id: &str) -> ReimbursementRequest {
        ReimbursementRequest {
            id: RequestId(id.to_string()),
            request_date: NaiveDate::from_ymd_opt(2026, 3, 2).expect("date"),
            requester_id: UserId("u-1".to_string()),
            requester_name: "Avery Chen".to_string(),
            approver: "Jane Doe".to_string(),
            approver_id: None,
            status: RequestStatus::WaitingApproval,
            stage: "NEW".to_string(),
            line_items: Vec::new(),
            attached_bills: Vec::new(),
            overall_comments: String::new(),
            approver_comments: String::new(),
            bot_remarks: String::new(),
            version: 1,
            extra: Map::new(),
        }
    }

    #[tokio::test]
    async fn user_round_trip_and_email_conflict() {
        let repo = InMemoryUserRepository::default();
        let user = User {
            id: UserId("u-1".to_string()),
            email: "avery@example.com".to_string(),
            password_hash: "x".to_string(),
            role: Role::Requester,
            created_at: Utc::now(),
        };

        repo.insert(user.clone()).await.expect("insert");
        assert!(repo.find_by_email("avery@example.com").await.expect("find").is_some());

        let duplicate = User { id: UserId("u-2".to_string()), ..user };
        assert!(matches!(
            repo.insert(duplicate).await,
            Err(RepositoryError::Conflict(_))
        ));
    }

    #[tokio::test]
    async fn request_update_enforces_versions_like_sql() {
        let repo = InMemoryRequestRepository::default();
        repo.insert(request("REQ-1")).await.expect("insert");

        let stored = repo.update(request("REQ-1")).await.expect("update").expect("exists");
        assert_eq!(stored.version, 2);

        let error = repo.update(request("REQ-1")).await.expect_err("stale version");
        assert!(matches!(error, RepositoryError::StaleVersion { .. }));

        assert!(repo.update(request("REQ-404")).await.expect("update call").is_none());
    }

    #[tokio::test]
    async fn delete_reports_whether_a_record_was_removed() {
        let repo = InMemoryRequestRepository::default();
        repo.insert(request("REQ-1")).await.expect("insert");

        assert!(repo.delete(&RequestId("REQ-1".to_string())).await.expect("delete"));
        assert!(!repo.delete(&RequestId("REQ-1".to_string())).await.expect("delete again"));
    }
}
