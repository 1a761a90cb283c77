use sqlx::Executor;

use crate::connection::DbPool;
use crate::repositories::RepositoryError;

const SEED_USER_IDS: &[&str] =
    &["user-demo-requester", "user-demo-approver", "user-demo-admin"];

const SEED_REQUEST_IDS: &[&str] =
    &["req-demo-001", "req-demo-002", "req-demo-003", "req-demo-004"];

/// Deterministic demo dataset: one user per role and four requests spanning
/// the pending / approved / rejected / draft buckets.
pub struct DemoSeedDataset;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedResult {
    pub users_seeded: usize,
    pub requests_seeded: usize,
}

#[derive(Clone, Debug)]
pub struct SeedCheck {
    pub name: &'static str,
    pub passed: bool,
    pub details: String,
}

#[derive(Clone, Debug)]
pub struct VerificationResult {
    pub checks: Vec<SeedCheck>,
}

impl VerificationResult {
    pub fn passed(&self) -> bool {
        self.checks.iter().all(|check| check.passed)
    }
}

impl DemoSeedDataset {
    pub const SQL: &'static str = include_str!("../../../config/fixtures/demo_seed.sql");

    /// Load the demo dataset in a single transaction.
    pub async fn load(pool: &DbPool) -> Result<SeedResult, RepositoryError> {
        let mut tx = pool.begin().await?;
        tx.execute(sqlx::query(Self::SQL)).await?;
        tx.commit().await?;

        Ok(SeedResult {
            users_seeded: SEED_USER_IDS.len(),
            requests_seeded: SEED_REQUEST_IDS.len(),
        })
    }

    /// Check that the seeded rows match the fixture contract.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, RepositoryError> {
        let mut checks = Vec::new();

        let user_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM app_user WHERE id IN (?, ?, ?)")
            .bind(SEED_USER_IDS[0])
            .bind(SEED_USER_IDS[1])
            .bind(SEED_USER_IDS[2])
            .fetch_one(pool)
            .await?;
        checks.push(SeedCheck {
            name: "seed_users_present",
            passed: user_count as usize == SEED_USER_IDS.len(),
            details: format!("{user_count} of {} demo users found", SEED_USER_IDS.len()),
        });

        let request_count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM reimbursement_request WHERE id LIKE 'req-demo-%'")
                .fetch_one(pool)
                .await?;
        checks.push(SeedCheck {
            name: "seed_requests_present",
            passed: request_count as usize == SEED_REQUEST_IDS.len(),
            details: format!("{request_count} of {} demo requests found", SEED_REQUEST_IDS.len()),
        });

        let pending_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM reimbursement_request
             WHERE id LIKE 'req-demo-%' AND status = 'WAITING_APPROVAL'",
        )
        .fetch_one(pool)
        .await?;
        checks.push(SeedCheck {
            name: "seed_pending_request_present",
            passed: pending_count == 1,
            details: format!("{pending_count} pending demo request(s)"),
        });

        let line_count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM line_item WHERE request_id = 'req-demo-001'",
        )
        .fetch_one(pool)
        .await?;
        checks.push(SeedCheck {
            name: "seed_line_items_present",
            passed: line_count == 2,
            details: format!("req-demo-001 carries {line_count} line item(s)"),
        });

        Ok(VerificationResult { checks })
    }
}
