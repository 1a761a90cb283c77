use std::collections::HashMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sqlx::{Row, Sqlite, Transaction};

use claimdesk_core::domain::request::{
    AttachedBill, LineItem, ReimbursementRequest, RequestId, RequestStatus,
};
use claimdesk_core::domain::user::UserId;

use super::{RepositoryError, RequestRepository};
use crate::DbPool;

pub struct SqlRequestRepository {
    pool: DbPool,
}

impl SqlRequestRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

const REQUEST_COLUMNS: &str = "id, request_date, requester_id, requester_name, approver, \
     approver_id, status, stage, overall_comments, approver_comments, bot_remarks, \
     extra_fields, version";

fn decode<T>(result: Result<T, sqlx::Error>) -> Result<T, RepositoryError> {
    result.map_err(|e| RepositoryError::Decode(e.to_string()))
}

fn row_to_request(row: &sqlx::sqlite::SqliteRow) -> Result<ReimbursementRequest, RepositoryError> {
    let id: String = decode(row.try_get("id"))?;
    let request_date_str: String = decode(row.try_get("request_date"))?;
    let requester_id: String = decode(row.try_get("requester_id"))?;
    let requester_name: String = decode(row.try_get("requester_name"))?;
    let approver: String = decode(row.try_get("approver"))?;
    let approver_id: Option<String> = decode(row.try_get("approver_id"))?;
    let status_str: String = decode(row.try_get("status"))?;
    let stage: String = decode(row.try_get("stage"))?;
    let overall_comments: String = decode(row.try_get("overall_comments"))?;
    let approver_comments: String = decode(row.try_get("approver_comments"))?;
    let bot_remarks: String = decode(row.try_get("bot_remarks"))?;
    let extra_raw: String = decode(row.try_get("extra_fields"))?;
    let version: i64 = decode(row.try_get("version"))?;

    let request_date = request_date_str
        .parse::<NaiveDate>()
        .map_err(|e| RepositoryError::Decode(format!("bad request_date: {e}")))?;
    let status = RequestStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown stored status `{status_str}`")))?;
    let extra = serde_json::from_str(&extra_raw)
        .map_err(|e| RepositoryError::Decode(format!("bad extra_fields json: {e}")))?;

    Ok(ReimbursementRequest {
        id: RequestId(id),
        request_date,
        requester_id: UserId(requester_id),
        requester_name,
        approver,
        approver_id: approver_id.map(UserId),
        status,
        stage,
        line_items: Vec::new(),
        attached_bills: Vec::new(),
        overall_comments,
        approver_comments,
        bot_remarks,
        version,
        extra,
    })
}

fn row_to_line_item(row: &sqlx::sqlite::SqliteRow) -> Result<(String, LineItem), RepositoryError> {
    let request_id: String = decode(row.try_get("request_id"))?;
    let amount_str: String = decode(row.try_get("amount"))?;
    let amount = amount_str
        .parse::<Decimal>()
        .map_err(|_| RepositoryError::Decode(format!("bad stored amount `{amount_str}`")))?;

    Ok((
        request_id,
        LineItem {
            bill_no: decode(row.try_get("bill_no"))?,
            vendor: decode(row.try_get("vendor"))?,
            bill_type: decode(row.try_get("bill_type"))?,
            amount,
            requester_comments: decode(row.try_get("requester_comments"))?,
        },
    ))
}

fn row_to_attached_bill(
    row: &sqlx::sqlite::SqliteRow,
) -> Result<(String, AttachedBill), RepositoryError> {
    let request_id: String = decode(row.try_get("request_id"))?;
    Ok((
        request_id,
        AttachedBill {
            name: decode(row.try_get("name"))?,
            url: decode(row.try_get("url"))?,
            mime_type: decode(row.try_get("mime_type"))?,
        },
    ))
}

impl SqlRequestRepository {
    /// Attach line items and bills to already-decoded request rows in one
    /// pass per child table instead of one query per request.
    async fn attach_children(
        &self,
        requests: &mut [ReimbursementRequest],
    ) -> Result<(), RepositoryError> {
        if requests.is_empty() {
            return Ok(());
        }

        let mut lines_by_request: HashMap<String, Vec<LineItem>> = HashMap::new();
        let line_rows = sqlx::query(
            "SELECT request_id, bill_no, vendor, bill_type, amount, requester_comments
             FROM line_item ORDER BY request_id, position",
        )
        .fetch_all(&self.pool)
        .await?;
        for row in &line_rows {
            let (request_id, line) = row_to_line_item(row)?;
            lines_by_request.entry(request_id).or_default().push(line);
        }

        let mut bills_by_request: HashMap<String, Vec<AttachedBill>> = HashMap::new();
        let bill_rows = sqlx::query(
            "SELECT request_id, name, url, mime_type
             FROM attached_bill ORDER BY request_id, position",
        )
        .fetch_all(&self.pool)
        .await?;
        for row in &bill_rows {
            let (request_id, bill) = row_to_attached_bill(row)?;
            bills_by_request.entry(request_id).or_default().push(bill);
        }

        for request in requests.iter_mut() {
            if let Some(lines) = lines_by_request.remove(&request.id.0) {
                request.line_items = lines;
            }
            if let Some(bills) = bills_by_request.remove(&request.id.0) {
                request.attached_bills = bills;
            }
        }

        Ok(())
    }
}

async fn write_children(
    tx: &mut Transaction<'_, Sqlite>,
    request: &ReimbursementRequest,
) -> Result<(), RepositoryError> {
    for (position, line) in request.line_items.iter().enumerate() {
        sqlx::query(
            "INSERT INTO line_item (request_id, position, bill_no, vendor, bill_type, amount,
                                    requester_comments)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.id.0)
        .bind(position as i64)
        .bind(&line.bill_no)
        .bind(&line.vendor)
        .bind(&line.bill_type)
        .bind(line.amount.to_string())
        .bind(&line.requester_comments)
        .execute(&mut **tx)
        .await?;
    }

    for (position, bill) in request.attached_bills.iter().enumerate() {
        sqlx::query(
            "INSERT INTO attached_bill (request_id, position, name, url, mime_type)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&request.id.0)
        .bind(position as i64)
        .bind(&bill.name)
        .bind(&bill.url)
        .bind(&bill.mime_type)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

fn extra_json(request: &ReimbursementRequest) -> Result<String, RepositoryError> {
    serde_json::to_string(&request.extra)
        .map_err(|e| RepositoryError::Decode(format!("extra_fields not serializable: {e}")))
}

#[async_trait::async_trait]
impl RequestRepository for SqlRequestRepository {
    async fn insert(&self, request: ReimbursementRequest) -> Result<(), RepositoryError> {
        let extra = extra_json(&request)?;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "INSERT INTO reimbursement_request
                 (id, request_date, requester_id, requester_name, approver, approver_id,
                  status, stage, overall_comments, approver_comments, bot_remarks,
                  extra_fields, version)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&request.id.0)
        .bind(request.request_date.to_string())
        .bind(&request.requester_id.0)
        .bind(&request.requester_name)
        .bind(&request.approver)
        .bind(request.approver_id.as_ref().map(|id| id.0.clone()))
        .bind(request.status.label())
        .bind(&request.stage)
        .bind(&request.overall_comments)
        .bind(&request.approver_comments)
        .bind(&request.bot_remarks)
        .bind(&extra)
        .bind(request.version)
        .execute(&mut *tx)
        .await;

        match result {
            Ok(_) => {}
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                return Err(RepositoryError::Conflict(format!(
                    "request `{}` already exists",
                    request.id.0
                )));
            }
            Err(error) => return Err(error.into()),
        }

        write_children(&mut tx, &request).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn update(
        &self,
        request: ReimbursementRequest,
    ) -> Result<Option<ReimbursementRequest>, RepositoryError> {
        let extra = extra_json(&request)?;
        let mut tx = self.pool.begin().await?;

        let affected = sqlx::query(
            "UPDATE reimbursement_request
             SET approver = ?, approver_id = ?, status = ?, stage = ?,
                 overall_comments = ?, approver_comments = ?, bot_remarks = ?,
                 extra_fields = ?, version = version + 1
             WHERE id = ? AND version = ?",
        )
        .bind(&request.approver)
        .bind(request.approver_id.as_ref().map(|id| id.0.clone()))
        .bind(request.status.label())
        .bind(&request.stage)
        .bind(&request.overall_comments)
        .bind(&request.approver_comments)
        .bind(&request.bot_remarks)
        .bind(&extra)
        .bind(&request.id.0)
        .bind(request.version)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if affected == 0 {
            let current: Option<i64> =
                sqlx::query_scalar("SELECT version FROM reimbursement_request WHERE id = ?")
                    .bind(&request.id.0)
                    .fetch_optional(&mut *tx)
                    .await?;

            return match current {
                None => Ok(None),
                Some(_) => Err(RepositoryError::StaleVersion {
                    id: request.id.0.clone(),
                    expected: request.version,
                }),
            };
        }

        sqlx::query("DELETE FROM line_item WHERE request_id = ?")
            .bind(&request.id.0)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM attached_bill WHERE request_id = ?")
            .bind(&request.id.0)
            .execute(&mut *tx)
            .await?;
        write_children(&mut tx, &request).await?;

        tx.commit().await?;

        let mut stored = request;
        stored.version += 1;
        Ok(Some(stored))
    }

    async fn delete(&self, id: &RequestId) -> Result<bool, RepositoryError> {
        let affected = sqlx::query("DELETE FROM reimbursement_request WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(affected > 0)
    }

    async fn find_by_id(
        &self,
        id: &RequestId,
    ) -> Result<Option<ReimbursementRequest>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM reimbursement_request WHERE id = ?"
        ))
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await?;

        let Some(ref row) = row else {
            return Ok(None);
        };

        let mut request = row_to_request(row)?;

        let line_rows = sqlx::query(
            "SELECT request_id, bill_no, vendor, bill_type, amount, requester_comments
             FROM line_item WHERE request_id = ? ORDER BY position",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;
        for row in &line_rows {
            request.line_items.push(row_to_line_item(row)?.1);
        }

        let bill_rows = sqlx::query(
            "SELECT request_id, name, url, mime_type
             FROM attached_bill WHERE request_id = ? ORDER BY position",
        )
        .bind(&id.0)
        .fetch_all(&self.pool)
        .await?;
        for row in &bill_rows {
            request.attached_bills.push(row_to_attached_bill(row)?.1);
        }

        Ok(Some(request))
    }

    async fn list_all(&self) -> Result<Vec<ReimbursementRequest>, RepositoryError> {
        let rows = sqlx::query(&format!(
            "SELECT {REQUEST_COLUMNS} FROM reimbursement_request ORDER BY request_date, id"
        ))
        .fetch_all(&self.pool)
        .await?;

        let mut requests =
            rows.iter().map(row_to_request).collect::<Result<Vec<_>, _>>()?;
        self.attach_children(&mut requests).await?;
        Ok(requests)
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use serde_json::json;

    use claimdesk_core::domain::request::{
        AttachedBill, LineItem, ReimbursementRequest, RequestId, RequestStatus,
    };
    use claimdesk_core::domain::user::UserId;

    use super::SqlRequestRepository;
    use crate::repositories::{RepositoryError, RequestRepository};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> SqlRequestRepository {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        SqlRequestRepository::new(pool)
    }

    fn sample_request(id: &str) -> ReimbursementRequest {
        let mut extra = serde_json::Map::new();
        extra.insert("costCenter".to_string(), json!("CC-204"));

        ReimbursementRequest {
            id: RequestId(id.to_string()),
            request_date: NaiveDate::from_ymd_opt(2026, 3, 2).expect("date"),
            requester_id: UserId("u-1".to_string()),
            requester_name: "Avery Chen".to_string(),
            approver: "Jane Doe".to_string(),
            approver_id: None,
            status: RequestStatus::WaitingApproval,
            stage: "NEW".to_string(),
            line_items: vec![
                LineItem {
                    bill_no: "B-1".to_string(),
                    vendor: "Acme Travel".to_string(),
                    bill_type: "Travel".to_string(),
                    amount: "100.50".parse().expect("decimal"),
                    requester_comments: "flight".to_string(),
                },
                LineItem {
                    bill_no: "B-2".to_string(),
                    vendor: "Hotel Co".to_string(),
                    bill_type: "Lodging".to_string(),
                    amount: "49.50".parse().expect("decimal"),
                    requester_comments: String::new(),
                },
            ],
            attached_bills: vec![AttachedBill {
                name: "receipt.pdf".to_string(),
                url: "/uploads/receipt.pdf".to_string(),
                mime_type: "application/pdf".to_string(),
            }],
            overall_comments: "conference trip".to_string(),
            approver_comments: String::new(),
            bot_remarks: String::new(),
            version: 1,
            extra,
        }
    }

    #[tokio::test]
    async fn insert_and_find_round_trip_preserves_children_and_extras() {
        let repo = setup().await;
        let request = sample_request("REQ-1");

        repo.insert(request.clone()).await.expect("insert");
        let found =
            repo.find_by_id(&request.id).await.expect("find").expect("request should exist");

        assert_eq!(found.line_items.len(), 2);
        assert_eq!(found.line_items[0].bill_no, "B-1", "line item order is preserved");
        assert_eq!(found.total_amount(), Decimal::new(15_000, 2));
        assert_eq!(found.attached_bills[0].name, "receipt.pdf");
        assert_eq!(found.extra.get("costCenter"), Some(&json!("CC-204")));
        assert_eq!(found.version, 1);
    }

    #[tokio::test]
    async fn update_bumps_the_version() {
        let repo = setup().await;
        repo.insert(sample_request("REQ-1")).await.expect("insert");

        let mut changed = repo.find_by_id(&RequestId("REQ-1".to_string())).await.expect("find")
            .expect("exists");
        changed.overall_comments = "amended".to_string();

        let stored = repo.update(changed).await.expect("update").expect("row exists");
        assert_eq!(stored.version, 2);

        let reread = repo
            .find_by_id(&RequestId("REQ-1".to_string()))
            .await
            .expect("find")
            .expect("exists");
        assert_eq!(reread.overall_comments, "amended");
        assert_eq!(reread.version, 2);
    }

    #[tokio::test]
    async fn stale_writers_get_a_version_conflict() {
        let repo = setup().await;
        repo.insert(sample_request("REQ-1")).await.expect("insert");

        let first = repo.find_by_id(&RequestId("REQ-1".to_string())).await.expect("find")
            .expect("exists");
        let second = first.clone();

        repo.update(first).await.expect("first writer wins").expect("row exists");
        let error = repo.update(second).await.expect_err("second writer is stale");
        assert!(matches!(error, RepositoryError::StaleVersion { .. }));
    }

    #[tokio::test]
    async fn updating_a_missing_request_reports_absence() {
        let repo = setup().await;
        let outcome = repo.update(sample_request("REQ-GONE")).await.expect("update call");
        assert!(outcome.is_none());
    }

    #[tokio::test]
    async fn delete_removes_the_row_and_children() {
        let repo = setup().await;
        repo.insert(sample_request("REQ-1")).await.expect("insert");

        assert!(repo.delete(&RequestId("REQ-1".to_string())).await.expect("delete"));
        assert!(!repo.delete(&RequestId("REQ-1".to_string())).await.expect("second delete"));
        assert!(repo
            .find_by_id(&RequestId("REQ-1".to_string()))
            .await
            .expect("find")
            .is_none());
    }

    #[tokio::test]
    async fn duplicate_ids_conflict() {
        let repo = setup().await;
        repo.insert(sample_request("REQ-1")).await.expect("insert");
        let error = repo.insert(sample_request("REQ-1")).await.expect_err("duplicate id");
        assert!(matches!(error, RepositoryError::Conflict(_)));
    }

    #[tokio::test]
    async fn list_all_orders_by_request_date() {
        let repo = setup().await;
        let mut newer = sample_request("REQ-2");
        newer.request_date = NaiveDate::from_ymd_opt(2026, 3, 9).expect("date");
        repo.insert(newer).await.expect("insert newer");
        repo.insert(sample_request("REQ-1")).await.expect("insert older");

        let all = repo.list_all().await.expect("list");
        let ids: Vec<&str> = all.iter().map(|request| request.id.0.as_str()).collect();
        assert_eq!(ids, ["REQ-1", "REQ-2"]);
    }
}
