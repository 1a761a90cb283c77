use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use claimdesk_core::domain::request::{ReimbursementRequest, RequestId};
use claimdesk_core::domain::user::{Role, User, UserId};
use claimdesk_core::identity::{self, VerifiedIdentity};
use claimdesk_core::lifecycle::{self, NewRequest, RequestPatch};
use claimdesk_core::reports::{self, ReportFilter};
use claimdesk_core::transitions::ReviewAction;
use claimdesk_core::DomainError;
use claimdesk_db::repositories::{RequestRepository, UserRepository};

use crate::error::ApiError;
use crate::identity::Caller;
use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/reimbursements", get(list_all).post(create))
        .route("/reimbursements/drafts", post(create_draft))
        .route("/reimbursements/reports/requester", get(requester_report_endpoint))
        .route("/reimbursements/summary/requester", get(requester_summary_endpoint))
        .route("/reimbursements/recent-activity/requester", get(recent_activity_endpoint))
        .route("/reimbursements/summary/approver", get(approver_summary_endpoint))
        .route("/reimbursements/pending-requests/approver", get(approver_queue_endpoint))
        .route(
            "/reimbursements/{id}",
            get(get_by_id).put(update_request).delete(delete_request),
        )
        .route("/reimbursements/{id}/transition", post(transition_request))
        .route("/users/signup", post(signup))
        .with_state(state)
}

async fn verify_caller(
    state: &AppState,
    caller: Caller,
) -> Result<VerifiedIdentity, ApiError> {
    let users = state.users.list_all().await?;
    identity::verify(&caller.0, &users).map_err(ApiError::from)
}

/// Dashboard reads degrade to an empty record set on storage failure so a
/// transient outage does not hard-fail the page; writes surface errors.
async fn records_or_empty(state: &AppState) -> Vec<ReimbursementRequest> {
    match state.requests.list_all().await {
        Ok(records) => records,
        Err(error) => {
            warn!(
                event_name = "reporting.storage_read_failed",
                error = %error,
                "dashboard read degraded to empty result set"
            );
            Vec::new()
        }
    }
}

// ---------------------------------------------------------------------------
// Lifecycle handlers
// ---------------------------------------------------------------------------

async fn create(
    State(state): State<AppState>,
    caller: Caller,
    Json(input): Json<NewRequest>,
) -> Result<(StatusCode, Json<ReimbursementRequest>), ApiError> {
    let identity = verify_caller(&state, caller).await?;

    let now = Utc::now();
    let record = lifecycle::build_request(
        &identity,
        input,
        lifecycle::generate_request_id(now),
        now.date_naive(),
    )?;
    state.requests.insert(record.clone()).await?;

    info!(
        event_name = "reimbursement.created",
        request_id = %record.id.0,
        requester_id = %identity.user_id.0,
        "reimbursement request created"
    );
    Ok((StatusCode::CREATED, Json(record)))
}

async fn create_draft(
    State(state): State<AppState>,
    caller: Caller,
    Json(input): Json<NewRequest>,
) -> Result<(StatusCode, Json<ReimbursementRequest>), ApiError> {
    let identity = verify_caller(&state, caller).await?;

    let now = Utc::now();
    let record = lifecycle::build_draft(
        &identity,
        input,
        lifecycle::generate_request_id(now),
        now.date_naive(),
    )?;
    state.requests.insert(record.clone()).await?;

    info!(
        event_name = "reimbursement.draft_saved",
        request_id = %record.id.0,
        requester_id = %identity.user_id.0,
        "reimbursement draft saved"
    );
    Ok((StatusCode::CREATED, Json(record)))
}

async fn list_all(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<ReimbursementRequest>>, ApiError> {
    verify_caller(&state, caller).await?;
    Ok(Json(state.requests.list_all().await?))
}

async fn get_by_id(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<ReimbursementRequest>, ApiError> {
    verify_caller(&state, caller).await?;

    let record = state
        .requests
        .find_by_id(&RequestId(id.clone()))
        .await?
        .ok_or_else(|| ApiError::request_not_found(&id))?;
    Ok(Json(record))
}

async fn update_request(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(patch): Json<RequestPatch>,
) -> Result<Json<ReimbursementRequest>, ApiError> {
    let identity = verify_caller(&state, caller).await?;

    let mut record = state
        .requests
        .find_by_id(&RequestId(id.clone()))
        .await?
        .ok_or_else(|| ApiError::request_not_found(&id))?;
    identity.authorize_mutation(&record)?;

    lifecycle::apply_update(&mut record, patch)?;
    let stored = state
        .requests
        .update(record)
        .await?
        .ok_or_else(|| ApiError::request_not_found(&id))?;

    info!(
        event_name = "reimbursement.updated",
        request_id = %stored.id.0,
        caller_id = %identity.user_id.0,
        "reimbursement request updated"
    );
    Ok(Json(stored))
}

async fn delete_request(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let identity = verify_caller(&state, caller).await?;

    let record = state
        .requests
        .find_by_id(&RequestId(id.clone()))
        .await?
        .ok_or_else(|| ApiError::request_not_found(&id))?;
    identity.authorize_mutation(&record)?;

    if !state.requests.delete(&record.id).await? {
        return Err(ApiError::request_not_found(&id));
    }

    info!(
        event_name = "reimbursement.deleted",
        request_id = %id,
        caller_id = %identity.user_id.0,
        "reimbursement request deleted"
    );
    Ok(Json(serde_json::json!({ "deleted": id })))
}

#[derive(Debug, Deserialize)]
pub struct TransitionRequest {
    pub action: ReviewAction,
    #[serde(default)]
    pub comments: Option<String>,
}

async fn transition_request(
    State(state): State<AppState>,
    caller: Caller,
    Path(id): Path<String>,
    Json(payload): Json<TransitionRequest>,
) -> Result<Json<ReimbursementRequest>, ApiError> {
    let identity = verify_caller(&state, caller).await?;

    let mut record = state
        .requests
        .find_by_id(&RequestId(id.clone()))
        .await?
        .ok_or_else(|| ApiError::request_not_found(&id))?;

    // Owners may submit their own drafts; review decisions stay with
    // approvers and admins.
    match payload.action {
        ReviewAction::Submit => identity.authorize_mutation(&record)?,
        _ => identity.authorize_role(&[Role::Approver, Role::Admin])?,
    }

    record.apply_action(payload.action).map_err(DomainError::from)?;
    if let Some(comments) = payload.comments {
        record.approver_comments = comments;
    }

    let stored = state
        .requests
        .update(record)
        .await?
        .ok_or_else(|| ApiError::request_not_found(&id))?;

    info!(
        event_name = "reimbursement.transitioned",
        request_id = %stored.id.0,
        caller_id = %identity.user_id.0,
        status = stored.status.label(),
        "reimbursement request transitioned"
    );
    Ok(Json(stored))
}

// ---------------------------------------------------------------------------
// Reporting handlers
// ---------------------------------------------------------------------------

async fn requester_report_endpoint(
    State(state): State<AppState>,
    caller: Caller,
    Query(filter): Query<ReportFilter>,
) -> Result<Json<Vec<reports::ReportRow>>, ApiError> {
    let identity = verify_caller(&state, caller).await?;
    let records = records_or_empty(&state).await;
    Ok(Json(reports::requester_report(&records, &identity, &filter)))
}

async fn requester_summary_endpoint(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<reports::RequesterSummary>, ApiError> {
    let identity = verify_caller(&state, caller).await?;
    let records = records_or_empty(&state).await;
    Ok(Json(reports::requester_summary(&records, &identity)))
}

async fn recent_activity_endpoint(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<reports::ActivityRow>>, ApiError> {
    let identity = verify_caller(&state, caller).await?;
    let records = records_or_empty(&state).await;
    Ok(Json(reports::recent_activity(&records, &identity, state.recent_activity_limit)))
}

async fn approver_summary_endpoint(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<reports::ApproverSummary>, ApiError> {
    let identity = verify_caller(&state, caller).await?;
    let records = records_or_empty(&state).await;
    let summary = reports::approver_summary(&records, &identity, state.matching)?;
    Ok(Json(summary))
}

async fn approver_queue_endpoint(
    State(state): State<AppState>,
    caller: Caller,
) -> Result<Json<Vec<reports::PendingRow>>, ApiError> {
    let identity = verify_caller(&state, caller).await?;
    let records = records_or_empty(&state).await;
    let queue = reports::approver_pending_queue(&records, &identity, state.matching)?;
    Ok(Json(queue))
}

// ---------------------------------------------------------------------------
// Signup
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
    pub role: Role,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupResponse {
    pub id: UserId,
    pub email: String,
    pub role: Role,
}

async fn signup(
    State(state): State<AppState>,
    Json(payload): Json<SignupRequest>,
) -> Result<(StatusCode, Json<SignupResponse>), ApiError> {
    let email = payload.email.trim().to_string();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::Validation("a valid email address is required".to_string()));
    }
    if payload.password.trim().is_empty() {
        return Err(ApiError::Validation("a password is required".to_string()));
    }

    let password = SecretString::from(payload.password);
    let user = User {
        id: identity::generate_user_id(Utc::now()),
        email: email.clone(),
        password_hash: identity::hash_password(&password),
        role: payload.role,
        created_at: Utc::now(),
    };

    state.users.insert(user.clone()).await?;

    info!(
        event_name = "user.signed_up",
        user_id = %user.id.0,
        role = user.role.label(),
        "user registered"
    );
    Ok((StatusCode::CREATED, Json(SignupResponse { id: user.id, email, role: user.role })))
}
