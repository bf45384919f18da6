use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    core::{enums::SubmissionStatus, error::AppError},
    dtos::{
        audit::AuditQuery,
        auth::Claims,
        response::ApiResponse,
        submission::{ReviewRequest, SubmissionListQuery},
        user::UpdateStatusRequest,
        PageQuery,
    },
    extractors::client_ip::ClientIp,
    rate_limit,
    services::{
        admin as AdminService,
        audit::{self as AuditService, AuditContext},
        submission as SubmissionService,
    },
    state::AppState,
    utils::limiter::actor_key,
};

pub async fn list_submissions(
    State(state): State<AppState>,
    Query(query): Query<SubmissionListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = SubmissionService::list_for_review(&*state.db, query).await?;
    Ok(ApiResponse::with_data(page))
}

async fn review(
    claims: Claims,
    ip: ClientIp,
    state: AppState,
    submission_id: Uuid,
    decision: SubmissionStatus,
    payload: Option<ReviewRequest>,
) -> Result<impl IntoResponse, AppError> {
    rate_limit!(state.limiter, "admin:write", &actor_key(Some(&claims.sub), &ip.0), 60);

    let payload = payload.unwrap_or_default();
    payload.validate()?;

    let admin_id = claims.user_id()?;
    let ctx = AuditContext::new(Some(admin_id), &ip);
    let submission =
        SubmissionService::review(&state.db, admin_id, submission_id, decision, payload.note, &ctx).await?;
    Ok(ApiResponse::with_data(submission))
}

pub async fn approve_submission(
    claims: Claims,
    ip: ClientIp,
    State(state): State<AppState>,
    Path(submission_id): Path<Uuid>,
    payload: Option<Json<ReviewRequest>>,
) -> Result<impl IntoResponse, AppError> {
    review(claims, ip, state, submission_id, SubmissionStatus::Approved, payload.map(|Json(p)| p)).await
}

pub async fn reject_submission(
    claims: Claims,
    ip: ClientIp,
    State(state): State<AppState>,
    Path(submission_id): Path<Uuid>,
    payload: Option<Json<ReviewRequest>>,
) -> Result<impl IntoResponse, AppError> {
    review(claims, ip, state, submission_id, SubmissionStatus::Rejected, payload.map(|Json(p)| p)).await
}

pub async fn list_users(
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let users = AdminService::list_users(&*state.db, page).await?;
    Ok(ApiResponse::with_data(users))
}

pub async fn set_user_status(
    claims: Claims,
    ip: ClientIp,
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<impl IntoResponse, AppError> {
    rate_limit!(state.limiter, "admin:write", &actor_key(Some(&claims.sub), &ip.0), 60);

    let admin_id = claims.user_id()?;
    let ctx = AuditContext::new(Some(admin_id), &ip);
    let profile = AdminService::set_user_status(&state, admin_id, user_id, payload.status, &ctx).await?;
    Ok(ApiResponse::with_data(profile))
}

pub async fn audit_log(
    State(state): State<AppState>,
    Query(query): Query<AuditQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = AuditService::list(&*state.db, &query).await?;
    Ok(ApiResponse::with_data(page))
}
