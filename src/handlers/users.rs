use axum::{extract::{State, Json}, response::IntoResponse};
use validator::Validate;

use crate::{
    core::error::AppError,
    dtos::{auth::Claims, user::UpdateUserRequest, response::ApiResponse},
    extractors::client_ip::ClientIp,
    services::{audit::AuditContext, dashboard as DashboardService, user as UserService},
    state::AppState,
    utils::limiter::actor_key,
    rate_limit,
};

/// 当前用户资料（缓存优先）
pub async fn get_me(
    claims: Claims,
    ip: ClientIp,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    rate_limit!(state.limiter, "user:read", &actor_key(Some(&claims.sub), &ip.0), 60);

    let profile = UserService::get_user_profile(&state, claims.user_id()?).await?;
    Ok(ApiResponse::with_data(profile))
}

/// 更新当前用户资料，只写入实际变化的字段
pub async fn update_me(
    claims: Claims,
    ip: ClientIp,
    State(state): State<AppState>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    rate_limit!(state.limiter, "user:update", &actor_key(Some(&claims.sub), &ip.0), 10);

    let user_id = claims.user_id()?;
    let ctx = AuditContext::new(Some(user_id), &ip);
    let profile = UserService::update_user_profile(&state, user_id, payload, &ctx).await?;
    Ok(ApiResponse::with_data(profile))
}

pub async fn dashboard(
    claims: Claims,
    ip: ClientIp,
    State(state): State<AppState>,
) -> Result<impl IntoResponse, AppError> {
    rate_limit!(state.limiter, "user:read", &actor_key(Some(&claims.sub), &ip.0), 60);

    let dashboard = DashboardService::build(&state, claims.user_id()?).await?;
    Ok(ApiResponse::with_data(dashboard))
}
