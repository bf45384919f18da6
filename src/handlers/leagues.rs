use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    core::error::AppError,
    dtos::{
        auth::Claims,
        league::{CreateLeagueRequest, JoinLeagueRequest},
        response::ApiResponse,
        PageQuery,
    },
    extractors::client_ip::ClientIp,
    rate_limit,
    services::{audit::AuditContext, league as LeagueService},
    state::AppState,
    utils::limiter::actor_key,
};

pub async fn create(
    claims: Claims,
    ip: ClientIp,
    State(state): State<AppState>,
    Json(payload): Json<CreateLeagueRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    rate_limit!(state.limiter, "league:create", &actor_key(Some(&claims.sub), &ip.0), 5);

    let user_id = claims.user_id()?;
    let league = LeagueService::create(&state, user_id, payload, &AuditContext::new(Some(user_id), &ip)).await?;
    Ok(ApiResponse::with_code(StatusCode::CREATED, "League created", Some(league)))
}

pub async fn list(
    _claims: Claims,
    State(state): State<AppState>,
    Query(page): Query<PageQuery>,
) -> Result<impl IntoResponse, AppError> {
    let leagues = LeagueService::list_public(&*state.db, page).await?;
    Ok(ApiResponse::with_data(leagues))
}

pub async fn get(
    claims: Claims,
    State(state): State<AppState>,
    Path(league_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let league = LeagueService::get(&*state.db, league_id, claims.user_id()?).await?;
    Ok(ApiResponse::with_data(league))
}

/// 加入联赛。私有联赛需要邀请码，请求体可以省略。
pub async fn join(
    claims: Claims,
    ip: ClientIp,
    State(state): State<AppState>,
    Path(league_id): Path<Uuid>,
    payload: Option<Json<JoinLeagueRequest>>,
) -> Result<impl IntoResponse, AppError> {
    rate_limit!(state.limiter, "league:join", &actor_key(Some(&claims.sub), &ip.0), 10);

    let user_id = claims.user_id()?;
    let code = payload.and_then(|Json(p)| p.join_code);
    let league = LeagueService::join(
        &state,
        user_id,
        league_id,
        code.as_deref(),
        &AuditContext::new(Some(user_id), &ip),
    )
    .await?;
    Ok(ApiResponse::with_data(league))
}

pub async fn leave(
    claims: Claims,
    ip: ClientIp,
    State(state): State<AppState>,
    Path(league_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    rate_limit!(state.limiter, "league:join", &actor_key(Some(&claims.sub), &ip.0), 10);

    let user_id = claims.user_id()?;
    LeagueService::leave(&state, user_id, league_id, &AuditContext::new(Some(user_id), &ip)).await?;
    Ok(ApiResponse::<()>::with_message("Left league"))
}

pub async fn leaderboard(
    claims: Claims,
    State(state): State<AppState>,
    Path(league_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let rows = LeagueService::leaderboard(&*state.db, league_id, claims.user_id()?).await?;
    Ok(ApiResponse::with_data(rows))
}
