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
        response::ApiResponse,
        trade::{CreateTradeRequest, TradeListQuery, UpdateTradeRequest},
    },
    extractors::client_ip::ClientIp,
    rate_limit,
    services::{audit::AuditContext, trade as TradeService},
    state::AppState,
    utils::limiter::actor_key,
};

pub async fn create(
    claims: Claims,
    ip: ClientIp,
    State(state): State<AppState>,
    Json(payload): Json<CreateTradeRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    rate_limit!(state.limiter, "trade:write", &actor_key(Some(&claims.sub), &ip.0), 30);

    let user_id = claims.user_id()?;
    let trade = TradeService::create(&state, user_id, payload, &AuditContext::new(Some(user_id), &ip)).await?;
    Ok(ApiResponse::with_code(StatusCode::CREATED, "Trade recorded", Some(trade)))
}

pub async fn list(
    claims: Claims,
    ip: ClientIp,
    State(state): State<AppState>,
    Query(query): Query<TradeListQuery>,
) -> Result<impl IntoResponse, AppError> {
    rate_limit!(state.limiter, "trade:read", &actor_key(Some(&claims.sub), &ip.0), 120);

    let trades = TradeService::list(&*state.db, claims.user_id()?, query).await?;
    Ok(ApiResponse::with_data(trades))
}

pub async fn get(
    claims: Claims,
    ip: ClientIp,
    State(state): State<AppState>,
    Path(trade_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    rate_limit!(state.limiter, "trade:read", &actor_key(Some(&claims.sub), &ip.0), 120);

    let trade = TradeService::get(&*state.db, claims.user_id()?, trade_id).await?;
    Ok(ApiResponse::with_data(trade))
}

pub async fn update(
    claims: Claims,
    ip: ClientIp,
    State(state): State<AppState>,
    Path(trade_id): Path<Uuid>,
    Json(payload): Json<UpdateTradeRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    rate_limit!(state.limiter, "trade:write", &actor_key(Some(&claims.sub), &ip.0), 30);

    let trade = TradeService::update(&state, claims.user_id()?, trade_id, payload).await?;
    Ok(ApiResponse::with_data(trade))
}

pub async fn delete(
    claims: Claims,
    ip: ClientIp,
    State(state): State<AppState>,
    Path(trade_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    rate_limit!(state.limiter, "trade:write", &actor_key(Some(&claims.sub), &ip.0), 30);

    let user_id = claims.user_id()?;
    TradeService::delete(&state, user_id, trade_id, &AuditContext::new(Some(user_id), &ip)).await?;
    Ok(ApiResponse::<()>::with_message("Trade deleted"))
}
