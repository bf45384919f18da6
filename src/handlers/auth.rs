// src/handlers/auth.rs
use axum::{
    extract::{Json, Query, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use axum_extra::extract::cookie::CookieJar;
use validator::Validate;

use crate::{
    core::{constants::CSRF_TOKEN_LEN, error::AppError},
    dtos::{
        auth::{
            CsrfResponse, LoginRequest, RefreshRequest, RegisterRequest, RegisterResponse,
            ResendVerificationRequest, VerifyEmailQuery,
        },
        response::ApiResponse,
    },
    extractors::{claims::access_token, client_ip::ClientIp},
    rate_limit,
    services::{audit::AuditContext, auth as AuthService},
    state::AppState,
    utils::{
        cookie::{access_token_cookie, clear_session, csrf_cookie},
        limiter::actor_key,
        token::random_token,
    },
};

/// 用户注册。创建待验证账户并发送验证邮件。
///
/// 按来源 IP 限流，防止批量注册。
pub async fn register(
    State(state): State<AppState>,
    ip: ClientIp,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    rate_limit!(state.limiter, "auth:register", &actor_key(None, &ip.0), 5);

    let user_id = AuthService::register(&state, payload).await?;

    Ok(ApiResponse::with_code(
        StatusCode::CREATED,
        "Registered. Check your email to verify the account.",
        Some(RegisterResponse {
            user_id: user_id.to_string(),
            verification_required: true,
        }),
    ))
}

/// 邮箱验证链接的落地接口
pub async fn verify_email(
    State(state): State<AppState>,
    ip: ClientIp,
    Query(query): Query<VerifyEmailQuery>,
) -> Result<impl IntoResponse, AppError> {
    rate_limit!(state.limiter, "auth:verify", &actor_key(None, &ip.0), 10);

    AuthService::verify_email(&state, query.token.trim(), &AuditContext::new(None, &ip)).await?;
    Ok(ApiResponse::<()>::with_message("Email verified"))
}

pub async fn resend_verification(
    State(state): State<AppState>,
    ip: ClientIp,
    Json(payload): Json<ResendVerificationRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;
    rate_limit!(state.limiter, "auth:resend", &actor_key(None, &ip.0), 3);

    AuthService::resend_verification(&state, &payload.email).await?;
    Ok(ApiResponse::<()>::with_message(
        "If the account exists and is unverified, a new email has been sent",
    ))
}

/// 用户登录。除了在响应体中返回令牌，还会写入会话 Cookie 与 CSRF Cookie，
/// 浏览器客户端可以只依赖 Cookie。
pub async fn login(
    State(state): State<AppState>,
    ip: ClientIp,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    // 同一来源每个窗口最多尝试 5 次
    rate_limit!(state.limiter, "auth:login", &actor_key(None, &ip.0), 5);

    let response = AuthService::login(&state, payload, &AuditContext::new(None, &ip)).await?;

    let secure = state.config.cookie_secure;
    let jar = jar
        .add(access_token_cookie(response.access_token.clone(), secure))
        .add(csrf_cookie(response.csrf_token.clone(), secure));

    Ok((jar, ApiResponse::with_data(response)))
}

/// 刷新令牌，同时轮换会话 Cookie
pub async fn refresh(
    State(state): State<AppState>,
    ip: ClientIp,
    jar: CookieJar,
    Json(payload): Json<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    rate_limit!(state.limiter, "auth:refresh", &actor_key(None, &ip.0), 20);

    let response = AuthService::refresh(&state, &payload.refresh_token).await?;

    let secure = state.config.cookie_secure;
    let jar = jar
        .add(access_token_cookie(response.access_token.clone(), secure))
        .add(csrf_cookie(response.csrf_token.clone(), secure));

    Ok((jar, ApiResponse::with_data(response)))
}

/// 用户登出。令牌来自 Bearer 头或会话 Cookie，两者都没有时只清理 Cookie。
pub async fn logout(
    State(state): State<AppState>,
    ip: ClientIp,
    headers: HeaderMap,
    jar: CookieJar,
) -> Result<impl IntoResponse, AppError> {
    if let Some(token) = access_token(&headers) {
        AuthService::logout(&state, &token, &AuditContext::new(None, &ip)).await?;
    }

    Ok((clear_session(jar), ApiResponse::<()>::with_message("Logged out successfully")))
}

/// 下发新的 CSRF Token，前端在 Cookie 过期或丢失时调用
pub async fn csrf(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let token = random_token(CSRF_TOKEN_LEN);
    let jar = jar.add(csrf_cookie(token.clone(), state.config.cookie_secure));
    (jar, ApiResponse::with_data(CsrfResponse { csrf_token: token }))
}
