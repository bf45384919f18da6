use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use redis::{aio::ConnectionManager, AsyncCommands};
use secrecy::ExposeSecret;
use std::str::FromStr;

use crate::{
    core::{constants::REDIS_PREFIX_BLACKLIST, enums::UserRole, error::AppError},
    extractors::claims::{access_token, decode_claims},
    state::AppState,
};

/// Token 已登出（在黑名单中）时返回 401。
/// 页面路由直接调用它，以便把错误渲染成纯文本。
pub async fn ensure_not_revoked(redis: &ConnectionManager, token: &str) -> Result<(), AppError> {
    let redis_key = format!("{}{}", REDIS_PREFIX_BLACKLIST, token);
    let mut redis_conn = redis.clone();
    let is_blacklisted: bool = redis_conn.exists(&redis_key).await?;

    if is_blacklisted {
        tracing::warn!("🚫 Blocked blacklisted token");
        return Err(AppError::AuthError("Token has been revoked".to_string()));
    }
    Ok(())
}

/// 基础鉴权中间件：拒绝已登出（在黑名单中）的 Token。
///
/// 没有 Token 时直接放行，是否必须登录由 `Claims` 提取器决定。
pub async fn auth_middleware(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    if let Some(token) = access_token(req.headers()) {
        ensure_not_revoked(&state.redis, &token).await?;
    }

    Ok(next.run(req).await)
}

/// 管理员权限守卫：Token 必须有效且角色为 Admin。
pub async fn admin_guard(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = access_token(req.headers())
        .ok_or(AppError::AuthError("Missing token".to_string()))?;

    let claims = decode_claims(&token, state.config.jwt_secret.expose_secret())?;

    // 无法识别的角色按普通用户处理
    let role = UserRole::from_str(&claims.role).unwrap_or(UserRole::User);
    if role != UserRole::Admin {
        tracing::warn!("🚫 Admin access denied: {}", claims.username);
        return Err(AppError::Forbidden("Requires Administrator privileges".to_string()));
    }

    Ok(next.run(req).await)
}
