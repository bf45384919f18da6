// src/core/error.rs
use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;
use crate::dtos::response::ApiResponse;

/// 应用程序统一错误类型。
///
/// 通过实现 `IntoResponse`，任何 `AppError` 都可以直接作为 Handler 的错误返回，
/// 以统一的 JSON 格式输出给客户端。页面路由使用 [`PageError`] 输出纯文本。
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] sea_orm::DbErr),

    #[error("Redis error: {0}")]
    RedisError(#[from] redis::RedisError),

    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    /// 请求格式或参数错误。返回400。
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// 认证错误。返回401。
    #[error("Authentication failed: {0}")]
    AuthError(String),

    /// 授权错误。返回403。
    #[error("Permission denied: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// 上传文件超过限制。返回413。
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// 请求频率限制。返回429，并携带 Retry-After。
    #[error("Rate limit exceeded, retry after {retry_after}s")]
    RateLimitExceeded { retry_after: u64 },

    #[error("Internal server error: {0}")]
    InternalServerError(String),
}

impl AppError {
    /// 状态码与对外消息。内部错误只记录日志，不把细节暴露给客户端。
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            AppError::DatabaseError(e) => {
                tracing::error!("❌ Database Error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Database service error".to_string())
            }
            AppError::RedisError(e) => {
                tracing::error!("❌ Redis Error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Cache service error".to_string())
            }
            AppError::InternalServerError(msg) => {
                tracing::error!("❌ Internal Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
            AppError::ValidationError(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            AppError::PayloadTooLarge(msg) => (StatusCode::PAYLOAD_TOO_LARGE, msg.clone()),
            AppError::RateLimitExceeded { retry_after } => (
                StatusCode::TOO_MANY_REQUESTS,
                format!("Rate limit exceeded. Try again in {} seconds.", retry_after),
            ),
        }
    }

    fn retry_after(&self) -> Option<u64> {
        match self {
            AppError::RateLimitExceeded { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

fn with_retry_after(mut response: Response, retry_after: Option<u64>) -> Response {
    if let Some(secs) = retry_after {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from(secs));
    }
    response
}

/// API 路由：统一 JSON 格式
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, msg) = self.status_and_message();
        let response = ApiResponse::<()>::with_error(status, &msg).into_response();
        with_retry_after(response, self.retry_after())
    }
}

/// 页面路由的错误包装：同样的错误，输出 text/plain 而不是 JSON
#[derive(Debug)]
pub struct PageError(pub AppError);

impl From<AppError> for PageError {
    fn from(err: AppError) -> Self {
        PageError(err)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let (status, msg) = self.0.status_and_message();
        let response = (status, msg).into_response();
        with_retry_after(response, self.0.retry_after())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_maps_to_429_with_retry_after() {
        let response = AppError::RateLimitExceeded { retry_after: 42 }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "42");
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("application/json"));
    }

    #[test]
    fn page_error_renders_plain_text() {
        let response = PageError(AppError::RateLimitExceeded { retry_after: 5 }).into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "5");
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
    }

    #[test]
    fn internal_errors_hide_details() {
        let err = AppError::InternalServerError("secret stack trace".to_string());
        let (status, msg) = err.status_and_message();
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(msg, "Internal server error");
    }

    #[test]
    fn client_errors_keep_their_message() {
        let (status, msg) = AppError::Conflict("League is full".to_string()).status_and_message();
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(msg, "League is full");
    }
}
