use axum::{
    extract::Request,
    http::{HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    extract::cookie::CookieJar,
    headers::{authorization::Bearer, Authorization, HeaderMapExt},
};

use crate::{
    core::{
        constants::{ACCESS_TOKEN_COOKIE, CSRF_COOKIE, CSRF_HEADER},
        error::AppError,
    },
    utils::token::constant_time_eq,
};

fn is_safe(method: &Method) -> bool {
    matches!(*method, Method::GET | Method::HEAD | Method::OPTIONS)
}

/// Double-submit 校验。
///
/// 只有依赖 Cookie 会话的写请求需要校验：浏览器会自动携带 Cookie，
/// 但不会自动携带 Authorization 头，Bearer 请求和匿名请求直接放行。
/// 其他认证方案（如 Basic）不会被当作 Token，请求仍走 Cookie 会话，因此照常校验。
pub fn check_csrf(method: &Method, headers: &HeaderMap) -> Result<(), AppError> {
    if is_safe(method) || headers.typed_get::<Authorization<Bearer>>().is_some() {
        return Ok(());
    }

    let jar = CookieJar::from_headers(headers);
    if jar.get(ACCESS_TOKEN_COOKIE).is_none() {
        return Ok(());
    }

    let expected = jar
        .get(CSRF_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or_else(|| AppError::Forbidden("Missing CSRF cookie".to_string()))?;

    let provided = headers
        .get(CSRF_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::Forbidden("Missing CSRF token".to_string()))?;

    if expected.is_empty() || !constant_time_eq(expected.as_bytes(), provided.as_bytes()) {
        tracing::warn!("🚫 CSRF token mismatch");
        return Err(AppError::Forbidden("Invalid CSRF token".to_string()));
    }

    Ok(())
}

pub async fn csrf_guard(req: Request, next: Next) -> Result<Response, AppError> {
    check_csrf(req.method(), req.headers())?;
    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;

    fn cookie_session(csrf_cookie: Option<&str>, csrf_header: Option<&str>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let mut cookie = "access_token=jwt".to_string();
        if let Some(v) = csrf_cookie {
            cookie.push_str(&format!("; csrf_token={v}"));
        }
        headers.insert(header::COOKIE, cookie.parse().unwrap());
        if let Some(v) = csrf_header {
            headers.insert(CSRF_HEADER, v.parse().unwrap());
        }
        headers
    }

    #[test]
    fn safe_methods_pass() {
        let headers = cookie_session(None, None);
        assert!(check_csrf(&Method::GET, &headers).is_ok());
        assert!(check_csrf(&Method::HEAD, &headers).is_ok());
    }

    #[test]
    fn bearer_and_anonymous_requests_pass() {
        let mut headers = HeaderMap::new();
        assert!(check_csrf(&Method::POST, &headers).is_ok());
        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert!(check_csrf(&Method::DELETE, &headers).is_ok());
    }

    #[test]
    fn non_bearer_authorization_does_not_skip_check() {
        let mut headers = cookie_session(Some("tok"), None);
        headers.insert(header::AUTHORIZATION, "Basic Zm9vOmJhcg==".parse().unwrap());
        assert!(matches!(
            check_csrf(&Method::POST, &headers),
            Err(AppError::Forbidden(_))
        ));

        // 格式不完整的 Bearer 头同样不能绕过
        headers.insert(header::AUTHORIZATION, "Bearer".parse().unwrap());
        assert!(check_csrf(&Method::POST, &headers).is_err());
    }

    #[test]
    fn cookie_session_requires_matching_token() {
        assert!(check_csrf(&Method::POST, &cookie_session(Some("tok"), Some("tok"))).is_ok());
        assert!(matches!(
            check_csrf(&Method::POST, &cookie_session(Some("tok"), Some("bad"))),
            Err(AppError::Forbidden(_))
        ));
        assert!(check_csrf(&Method::PUT, &cookie_session(Some("tok"), None)).is_err());
        assert!(check_csrf(&Method::PUT, &cookie_session(None, Some("tok"))).is_err());
    }
}
