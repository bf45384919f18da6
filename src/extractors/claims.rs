use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap},
};
use axum_extra::{
    extract::cookie::CookieJar,
    headers::{authorization::Bearer, Authorization, HeaderMapExt},
};
use jsonwebtoken::{decode, DecodingKey, Validation};
use secrecy::ExposeSecret;
use uuid::Uuid;

use crate::{
    core::{constants::ACCESS_TOKEN_COOKIE, error::AppError},
    dtos::auth::Claims,
    state::AppState,
};

/// 取出 Access Token：优先 `Authorization: Bearer`，其次会话 Cookie
pub fn access_token(headers: &HeaderMap) -> Option<String> {
    if let Some(Authorization(bearer)) = headers.typed_get::<Authorization<Bearer>>() {
        return Some(bearer.token().to_string());
    }
    CookieJar::from_headers(headers)
        .get(ACCESS_TOKEN_COOKIE)
        .map(|c| c.value().to_string())
}

/// 校验签名与过期时间
pub fn decode_claims(token: &str, secret: &str) -> Result<Claims, AppError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<Claims>(token, &decoding_key, &Validation::default())
        .map(|data| data.claims)
        .map_err(|e| {
            tracing::warn!("⚠️ Token validation failed: {}", e);
            AppError::AuthError("Invalid or expired token".to_string())
        })
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::AuthError("Invalid User ID format".to_string()))
    }
}

/// 自定义提取器：解析并验证 Token，失败时请求不会进入 Handler。
/// 黑名单由 `auth_middleware` 负责。
impl FromRequestParts<AppState> for Claims {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = access_token(&parts.headers)
            .ok_or(AppError::AuthError("Missing or invalid Authorization header".to_string()))?;

        decode_claims(&token, state.config.jwt_secret.expose_secret())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn sign(secret: &str, exp: usize) -> String {
        let claims = Claims {
            sub: Uuid::new_v4().to_string(),
            username: "alice".to_string(),
            role: "user".to_string(),
            exp,
        };
        encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn future_exp() -> usize {
        (chrono::Utc::now().timestamp() + 600) as usize
    }

    #[test]
    fn bearer_header_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer from-header".parse().unwrap());
        headers.insert(header::COOKIE, "access_token=from-cookie".parse().unwrap());
        assert_eq!(access_token(&headers).as_deref(), Some("from-header"));
    }

    #[test]
    fn cookie_is_used_without_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, "theme=dark; access_token=from-cookie".parse().unwrap());
        assert_eq!(access_token(&headers).as_deref(), Some("from-cookie"));
        assert_eq!(access_token(&HeaderMap::new()), None);
    }

    #[test]
    fn decode_accepts_valid_and_rejects_foreign_signature() {
        let token = sign("s3cret", future_exp());
        let claims = decode_claims(&token, "s3cret").unwrap();
        assert_eq!(claims.username, "alice");
        assert!(claims.user_id().is_ok());
        assert!(matches!(decode_claims(&token, "other"), Err(AppError::AuthError(_))));
    }

    #[test]
    fn decode_rejects_expired_token() {
        let token = sign("s3cret", 1_000);
        assert!(decode_claims(&token, "s3cret").is_err());
    }
}
