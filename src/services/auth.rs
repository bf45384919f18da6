use std::sync::LazyLock;

use argon2::{
    password_hash::SaltString, Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use rand::rngs::OsRng;
use redis::{AsyncCommands, Script};
use sea_orm::*;
use secrecy::ExposeSecret;
use uuid::Uuid;

use crate::{
    core::{
        config::Config,
        constants::*,
        enums::{UserRole, UserStatus},
        error::AppError,
    },
    dtos::auth::{Claims, LoginRequest, LoginResponse, RegisterRequest},
    entity::users,
    extractors::claims::decode_claims,
    services::{
        audit::{self, AuditContext},
        mailer::{verification_email, Mailer},
    },
    state::AppState,
    utils::token::random_token,
};

#[inline]
fn refresh_key(token: &str) -> String {
    format!("{}{}", REDIS_PREFIX_REFRESH, token)
}
#[inline]
fn blacklist_key(token: &str) -> String {
    format!("{}{}", REDIS_PREFIX_BLACKLIST, token)
}
#[inline]
fn verify_key(token: &str) -> String {
    format!("{}{}", REDIS_PREFIX_EMAIL_VERIFY, token)
}

/// 邮箱统一小写存储，登录与唯一性判断都基于小写值
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| AppError::InternalServerError(format!("Hash failed: {}", e)))
}

pub fn verify_password(password: &str, stored_hash: &str) -> Result<(), AppError> {
    let parsed = PasswordHash::new(stored_hash)
        .map_err(|_| AppError::InternalServerError("Auth failed".to_string()))?;
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .map_err(|_| AppError::AuthError("Invalid credentials".to_string()))
}

/// 按账户状态决定是否允许登录
pub fn ensure_can_login(status: UserStatus) -> Result<(), AppError> {
    match status {
        UserStatus::Active => Ok(()),
        UserStatus::PendingVerification => Err(AppError::Forbidden("Email not verified".to_string())),
        UserStatus::Disabled => Err(AppError::Forbidden("Account is disabled".to_string())),
    }
}

/// 生成 Access Token（纯函数）
pub fn generate_access_token(
    config: &Config,
    user_id: &str,
    username: &str,
    role: UserRole,
) -> Result<String, AppError> {
    let exp = (Utc::now() + Duration::seconds(config.jwt_expiration)).timestamp() as usize;

    let claims = Claims {
        sub: user_id.to_string(),
        username: username.to_string(),
        role: role.to_string(),
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.expose_secret().as_bytes()),
    )
    .map_err(|e| AppError::InternalServerError(format!("Token generation failed: {}", e)))
}

fn is_unique_violation(err: &DbErr) -> bool {
    err.to_string().contains("duplicate key")
}

/// 注册：创建待验证用户并发送验证邮件。邮件发送失败不影响注册结果，
/// 用户可以通过重发接口再次获取链接。
pub async fn register(state: &AppState, req: RegisterRequest) -> Result<Uuid, AppError> {
    let password_hash = hash_password(&req.password)?;
    let email = normalize_email(&req.email);
    let now = Utc::now().fixed_offset();

    let new_user = users::ActiveModel {
        id: Set(Uuid::new_v4()),
        username: Set(req.username),
        email: Set(email),
        password_hash: Set(password_hash),
        display_name: Set(req.display_name),
        bio: Set(None),
        role: Set(UserRole::User),
        status: Set(UserStatus::PendingVerification),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let user = new_user.insert(&*state.db).await.map_err(|e| {
        if is_unique_violation(&e) {
            AppError::Conflict("Username or email already exists".to_string())
        } else {
            AppError::DatabaseError(e)
        }
    })?;

    tracing::info!("👤 Registered user {} ({})", user.username, user.id);
    issue_verification(state, &user).await?;
    Ok(user.id)
}

async fn issue_verification(state: &AppState, user: &users::Model) -> Result<(), AppError> {
    let token = random_token(EMAIL_VERIFY_TOKEN_LEN);
    let mut redis = state.redis.clone();
    let _: () = redis
        .set_ex(verify_key(&token), user.id.to_string(), state.config.email_verification_ttl)
        .await?;

    send_verification(state.mailer.as_ref(), &state.config.app_base_url, user, &token).await;
    Ok(())
}

/// 发送失败只记日志，令牌已写入 Redis，用户可以重新请求
async fn send_verification(mailer: &dyn Mailer, base_url: &str, user: &users::Model, token: &str) -> bool {
    let email = verification_email(base_url, &user.email, &user.username, token);
    match mailer.send(email).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("⚠️ Verification email to {} failed: {}", user.email, e);
            false
        }
    }
}

/// 验证邮箱：令牌一次性使用
pub async fn verify_email(state: &AppState, token: &str, ctx: &AuditContext) -> Result<(), AppError> {
    let key = verify_key(token);
    let mut redis = state.redis.clone();

    let user_id: Option<String> = redis.get(&key).await?;
    let user_id = user_id
        .and_then(|raw| Uuid::parse_str(&raw).ok())
        .ok_or(AppError::BadRequest("Invalid or expired verification token".to_string()))?;

    let user = users::Entity::find_by_id(user_id)
        .one(&*state.db)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    match user.status {
        UserStatus::Disabled => return Err(AppError::Forbidden("Account is disabled".to_string())),
        UserStatus::Active => {}
        UserStatus::PendingVerification => {
            let mut active: users::ActiveModel = user.into();
            active.status = Set(UserStatus::Active);
            active.update(&*state.db).await?;
            audit::log_auth(&*state.db, &ctx.with_actor(user_id), "verify", user_id).await;
        }
    }

    let _: () = redis.del(&key).await?;
    Ok(())
}

/// 重发验证邮件。邮箱不存在或已验证时同样返回成功，避免泄露账户信息。
pub async fn resend_verification(state: &AppState, email: &str) -> Result<(), AppError> {
    let user = users::Entity::find()
        .filter(users::Column::Email.eq(normalize_email(email)))
        .one(&*state.db)
        .await?;

    match user {
        Some(user) if user.status == UserStatus::PendingVerification => issue_verification(state, &user).await,
        _ => Ok(()),
    }
}

/// 登录：账号可以是用户名或邮箱
pub async fn login(state: &AppState, req: LoginRequest, ctx: &AuditContext) -> Result<LoginResponse, AppError> {
    let user = users::Entity::find()
        .filter(
            Condition::any()
                .add(users::Column::Username.eq(req.account.trim()))
                .add(users::Column::Email.eq(normalize_email(&req.account))),
        )
        .one(&*state.db)
        .await?
        .ok_or(AppError::AuthError("Invalid credentials".to_string()))?;

    verify_password(&req.password, &user.password_hash)?;
    ensure_can_login(user.status)?;

    let access_token = generate_access_token(&state.config, &user.id.to_string(), &user.username, user.role.clone())?;
    let refresh_token = Uuid::new_v4().to_string();

    let mut redis = state.redis.clone();
    let _: () = redis
        .set_ex(
            refresh_key(&refresh_token),
            user.id.to_string(),
            state.config.refresh_token_expiration as u64,
        )
        .await?;

    audit::log_auth(&*state.db, &ctx.with_actor(user.id), "login", user.id).await;

    Ok(LoginResponse {
        access_token,
        refresh_token,
        csrf_token: random_token(CSRF_TOKEN_LEN),
    })
}

/// 原子地取出 Refresh Token 对应的用户 ID，并就地改写为 `USED:<id>`（带宽限期 TTL）。
/// 已被改写过的值原样返回，由调用方识别为重放。
static CONSUME_REFRESH_SCRIPT: LazyLock<Script> = LazyLock::new(|| {
    Script::new(
        r#"
local value = redis.call('GET', KEYS[1])
if not value then
    return nil
end
if string.sub(value, 1, string.len(ARGV[1])) == ARGV[1] then
    return value
end
redis.call('SET', KEYS[1], ARGV[1] .. value, 'EX', ARGV[2])
return value
"#,
    )
});

/// 解析脚本的返回值：不存在为 401，带 `USED:` 前缀为重放（409）
fn classify_refresh(raw: Option<String>) -> Result<Uuid, AppError> {
    let raw = raw.ok_or(AppError::AuthError("Invalid or expired refresh token".to_string()))?;

    if let Some(user_id) = raw.strip_prefix(REDIS_PREFIX_USED) {
        tracing::warn!("🚨 Refresh token reused! User: {}", user_id);
        return Err(AppError::Conflict("Token reused. Please login again.".to_string()));
    }

    Uuid::parse_str(&raw)
        .map_err(|_| AppError::InternalServerError("Corrupted refresh token entry".to_string()))
}

/// 刷新令牌：每个 Refresh Token 只能使用一次。读取和标记在同一个 Lua 脚本中完成，
/// 并发的两次刷新只有一次能拿到用户 ID，另一次看到的是 `USED:` 标记。
/// 宽限期内再次使用视为重放。
pub async fn refresh(state: &AppState, old_token: &str) -> Result<LoginResponse, AppError> {
    let mut redis = state.redis.clone();

    let raw: Option<String> = CONSUME_REFRESH_SCRIPT
        .key(refresh_key(old_token))
        .arg(REDIS_PREFIX_USED)
        .arg(ROTATION_GRACE_PERIOD)
        .invoke_async(&mut redis)
        .await?;
    let uid = classify_refresh(raw)?;
    let user_id_raw = uid.to_string();

    let user = users::Entity::find_by_id(uid)
        .one(&*state.db)
        .await?
        .ok_or(AppError::AuthError("User not found".to_string()))?;

    ensure_can_login(user.status)?;

    let access_token = generate_access_token(&state.config, &user_id_raw, &user.username, user.role)?;
    let refresh_token = Uuid::new_v4().to_string();

    let _: () = redis
        .set_ex(
            refresh_key(&refresh_token),
            &user_id_raw,
            state.config.refresh_token_expiration as u64,
        )
        .await?;

    Ok(LoginResponse {
        access_token,
        refresh_token,
        csrf_token: random_token(CSRF_TOKEN_LEN),
    })
}

/// 登出：把仍然有效的 Access Token 放入黑名单，有效期与 Token 剩余寿命一致。
/// 无效 Token 直接忽略。
pub async fn logout(state: &AppState, token: &str, ctx: &AuditContext) -> Result<(), AppError> {
    let Ok(claims) = decode_claims(token, state.config.jwt_secret.expose_secret()) else {
        return Ok(());
    };

    let ttl = claims.exp as i64 - Utc::now().timestamp();
    if ttl > 0 {
        let mut redis = state.redis.clone();
        let _: () = redis.set_ex(blacklist_key(token), "logout", ttl as u64).await?;
    }

    if let Ok(user_id) = claims.user_id() {
        audit::log_auth(&*state.db, &ctx.with_actor(user_id), "logout", user_id).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_is_normalized() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn password_hash_round_trip() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).is_ok());
        assert!(matches!(verify_password("wrong", &hash), Err(AppError::AuthError(_))));
    }

    #[test]
    fn only_active_accounts_may_login() {
        assert!(ensure_can_login(UserStatus::Active).is_ok());
        assert!(matches!(
            ensure_can_login(UserStatus::PendingVerification),
            Err(AppError::Forbidden(msg)) if msg == "Email not verified"
        ));
        assert!(matches!(ensure_can_login(UserStatus::Disabled), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn access_token_carries_role_and_subject() {
        let config = Config::for_tests();
        let id = Uuid::new_v4().to_string();
        let token = generate_access_token(&config, &id, "bob", UserRole::Admin).unwrap();
        let claims = decode_claims(&token, config.jwt_secret.expose_secret()).unwrap();
        assert_eq!(claims.sub, id);
        assert_eq!(claims.role, "admin");
    }

    #[test]
    fn refresh_entry_is_classified() {
        let uid = Uuid::new_v4();
        assert_eq!(classify_refresh(Some(uid.to_string())).unwrap(), uid);
        assert!(matches!(classify_refresh(None), Err(AppError::AuthError(_))));
        assert!(matches!(
            classify_refresh(Some(format!("{}{}", REDIS_PREFIX_USED, uid))),
            Err(AppError::Conflict(_))
        ));
        assert!(matches!(
            classify_refresh(Some("garbage".to_string())),
            Err(AppError::InternalServerError(_))
        ));
    }

    fn pending_user() -> users::Model {
        let now = Utc::now().fixed_offset();
        users::Model {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: String::new(),
            display_name: None,
            bio: None,
            role: UserRole::User,
            status: UserStatus::PendingVerification,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn verification_mail_goes_through_mailer() {
        use crate::services::mailer::testing::RecordingMailer;

        let mailer = RecordingMailer::default();
        let user = pending_user();
        assert!(send_verification(&mailer, "https://league.example", &user, "tok42").await);

        let sent = mailer.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "alice@example.com");
        assert!(sent[0].body.contains("https://league.example/auth/verify?token=tok42"));
    }

    #[tokio::test]
    async fn mail_failure_is_not_fatal() {
        use crate::services::mailer::testing::FailingMailer;

        assert!(!send_verification(&FailingMailer, "http://x", &pending_user(), "t").await);
    }
}
