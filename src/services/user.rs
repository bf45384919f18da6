// src/services/user.rs
use sea_orm::*;
use uuid::Uuid;

use crate::{
    core::{
        constants::{CACHE_EXPIRE_USER_PROFILE, REDIS_PREFIX_USER_PROFILE},
        error::AppError,
    },
    dtos::user::{UpdateUserRequest, UserProfile},
    entity::users,
    services::{
        audit::{self, AuditContext},
        auth::normalize_email,
    },
    state::AppState,
    utils::cache,
};

pub fn profile_cache_key(user_id: Uuid) -> String {
    format!("{}{}", REDIS_PREFIX_USER_PROFILE, user_id)
}

/// 读取用户资料：缓存优先，未命中时查库并回填
pub async fn get_user_profile(state: &AppState, user_id: Uuid) -> Result<UserProfile, AppError> {
    let db = state.db.clone();

    cache::get_or_fetch(
        &state.redis,
        &profile_cache_key(user_id),
        CACHE_EXPIRE_USER_PROFILE,
        || async move {
            let user = users::Entity::find_by_id(user_id)
                .one(db.as_ref())
                .await?
                .ok_or(AppError::NotFound("User not found".to_string()))?;
            Ok(user.into())
        },
    )
    .await
}

/// 只保留与当前值不同的字段，返回变更的字段名
fn apply_changes(user: &users::Model, req: UpdateUserRequest, active: &mut users::ActiveModel) -> Vec<&'static str> {
    let mut changed = Vec::new();

    if let Some(name) = req.display_name.map(|s| s.trim().to_string()) {
        if user.display_name.as_deref() != Some(name.as_str()) {
            active.display_name = Set(Some(name));
            changed.push("display_name");
        }
    }
    if let Some(email) = req.email.map(|e| normalize_email(&e)) {
        if user.email != email {
            active.email = Set(email);
            changed.push("email");
        }
    }
    if let Some(bio) = req.bio {
        let bio = Some(bio).filter(|b| !b.trim().is_empty());
        if user.bio != bio {
            active.bio = Set(bio);
            changed.push("bio");
        }
    }

    changed
}

/// 更新用户资料，数据库成功后同步覆盖缓存（Write Through）
pub async fn update_user_profile(
    state: &AppState,
    user_id: Uuid,
    req: UpdateUserRequest,
    ctx: &AuditContext,
) -> Result<UserProfile, AppError> {
    let user = users::Entity::find_by_id(user_id)
        .one(&*state.db)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let mut active: users::ActiveModel = user.clone().into();
    let changed = apply_changes(&user, req, &mut active);
    if changed.is_empty() {
        return Ok(user.into());
    }

    let updated = active.update(&*state.db).await.map_err(|e| {
        if e.to_string().contains("duplicate key") {
            AppError::Conflict("Email already in use".to_string())
        } else {
            AppError::DatabaseError(e)
        }
    })?;
    let profile: UserProfile = updated.into();

    cache::set(&state.redis, &profile_cache_key(user_id), &profile, CACHE_EXPIRE_USER_PROFILE).await;
    audit::log_profile_update(&*state.db, ctx, user_id, &changed).await;

    Ok(profile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::enums::{UserRole, UserStatus};
    use chrono::Utc;

    fn user() -> users::Model {
        users::Model {
            id: Uuid::new_v4(),
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password_hash: "x".to_string(),
            display_name: Some("Alice".to_string()),
            bio: None,
            role: UserRole::User,
            status: UserStatus::Active,
            created_at: Utc::now().fixed_offset(),
            updated_at: Utc::now().fixed_offset(),
        }
    }

    #[test]
    fn unchanged_values_are_not_reported() {
        let user = user();
        let mut active: users::ActiveModel = user.clone().into();
        let req = UpdateUserRequest {
            display_name: Some(" Alice ".to_string()),
            email: Some("ALICE@example.com".to_string()),
            bio: Some("   ".to_string()),
        };
        assert!(apply_changes(&user, req, &mut active).is_empty());
    }

    #[test]
    fn changed_fields_are_listed_in_order() {
        let user = user();
        let mut active: users::ActiveModel = user.clone().into();
        let req = UpdateUserRequest {
            display_name: Some("Ally".to_string()),
            email: None,
            bio: Some("swing trader".to_string()),
        };
        assert_eq!(apply_changes(&user, req, &mut active), vec!["display_name", "bio"]);
        assert_eq!(active.bio, Set(Some("swing trader".to_string())));
    }
}
