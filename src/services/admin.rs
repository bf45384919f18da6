use sea_orm::*;
use uuid::Uuid;

use crate::{
    core::{enums::UserStatus, error::AppError},
    dtos::{response::Paged, user::UserProfile, PageQuery},
    entity::users,
    services::{
        audit::{self, AuditContext},
        user::profile_cache_key,
    },
    state::AppState,
    utils::cache,
};

pub async fn list_users(db: &DatabaseConnection, page: PageQuery) -> Result<Paged<UserProfile>, AppError> {
    let (page_idx, per_page) = page.resolve();
    let paginator = users::Entity::find()
        .order_by_asc(users::Column::CreatedAt)
        .paginate(db, per_page);
    let total = paginator.num_items().await?;
    let items = paginator
        .fetch_page(page_idx)
        .await?
        .into_iter()
        .map(UserProfile::from)
        .collect();

    Ok(Paged { items, page: page_idx + 1, per_page, total })
}

/// 管理员修改账户状态。不能修改自己的状态，避免把唯一的管理员锁在外面。
pub async fn set_user_status(
    state: &AppState,
    admin_id: Uuid,
    target_id: Uuid,
    status: UserStatus,
    ctx: &AuditContext,
) -> Result<UserProfile, AppError> {
    if admin_id == target_id {
        return Err(AppError::Conflict("You cannot change your own status".to_string()));
    }

    let user = users::Entity::find_by_id(target_id)
        .one(&*state.db)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let previous = user.status;
    if previous == status {
        return Ok(user.into());
    }

    let mut active: users::ActiveModel = user.into();
    active.status = Set(status);
    let updated = active.update(&*state.db).await?;

    cache::invalidate(&state.redis, &profile_cache_key(target_id)).await;
    let summary = format!("{} -> {}", previous, status);
    audit::log_admin_action(&*state.db, ctx, "user.status", "user", target_id, &summary).await;
    tracing::info!("🛡️ User {} status changed: {}", target_id, summary);

    Ok(updated.into())
}
