//! 审计日志：一次调用写入一行。
//!
//! 写入失败只记录错误日志并返回 `None`，从不重试，也不会让业务请求失败。

use chrono::Utc;
use sea_orm::*;
use uuid::Uuid;

use crate::{
    core::{
        constants::{AUDIT_DEFAULT_LIMIT, AUDIT_MAX_LIMIT},
        error::AppError,
    },
    dtos::audit::{AuditPage, AuditQuery, Pagination},
    entity::audit_logs,
    extractors::client_ip::ClientIp,
};

/// 操作者与来源，几乎每个写操作都会带上
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditContext {
    pub actor_id: Option<Uuid>,
    pub ip_address: Option<String>,
}

impl AuditContext {
    pub fn new(actor_id: Option<Uuid>, ip: &ClientIp) -> Self {
        Self {
            actor_id,
            ip_address: Some(ip.0.clone()),
        }
    }

    pub fn with_actor(&self, actor_id: Uuid) -> Self {
        Self {
            actor_id: Some(actor_id),
            ip_address: self.ip_address.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub action: String,
    pub entity: String,
    pub entity_id: Option<String>,
    pub summary: Option<String>,
}

impl AuditEntry {
    pub fn new(action: impl Into<String>, entity: impl Into<String>) -> Self {
        Self {
            action: action.into(),
            entity: entity.into(),
            entity_id: None,
            summary: None,
        }
    }

    pub fn entity_id(mut self, id: impl ToString) -> Self {
        self.entity_id = Some(id.to_string());
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }
}

/// 写入一条审计记录，返回新行 ID；失败时返回 `None`
pub async fn record<C>(db: &C, ctx: &AuditContext, entry: AuditEntry) -> Option<i64>
where
    C: ConnectionTrait,
{
    let row = audit_logs::ActiveModel {
        id: NotSet,
        actor_id: Set(ctx.actor_id),
        action: Set(entry.action.clone()),
        entity: Set(entry.entity.clone()),
        entity_id: Set(entry.entity_id),
        summary: Set(entry.summary),
        ip_address: Set(ctx.ip_address.clone()),
        created_at: Set(Utc::now().fixed_offset()),
    };

    match row.insert(db).await {
        Ok(model) => Some(model.id),
        Err(e) => {
            tracing::error!("❌ Audit write failed ({} on {}): {}", entry.action, entry.entity, e);
            None
        }
    }
}

pub async fn log_enroll<C: ConnectionTrait>(
    db: &C,
    ctx: &AuditContext,
    league_id: Uuid,
    league_name: &str,
) -> Option<i64> {
    let entry = AuditEntry::new("league.enroll", "league")
        .entity_id(league_id)
        .summary(format!("joined league '{}'", league_name));
    record(db, ctx, entry).await
}

pub async fn log_approve<C: ConnectionTrait>(
    db: &C,
    ctx: &AuditContext,
    entity: &str,
    entity_id: impl ToString,
    summary: &str,
) -> Option<i64> {
    let entry = AuditEntry::new(format!("{}.approve", entity), entity)
        .entity_id(entity_id)
        .summary(summary);
    record(db, ctx, entry).await
}

pub async fn log_trade_create<C: ConnectionTrait>(
    db: &C,
    ctx: &AuditContext,
    trade_id: Uuid,
    description: &str,
) -> Option<i64> {
    let entry = AuditEntry::new("trade.create", "trade")
        .entity_id(trade_id)
        .summary(description);
    record(db, ctx, entry).await
}

pub async fn log_profile_update<C: ConnectionTrait>(
    db: &C,
    ctx: &AuditContext,
    user_id: Uuid,
    changed_fields: &[&str],
) -> Option<i64> {
    let entry = AuditEntry::new("profile.update", "user")
        .entity_id(user_id)
        .summary(format!("changed: {}", changed_fields.join(", ")));
    record(db, ctx, entry).await
}

pub async fn log_admin_action<C: ConnectionTrait>(
    db: &C,
    ctx: &AuditContext,
    action: &str,
    entity: &str,
    entity_id: impl ToString,
    summary: &str,
) -> Option<i64> {
    let entry = AuditEntry::new(format!("admin.{}", action), entity)
        .entity_id(entity_id)
        .summary(summary);
    record(db, ctx, entry).await
}

/// 登录、登出、邮箱验证
pub async fn log_auth<C: ConnectionTrait>(
    db: &C,
    ctx: &AuditContext,
    action: &str,
    user_id: Uuid,
) -> Option<i64> {
    let entry = AuditEntry::new(format!("auth.{}", action), "user").entity_id(user_id);
    record(db, ctx, entry).await
}

/// limit 默认 50，限制在 1..=200；offset 默认 0
pub fn clamp_window(limit: Option<u64>, offset: Option<u64>) -> (u64, u64) {
    let limit = limit.unwrap_or(AUDIT_DEFAULT_LIMIT).clamp(1, AUDIT_MAX_LIMIT);
    (limit, offset.unwrap_or(0))
}

fn filter_condition(query: &AuditQuery) -> Condition {
    let mut cond = Condition::all();
    if let Some(actor_id) = query.actor_id {
        cond = cond.add(audit_logs::Column::ActorId.eq(actor_id));
    }
    if let Some(entity) = query.entity.as_deref().filter(|s| !s.is_empty()) {
        cond = cond.add(audit_logs::Column::Entity.eq(entity));
    }
    if let Some(action) = query.action.as_deref().filter(|s| !s.is_empty()) {
        cond = cond.add(audit_logs::Column::Action.eq(action));
    }
    cond
}

/// 分页读取，最新的在前
pub async fn list<C>(db: &C, query: &AuditQuery) -> Result<AuditPage, AppError>
where
    C: ConnectionTrait,
{
    let (limit, offset) = clamp_window(query.limit, query.offset);
    let select = audit_logs::Entity::find().filter(filter_condition(query));

    let total = select.clone().count(db).await?;
    let events = select
        .order_by_desc(audit_logs::Column::Id)
        .limit(limit)
        .offset(offset)
        .all(db)
        .await?;

    Ok(AuditPage {
        events,
        pagination: Pagination { total, limit, offset },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn ctx() -> AuditContext {
        AuditContext {
            actor_id: Some(Uuid::new_v4()),
            ip_address: Some("127.0.0.1".to_string()),
        }
    }

    fn model(id: i64, action: &str) -> audit_logs::Model {
        audit_logs::Model {
            id,
            actor_id: None,
            action: action.to_string(),
            entity: "trade".to_string(),
            entity_id: Some("t-1".to_string()),
            summary: None,
            ip_address: Some("127.0.0.1".to_string()),
            created_at: Utc::now().fixed_offset(),
        }
    }

    #[tokio::test]
    async fn record_returns_new_row_id() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[model(41, "trade.create")]])
            .into_connection();
        let id = log_trade_create(&db, &ctx(), Uuid::new_v4(), "LONG 10 AAPL @ 100").await;
        assert_eq!(id, Some(41));
    }

    #[tokio::test]
    async fn record_swallows_database_failure() {
        // 没有预置结果，插入会返回错误
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let id = record(&db, &ctx(), AuditEntry::new("league.enroll", "league")).await;
        assert_eq!(id, None);
    }

    #[test]
    fn clamp_window_applies_defaults_and_bounds() {
        assert_eq!(clamp_window(None, None), (AUDIT_DEFAULT_LIMIT, 0));
        assert_eq!(clamp_window(Some(0), Some(5)), (1, 5));
        assert_eq!(clamp_window(Some(10_000), None), (AUDIT_MAX_LIMIT, 0));
    }

    #[test]
    fn entry_builder_sets_optional_fields() {
        let entry = AuditEntry::new("admin.user.status", "user")
            .entity_id(7)
            .summary("disabled");
        assert_eq!(entry.entity_id.as_deref(), Some("7"));
        assert_eq!(entry.summary.as_deref(), Some("disabled"));
    }

    #[tokio::test]
    async fn list_reports_total_and_window() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[BTreeMap::from([("num_items", Value::BigInt(Some(12)))])]])
            .append_query_results([[model(12, "trade.create"), model(11, "trade.create")]])
            .into_connection();

        let query = AuditQuery {
            action: Some("trade.create".to_string()),
            limit: Some(2),
            ..Default::default()
        };
        let page = list(&db, &query).await.unwrap();

        assert_eq!(page.pagination, Pagination { total: 12, limit: 2, offset: 0 });
        assert_eq!(page.events.len(), 2);
        assert_eq!(page.events[0].id, 12);
    }
}
