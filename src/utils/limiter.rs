//! 固定窗口限流。
//!
//! 计数以 `(bucket, actor_key, window_start)` 为键，窗口内单调递增，
//! 进入新窗口后从 0 重新计数。存储层必须保证自增是原子的。

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, Statement, Value,
};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::{
    core::{
        config::{Config, RateLimitBackend},
        error::AppError,
    },
    entity::rate_limits,
};

/// 单次限流检查的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RateDecision {
    pub allowed: bool,
    pub count: i64,
    pub remaining: i64,
}

impl RateDecision {
    fn evaluate(count: i64, limit: u32) -> Self {
        let limit = i64::from(limit);
        Self {
            allowed: count <= limit,
            count,
            remaining: (limit - count).max(0),
        }
    }
}

/// 限流计数的存储后端
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// 原子地为该窗口计数加一并返回新值；窗口行不存在时以 1 创建。
    async fn increment(&self, bucket: &str, actor_key: &str, window_start: i64) -> Result<i64, AppError>;

    /// 删除 window_start 早于 cutoff 的计数，返回删除数量。
    async fn purge_before(&self, cutoff: i64) -> Result<u64, AppError>;
}

/// rate_limits 表。单条 upsert 语句完成"不存在则插入，存在则加一"，并发请求不会丢失计数。
pub struct DatabaseStore {
    db: Arc<DatabaseConnection>,
}

const UPSERT_COUNT_SQL: &str = r#"
INSERT INTO rate_limits (bucket, actor_key, window_start, count)
VALUES ($1, $2, $3, 1)
ON CONFLICT (bucket, actor_key, window_start)
DO UPDATE SET count = rate_limits.count + 1
RETURNING count"#;

impl DatabaseStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RateLimitStore for DatabaseStore {
    async fn increment(&self, bucket: &str, actor_key: &str, window_start: i64) -> Result<i64, AppError> {
        let stmt = Statement::from_sql_and_values(
            self.db.get_database_backend(),
            UPSERT_COUNT_SQL,
            [Value::from(bucket), Value::from(actor_key), Value::from(window_start)],
        );

        let row = self
            .db
            .query_one(stmt)
            .await?
            .ok_or_else(|| AppError::InternalServerError("Rate limit upsert returned no row".to_string()))?;

        let count: i32 = row.try_get("", "count")?;
        Ok(i64::from(count))
    }

    async fn purge_before(&self, cutoff: i64) -> Result<u64, AppError> {
        let res = rate_limits::Entity::delete_many()
            .filter(rate_limits::Column::WindowStart.lt(cutoff))
            .exec(self.db.as_ref())
            .await?;
        Ok(res.rows_affected)
    }
}

type WindowKey = (String, String, i64);

/// 进程内计数，多实例部署时各实例独立计数。
#[derive(Default)]
pub struct MemoryStore {
    counters: Mutex<HashMap<WindowKey, i64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitStore for MemoryStore {
    async fn increment(&self, bucket: &str, actor_key: &str, window_start: i64) -> Result<i64, AppError> {
        let mut counters = self.counters.lock().await;
        let count = counters
            .entry((bucket.to_string(), actor_key.to_string(), window_start))
            .or_insert(0);
        *count += 1;
        Ok(*count)
    }

    async fn purge_before(&self, cutoff: i64) -> Result<u64, AppError> {
        let mut counters = self.counters.lock().await;
        let before = counters.len();
        counters.retain(|(_, _, window_start), _| *window_start >= cutoff);
        Ok((before - counters.len()) as u64)
    }
}

/// 窗口起点（Unix 秒），按 window_secs 对齐
pub fn window_start(now_secs: i64, window_secs: i64) -> i64 {
    now_secs - now_secs.rem_euclid(window_secs)
}

/// 限流主体：`user_id|ip`，未登录时为 `guest|ip`
pub fn actor_key(user_id: Option<&str>, ip: &str) -> String {
    format!("{}|{}", user_id.unwrap_or("guest"), ip)
}

#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    window_secs: i64,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn RateLimitStore>, window_secs: i64) -> Self {
        Self {
            store,
            window_secs: window_secs.max(1),
        }
    }

    pub fn from_config(config: &Config, db: Arc<DatabaseConnection>) -> Self {
        let store: Arc<dyn RateLimitStore> = match config.rate_limit_backend {
            RateLimitBackend::Database => Arc::new(DatabaseStore::new(db)),
            RateLimitBackend::Memory => Arc::new(MemoryStore::new()),
        };
        Self::new(store, config.rate_limit_window_secs)
    }

    pub fn window_secs(&self) -> i64 {
        self.window_secs
    }

    /// 记录一次请求并返回是否放行，不会拒绝请求本身。
    pub async fn hit(&self, bucket: &str, actor_key: &str, limit: u32) -> Result<RateDecision, AppError> {
        self.hit_at(bucket, actor_key, limit, Utc::now()).await
    }

    pub async fn hit_at(
        &self,
        bucket: &str,
        actor_key: &str,
        limit: u32,
        now: DateTime<Utc>,
    ) -> Result<RateDecision, AppError> {
        let start = window_start(now.timestamp(), self.window_secs);
        let count = self.store.increment(bucket, actor_key, start).await?;
        Ok(RateDecision::evaluate(count, limit))
    }

    /// 超出限制时返回 `AppError::RateLimitExceeded`，由调用方直接终止请求。
    pub async fn enforce(&self, bucket: &str, actor_key: &str, limit: u32) -> Result<RateDecision, AppError> {
        self.enforce_at(bucket, actor_key, limit, Utc::now()).await
    }

    pub async fn enforce_at(
        &self,
        bucket: &str,
        actor_key: &str,
        limit: u32,
        now: DateTime<Utc>,
    ) -> Result<RateDecision, AppError> {
        let decision = self.hit_at(bucket, actor_key, limit, now).await?;
        if !decision.allowed {
            tracing::warn!(
                "⛔ Rate limit exceeded: {} on {} ({}/{})",
                actor_key, bucket, decision.count, limit
            );
            return Err(AppError::RateLimitExceeded {
                retry_after: self.retry_after(now),
            });
        }
        Ok(decision)
    }

    /// 距离当前窗口结束的秒数，至少为 1
    pub fn retry_after(&self, now: DateTime<Utc>) -> u64 {
        let now_secs = now.timestamp();
        let end = window_start(now_secs, self.window_secs) + self.window_secs;
        (end - now_secs).max(1) as u64
    }

    /// 清理上一个窗口之前的计数
    pub async fn purge_expired(&self) -> Result<u64, AppError> {
        let current = window_start(Utc::now().timestamp(), self.window_secs);
        self.store.purge_before(current - self.window_secs).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::collections::BTreeMap;

    fn limiter() -> RateLimiter {
        RateLimiter::new(Arc::new(MemoryStore::new()), 60)
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    #[test]
    fn window_start_aligns_to_granularity() {
        assert_eq!(window_start(125, 60), 120);
        assert_eq!(window_start(120, 60), 120);
        assert_eq!(window_start(59, 60), 0);
        assert_eq!(window_start(-1, 60), -60);
    }

    #[test]
    fn actor_key_falls_back_to_guest() {
        assert_eq!(actor_key(Some("42"), "10.0.0.1"), "42|10.0.0.1");
        assert_eq!(actor_key(None, "10.0.0.1"), "guest|10.0.0.1");
    }

    #[tokio::test]
    async fn first_hit_creates_window_with_count_one() {
        let decision = limiter().hit_at("auth:login", "guest|1.1.1.1", 5, at(1_000)).await.unwrap();
        assert_eq!(decision, RateDecision { allowed: true, count: 1, remaining: 4 });
    }

    #[tokio::test]
    async fn blocks_once_count_exceeds_limit() {
        let limiter = limiter();
        for i in 1..=3 {
            let d = limiter.hit_at("auth:login", "a", 3, at(1_000)).await.unwrap();
            assert!(d.allowed);
            assert_eq!(d.count, i);
        }
        let d = limiter.hit_at("auth:login", "a", 3, at(1_010)).await.unwrap();
        assert_eq!(d, RateDecision { allowed: false, count: 4, remaining: 0 });

        // 被拒绝的请求仍然计数
        let d = limiter.hit_at("auth:login", "a", 3, at(1_020)).await.unwrap();
        assert_eq!(d.count, 5);
    }

    #[tokio::test]
    async fn new_window_resets_count() {
        let limiter = limiter();
        for _ in 0..4 {
            limiter.hit_at("b", "a", 3, at(1_019)).await.unwrap();
        }
        // 1019 属于 [960, 1020)，1020 开启新窗口
        let d = limiter.hit_at("b", "a", 3, at(1_020)).await.unwrap();
        assert_eq!(d, RateDecision { allowed: true, count: 1, remaining: 2 });
    }

    #[tokio::test]
    async fn buckets_and_actors_are_independent() {
        let limiter = limiter();
        limiter.hit_at("auth:login", "a", 1, at(0)).await.unwrap();
        assert!(!limiter.hit_at("auth:login", "a", 1, at(0)).await.unwrap().allowed);
        assert!(limiter.hit_at("auth:login", "b", 1, at(0)).await.unwrap().allowed);
        assert!(limiter.hit_at("trade:write", "a", 1, at(0)).await.unwrap().allowed);
    }

    #[tokio::test]
    async fn enforce_returns_retry_after_for_remaining_window() {
        let limiter = limiter();
        limiter.enforce_at("b", "a", 1, at(1_000)).await.unwrap();
        let err = limiter.enforce_at("b", "a", 1, at(1_015)).await.unwrap_err();
        match err {
            // 窗口 [960, 1020)，剩余 5 秒
            AppError::RateLimitExceeded { retry_after } => assert_eq!(retry_after, 5),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn concurrent_hits_do_not_lose_updates() {
        let limiter = limiter();
        let mut handles = Vec::new();
        for _ in 0..50 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(async move {
                limiter.hit_at("b", "a", 100, at(500)).await.unwrap()
            }));
        }
        let mut counts = Vec::new();
        for h in handles {
            counts.push(h.await.unwrap().count);
        }
        counts.sort_unstable();
        assert_eq!(counts, (1..=50).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn memory_store_purges_old_windows() {
        let store = MemoryStore::new();
        store.increment("b", "a", 0).await.unwrap();
        store.increment("b", "a", 60).await.unwrap();
        store.increment("b", "a", 120).await.unwrap();
        assert_eq!(store.purge_before(120).await.unwrap(), 2);
        assert_eq!(store.increment("b", "a", 120).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn database_store_reads_returned_count() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[BTreeMap::from([("count", Value::Int(Some(7)))])]])
            .into_connection();
        let store = DatabaseStore::new(Arc::new(db));
        assert_eq!(store.increment("auth:login", "guest|1.2.3.4", 120).await.unwrap(), 7);
    }
}
