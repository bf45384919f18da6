use migration::{Migrator, MigratorTrait};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct CheckResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 对外只给出固定文案，底层错误（可能含主机名、连接串）只写日志
const UNAVAILABLE: &str = "unavailable";

impl CheckResult {
    fn from_result<E: std::fmt::Display>(component: &str, result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self { ok: true, error: None },
            Err(e) => {
                tracing::error!("🩺 {} check failed: {}", component, e);
                Self { ok: false, error: Some(UNAVAILABLE.to_string()) }
            }
        }
    }
}

#[derive(Serialize, Debug)]
pub struct HealthReport {
    pub healthy: bool,
    pub database: CheckResult,
    pub redis: CheckResult,
    pub migrations: CheckResult,
    /// 尚未执行的迁移名
    pub pending_migrations: Vec<String>,
}

impl HealthReport {
    fn new(database: CheckResult, redis: CheckResult, pending: Result<Vec<String>, ()>) -> Self {
        let (migrations, pending_migrations) = match pending {
            Ok(names) if names.is_empty() => (CheckResult { ok: true, error: None }, names),
            Ok(names) => (
                CheckResult {
                    ok: false,
                    error: Some(format!("{} pending migration(s)", names.len())),
                },
                names,
            ),
            Err(()) => (CheckResult { ok: false, error: Some(UNAVAILABLE.to_string()) }, Vec::new()),
        };

        Self {
            healthy: database.ok && redis.ok && migrations.ok,
            database,
            redis,
            migrations,
            pending_migrations,
        }
    }
}

pub async fn check(state: &AppState) -> HealthReport {
    let database = CheckResult::from_result("database", state.db.ping().await);

    let mut redis = state.redis.clone();
    let redis = CheckResult::from_result(
        "redis",
        redis::cmd("PING")
            .query_async::<String>(&mut redis)
            .await
            .map(|_| ()),
    );

    let pending = Migrator::get_pending_migrations(&*state.db)
        .await
        .map(|list| list.iter().map(|m| m.name().to_string()).collect())
        .map_err(|e| tracing::error!("🩺 migration check failed: {}", e));

    let report = HealthReport::new(database, redis, pending);
    if !report.healthy {
        tracing::warn!("🩺 Health check failed: {:?}", report);
    }
    report
}
