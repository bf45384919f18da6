use redis::{aio::ConnectionManager, AsyncCommands};
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use crate::core::error::AppError;

/// Cache-Aside 读取：命中直接返回；未命中或 Redis 不可用时调用 `load`，再尽力回填。
///
/// Redis 故障只记录日志，不影响请求结果。
pub async fn get_or_fetch<T, F, Fut>(
    manager: &ConnectionManager,
    key: &str,
    ttl_seconds: u64,
    load: F,
) -> Result<T, AppError>
where
    T: Serialize + DeserializeOwned + Send + Sync,
    F: FnOnce() -> Fut + Send,
    Fut: Future<Output = Result<T, AppError>> + Send,
{
    let mut redis = manager.clone();

    match redis.get::<_, Option<String>>(key).await {
        Ok(Some(raw)) => match serde_json::from_str::<T>(&raw) {
            Ok(value) => {
                tracing::debug!("✅ Cache hit: {}", key);
                return Ok(value);
            }
            Err(e) => tracing::warn!("⚠️ Stale cache entry {} could not be decoded: {}", key, e),
        },
        Ok(None) => tracing::debug!("🔍 Cache miss: {}", key),
        Err(e) => tracing::warn!("⚠️ Redis get failed for {}: {}", key, e),
    }

    let value = load().await?;
    set(manager, key, &value, ttl_seconds).await;
    Ok(value)
}

/// 覆盖写入（Write Through 时使用）
pub async fn set<T>(manager: &ConnectionManager, key: &str, value: &T, ttl_seconds: u64)
where
    T: Serialize + Send + Sync,
{
    let raw = match serde_json::to_string(value) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::error!("❌ Cache serialization failed for {}: {}", key, e);
            return;
        }
    };

    let mut redis = manager.clone();
    if let Err(e) = redis.set_ex::<_, _, ()>(key, raw, ttl_seconds).await {
        tracing::warn!("⚠️ Redis set failed for {}: {}", key, e);
    }
}

/// 失效：管理员修改用户状态等场景下删除缓存
pub async fn invalidate(manager: &ConnectionManager, key: &str) {
    let mut redis = manager.clone();
    if let Err(e) = redis.del::<_, ()>(key).await {
        tracing::warn!("⚠️ Redis delete failed for {}: {}", key, e);
    } else {
        tracing::debug!("🗑️ Cache invalidated: {}", key);
    }
}
