pub mod cache;
pub mod cookie;
pub mod limiter;
pub mod token;

/// 限流宏：超出限制时直接从 Handler 返回 429。
/// 用法: `rate_limit!(&state.limiter, "auth:login", &actor_key, 5);`
/// 参数依次为：限流器、bucket、限流主体、窗口内最大请求数。
#[macro_export]
macro_rules! rate_limit {
    ($limiter:expr, $bucket:expr, $actor:expr, $limit:expr) => {
        if let Err(e) = ($limiter).enforce($bucket, $actor, $limit).await {
            return Err(e.into());
        }
    };
}
