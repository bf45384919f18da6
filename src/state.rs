use sea_orm::DatabaseConnection;
use redis::aio::ConnectionManager;
use std::sync::Arc;

use crate::{
    core::config::Config,
    services::mailer::Mailer,
    utils::limiter::RateLimiter,
};

#[derive(Clone)]
pub struct AppState {
    /// 开启 mock 特性时 DatabaseConnection 不可 Clone，统一用 Arc 共享
    pub db: Arc<DatabaseConnection>,
    pub redis: ConnectionManager,
    /// 全局配置，使用 Arc 包装以实现廉价克隆
    pub config: Arc<Config>,
    pub limiter: RateLimiter,
    pub mailer: Arc<dyn Mailer>,
}

impl AppState {
    pub fn new(
        db: Arc<DatabaseConnection>,
        redis: ConnectionManager,
        config: Config,
        limiter: RateLimiter,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            db,
            redis,
            config: Arc::new(config),
            limiter,
            mailer,
        }
    }
}
