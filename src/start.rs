// src/start.rs
use std::{net::SocketAddr, sync::Arc, time::Duration};
use migration::{Migrator, MigratorTrait};
use sea_orm::{Database, ConnectOptions};
use secrecy::ExposeSecret;
use tokio::net::TcpListener;
use tokio::signal;

use crate::{
    core::{config::Config, log},
    routes,
    services::mailer::{LogMailer, Mailer, SmtpMailer},
    state::AppState,
    utils::limiter::RateLimiter,
};

/// 启动并运行应用程序：
/// 1. 加载配置并初始化日志
/// 2. 建立数据库连接池，按配置执行迁移
/// 3. 建立 Redis 连接
/// 4. 创建限流器并启动过期计数清理任务
/// 5. 选择邮件出口（SMTP 或日志）
/// 6. 启动 HTTP 服务器，监听系统信号以实现优雅关闭
pub async fn run() {
    // 1. 加载配置
    // 读取 .env 和环境变量，缺少必填项（DATABASE_URL 等）时直接 panic
    let config = Config::new();

    // 2. 初始化日志
    // guard 必须存活到进程结束，否则文件日志的缓冲区不会被刷新
    let _guard = log::init(&config.rust_log);
    tracing::info!("🔍 Config loaded successfully.");

    // 3. 数据库连接池
    // sqlx 自带的逐条 SQL 日志关闭，慢查询由 TraceLayer 的请求耗时体现
    let mut opt = ConnectOptions::new(config.database_url.expose_secret());
    opt.max_connections(100)
        .min_connections(5)
        .connect_timeout(Duration::from_secs(10))
        .sqlx_logging(false);

    // 连接在限流器和 AppState 之间共享，用 Arc 包装
    let db = Arc::new(
        Database::connect(opt)
            .await
            .expect("❌ Failed to connect to Database"),
    );
    tracing::info!("✅ Database connected.");

    // 4. 数据库迁移
    // 多实例部署时只让一个实例开启 RUN_MIGRATIONS，其余实例设为 false
    if config.run_migrations {
        Migrator::up(db.as_ref(), None)
            .await
            .expect("❌ Failed to run migrations");
        tracing::info!("✅ Migrations applied.");
    }

    // 5. Redis
    // ConnectionManager 自带断线重连，克隆开销很小，每个请求各取一份
    let client = redis::Client::open(config.redis_url.expose_secret())
        .expect("❌ Invalid Redis URL");
    let redis_manager = client.get_connection_manager()
        .await
        .expect("❌ Failed to connect to Redis");
    tracing::info!("✅ Redis connected.");

    // 6. 限流器
    // Database 后端与服务共用连接池；清理任务每个窗口跑一次
    let limiter = RateLimiter::from_config(&config, db.clone());
    spawn_limiter_purge(limiter.clone());
    tracing::info!(
        "✅ Rate limiter ready ({:?}, {}s window).",
        config.rate_limit_backend,
        limiter.window_secs()
    );

    // 7. 邮件出口
    // 配置了 SMTP_HOST 才真正发信，否则写日志，开发环境可直接复制验证链接
    let mailer: Arc<dyn Mailer> = match config.smtp_host.as_deref() {
        Some(host) => {
            let smtp = SmtpMailer::new(&config, host).expect("❌ Invalid SMTP configuration");
            tracing::info!("📧 Mail via SMTP relay {}:{}", host, config.smtp_port);
            Arc::new(smtp)
        }
        None => {
            tracing::info!("📧 SMTP_HOST not set, emails are written to the log.");
            Arc::new(LogMailer)
        }
    };

    // 8. 解析监听地址
    let addr: SocketAddr = format!("{}:{}", config.server_host, config.server_port)
        .parse()
        .expect("❌ Invalid address configuration");

    // 9. 组装共享状态（配置在 AppState::new 中被 Arc 包装）
    let state = AppState::new(db, redis_manager, config, limiter, mailer);

    tracing::info!("🚀 Server listening on http://{}", addr);

    // 10. 绑定端口并启动服务
    let listener = TcpListener::bind(addr)
        .await
        .expect("❌ Failed to bind address");
    let app = routes::create_router(state);

    // ConnectInfo 提供客户端地址，用于限流主体和审计日志
    // 收到关闭信号后停止接收新连接，等待进行中的请求完成
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("❌ Server error");
}

/// 每个窗口清理一次过期的限流计数
fn spawn_limiter_purge(limiter: RateLimiter) {
    let period = Duration::from_secs(limiter.window_secs() as u64);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            // 第一次 tick 立即返回，启动时顺带清理上次运行遗留的计数
            ticker.tick().await;
            // 清理失败只告警，下个窗口会重试
            match limiter.purge_expired().await {
                Ok(0) => {}
                Ok(n) => tracing::debug!("🧹 Purged {} expired rate-limit rows", n),
                Err(e) => tracing::warn!("⚠️ Rate-limit purge failed: {}", e),
            }
        }
    });
}

/// 等待 Ctrl+C 或 SIGTERM
async fn shutdown_signal() {
    // 本地开发：Ctrl+C
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    // 容器环境：docker stop / k8s 发送 SIGTERM
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    // 非 Unix 平台没有 SIGTERM，永远挂起
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    // 任一信号先到即返回
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("🛑 Signal received, starting graceful shutdown...");
}
