use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt, layer::SubscriberExt, registry, util::SubscriberInitExt, EnvFilter,
};

/// 日志目录，相对于进程工作目录
const LOG_DIR: &str = "logs";
/// 文件名前缀，滚动后形如 `trading-league.log.2026-01-08`
const LOG_FILE: &str = "trading-league.log";

/// RUST_LOG 解析失败时回退到 info，并压低 sqlx 的逐条 SQL 日志
fn build_filter(log_level: &str) -> EnvFilter {
    // 1. 解析 RUST_LOG，例如 "info" 或 "trading_league=debug,tower_http=info"
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|e| {
        // 此时订阅器还没安装，只能写 stderr
        eprintln!("invalid RUST_LOG '{}': {}, falling back to info", log_level, e);
        EnvFilter::new("info")
    });
    // 2. 追加 sqlx 指令。写死的字面量不会解析失败，失败时保留原过滤器
    match "sqlx=warn".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

/// 初始化日志：控制台 + `logs/` 下按天滚动的文件。
/// 返回的 guard 必须持有到进程结束，否则缓冲中的日志会丢失。
pub fn init(log_level: &str) -> WorkerGuard {
    // 1. 文件输出：按天滚动，目录不存在时自动创建
    let file_appender = tracing_appender::rolling::daily(LOG_DIR, LOG_FILE);
    // 写文件放到后台线程，请求线程只负责把日志放进缓冲
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // 2. 文件层：不带颜色码，记录源文件、行号和线程 ID，方便事后排查
    let file_layer = fmt::layer()
        .with_ansi(false)
        .with_writer(non_blocking)
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_target(false);

    // 3. 控制台层：保留颜色和 target，开发时一眼区分模块
    let stdout_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_line_number(true);

    // 4. 组装：过滤器作用于所有层，再注册为全局订阅器（只能调用一次）
    registry()
        .with(build_filter(log_level))
        .with(stdout_layer)
        .with(file_layer)
        .init();

    guard
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlx_is_quieted_on_top_of_requested_level() {
        let filter = build_filter("debug").to_string();
        assert!(filter.contains("debug"));
        assert!(filter.contains("sqlx=warn"));
    }
}
