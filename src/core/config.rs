use config::{Config as ConfigLoader, ConfigError, Environment};
use dotenvy::dotenv;
use secrecy::SecretString;
use serde::Deserialize;

/// 限流计数的存储后端
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitBackend {
    /// rate_limits 表，多实例共享
    Database,
    /// 进程内计数，仅适合单实例
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Postgres 连接串（敏感信息）
    #[serde(alias = "DATABASE_URL")]
    pub database_url: SecretString,

    /// Redis 连接串（敏感信息）
    #[serde(alias = "REDIS_URL")]
    pub redis_url: SecretString,

    /// JWT 签名密钥（敏感信息）
    #[serde(alias = "JWT_SECRET")]
    pub jwt_secret: SecretString,

    #[serde(default = "default_port", alias = "SERVER_PORT")]
    pub server_port: u16,

    #[serde(default = "default_host", alias = "SERVER_HOST")]
    pub server_host: String,

    #[serde(default = "default_log", alias = "RUST_LOG")]
    pub rust_log: String,

    #[serde(default = "default_jwt_exp", alias = "JWT_EXPIRATION")]
    pub jwt_expiration: i64,

    #[serde(default = "default_refresh_exp", alias = "REFRESH_TOKEN_EXPIRATION")]
    pub refresh_token_expiration: i64,

    #[serde(default = "default_verify_ttl", alias = "EMAIL_VERIFICATION_TTL")]
    pub email_verification_ttl: u64,

    /// 生成邮箱验证链接时使用的站点地址
    #[serde(default = "default_base_url", alias = "APP_BASE_URL")]
    pub app_base_url: String,

    #[serde(default = "default_rate_backend", alias = "RATE_LIMIT_BACKEND")]
    pub rate_limit_backend: RateLimitBackend,

    #[serde(default = "default_rate_window", alias = "RATE_LIMIT_WINDOW_SECS")]
    pub rate_limit_window_secs: i64,

    #[serde(default = "default_upload_dir", alias = "UPLOAD_DIR")]
    pub upload_dir: String,

    #[serde(default = "default_max_upload", alias = "MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: usize,

    #[serde(default = "default_true", alias = "COOKIE_SECURE")]
    pub cookie_secure: bool,

    /// 仅在部署于反向代理之后时开启，否则 X-Forwarded-For 可被伪造
    #[serde(default, alias = "TRUST_PROXY_HEADERS")]
    pub trust_proxy_headers: bool,

    /// 受信任代理的层数。X-Forwarded-For 从右往左数第 N 个地址视为客户端，
    /// 更左侧的条目由客户端自行填写，不可信
    #[serde(default = "default_proxy_hops", alias = "TRUSTED_PROXY_HOPS")]
    pub trusted_proxy_hops: usize,

    #[serde(default = "default_true", alias = "RUN_MIGRATIONS")]
    pub run_migrations: bool,

    /// 未配置时邮件只写入日志
    #[serde(default, alias = "SMTP_HOST")]
    pub smtp_host: Option<String>,

    #[serde(default = "default_smtp_port", alias = "SMTP_PORT")]
    pub smtp_port: u16,

    #[serde(default, alias = "SMTP_USERNAME")]
    pub smtp_username: Option<String>,

    /// SMTP 密码（敏感信息）
    #[serde(default, alias = "SMTP_PASSWORD")]
    pub smtp_password: Option<SecretString>,

    #[serde(default = "default_mail_from", alias = "MAIL_FROM")]
    pub mail_from: String,
}

impl Config {
    /// 加载配置：
    /// - 支持 `.env`
    /// - 优先从环境变量加载
    pub fn new() -> Self {
        dotenv().ok();

        match Self::from_env() {
            Ok(config) => config,
            Err(e) => panic!("❌ Failed to load configuration: {e}"),
        }
    }

    fn from_env() -> Result<Self, ConfigError> {
        // Environment::default() 会把 `FOO__BAR=baz` 映射到 `foo.bar=baz`，
        // try_parsing(true) 会把 "3000" 解析成数字
        ConfigLoader::builder()
            .add_source(Environment::default().try_parsing(true))
            .build()?
            .try_deserialize()
    }
}

// --- 默认值函数 ---
fn default_port() -> u16 {
    3000
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_log() -> String {
    "info".to_string()
}
fn default_jwt_exp() -> i64 {
    3600
} // 1 hour
fn default_refresh_exp() -> i64 {
    86400 * 7
} // 7 days
fn default_verify_ttl() -> u64 {
    86400
}
fn default_base_url() -> String {
    "http://localhost:3000".to_string()
}
fn default_rate_backend() -> RateLimitBackend {
    RateLimitBackend::Database
}
fn default_rate_window() -> i64 {
    60
}
fn default_upload_dir() -> String {
    "uploads".to_string()
}
fn default_max_upload() -> usize {
    5 * 1024 * 1024
}
fn default_true() -> bool {
    true
}
fn default_proxy_hops() -> usize {
    1
}
fn default_smtp_port() -> u16 {
    587
} // STARTTLS
fn default_mail_from() -> String {
    "Trading League <no-reply@localhost>".to_string()
}

#[cfg(test)]
impl Config {
    /// 单元测试用的最小配置
    pub fn for_tests() -> Self {
        Self {
            database_url: SecretString::from("postgres://localhost/test".to_string()),
            redis_url: SecretString::from("redis://localhost".to_string()),
            jwt_secret: SecretString::from("test-secret-please-ignore".to_string()),
            server_port: default_port(),
            server_host: default_host(),
            rust_log: default_log(),
            jwt_expiration: default_jwt_exp(),
            refresh_token_expiration: default_refresh_exp(),
            email_verification_ttl: default_verify_ttl(),
            app_base_url: default_base_url(),
            rate_limit_backend: RateLimitBackend::Memory,
            rate_limit_window_secs: default_rate_window(),
            upload_dir: default_upload_dir(),
            max_upload_bytes: default_max_upload(),
            cookie_secure: false,
            trust_proxy_headers: false,
            trusted_proxy_hops: default_proxy_hops(),
            run_migrations: false,
            smtp_host: None,
            smtp_port: default_smtp_port(),
            smtp_username: None,
            smtp_password: None,
            mail_from: default_mail_from(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_backend_parses_lowercase() {
        let backend: RateLimitBackend = serde_json::from_str("\"memory\"").unwrap();
        assert_eq!(backend, RateLimitBackend::Memory);
        let backend: RateLimitBackend = serde_json::from_str("\"database\"").unwrap();
        assert_eq!(backend, RateLimitBackend::Database);
    }
}
