// ==========================================
// Redis Key 前缀
// ==========================================

/// Refresh Token
pub const REDIS_PREFIX_REFRESH: &str = "refresh_token:";

/// 已注销的 Access Token
pub const REDIS_PREFIX_BLACKLIST: &str = "blacklist:token:";

/// 已轮换的 Refresh Token，值的前缀
pub const REDIS_PREFIX_USED: &str = "USED:";

pub const REDIS_PREFIX_USER_PROFILE: &str = "cache:user:profile:";

/// 邮箱验证令牌 -> 用户 ID
pub const REDIS_PREFIX_EMAIL_VERIFY: &str = "verify_email:";

// ==========================================
// 会话 Cookie / CSRF
// ==========================================

pub const ACCESS_TOKEN_COOKIE: &str = "access_token";
pub const CSRF_COOKIE: &str = "csrf_token";
pub const CSRF_HEADER: &str = "x-csrf-token";
pub const CSRF_TOKEN_LEN: usize = 48;

// ==========================================
// 业务常量
// ==========================================

/// Token 轮换宽限期（秒）
pub const ROTATION_GRACE_PERIOD: u64 = 10;

/// 用户资料缓存过期时间（24小时）
pub const CACHE_EXPIRE_USER_PROFILE: u64 = 60 * 60 * 24;

pub const EMAIL_VERIFY_TOKEN_LEN: usize = 40;
pub const LEAGUE_JOIN_CODE_LEN: usize = 8;

/// 分页参数
pub const DEFAULT_PAGE_SIZE: u64 = 20;
pub const MAX_PAGE_SIZE: u64 = 100;

/// 审计日志分页
pub const AUDIT_DEFAULT_LIMIT: u64 = 50;
pub const AUDIT_MAX_LIMIT: u64 = 200;

/// 上传文件允许的扩展名
pub const ALLOWED_UPLOAD_EXTENSIONS: &[&str] = &["pdf", "png", "jpg", "jpeg", "csv"];

pub const DASHBOARD_RECENT_TRADES: u64 = 5;
