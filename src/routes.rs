use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    trace::{TraceLayer, DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse},
};
use tracing::Level;

// 重命名为 app_middleware 以避免与 axum::middleware 冲突
use crate::{handlers, state::AppState, middleware as app_middleware};

/// Multipart 边界和其他字段的额外余量，文件本身的大小由上传服务精确校验
const MULTIPART_OVERHEAD: usize = 64 * 1024;

/// 创建应用程序路由器。
///
/// # 路由结构
/// 1. `/auth/*` 公开：注册、邮箱验证、登录、刷新、登出、CSRF。
/// 2. `/users/*`、`/leagues/*`、`/trades/*`、`/submissions/*`、`/dashboard` 需登录。
/// 3. `/admin/*` 需管理员权限：材料审核、用户状态、审计日志。
/// 4. `/health` 公开。
///
/// # 中间件
/// - 需登录的 API 路由组：`auth_middleware` 拒绝已登出的 Token；`/dashboard` 在处理函数中自行检查。
/// - 管理员路由：从外到内依次为黑名单检查、管理员权限验证。
/// - 全局：CSRF 校验（只作用于 Cookie 会话的写请求）、请求日志、CORS。
pub fn create_router(state: AppState) -> Router {
    let auth_layer = middleware::from_fn_with_state(state.clone(), app_middleware::auth::auth_middleware);

    let auth_routes = Router::new()
        .route("/register", post(handlers::auth::register))
        .route("/verify", get(handlers::auth::verify_email))
        .route("/resend-verification", post(handlers::auth::resend_verification))
        .route("/login", post(handlers::auth::login))
        .route("/refresh", post(handlers::auth::refresh))
        .route("/logout", post(handlers::auth::logout))
        .route("/csrf", get(handlers::auth::csrf));

    let user_routes = Router::new()
        .route("/me", get(handlers::users::get_me).post(handlers::users::update_me))
        .route("/me/dashboard", get(handlers::users::dashboard))
        .layer(auth_layer.clone());

    let league_routes = Router::new()
        .route("/", get(handlers::leagues::list).post(handlers::leagues::create))
        .route("/{id}", get(handlers::leagues::get))
        .route("/{id}/join", post(handlers::leagues::join))
        .route("/{id}/leave", post(handlers::leagues::leave))
        .route("/{id}/leaderboard", get(handlers::leagues::leaderboard))
        .layer(auth_layer.clone());

    let trade_routes = Router::new()
        .route("/", get(handlers::trades::list).post(handlers::trades::create))
        .route(
            "/{id}",
            get(handlers::trades::get)
                .put(handlers::trades::update)
                .delete(handlers::trades::delete),
        )
        .layer(auth_layer.clone());

    let submission_routes = Router::new()
        .route("/", get(handlers::submissions::list_mine).post(handlers::submissions::upload))
        .layer(DefaultBodyLimit::max(state.config.max_upload_bytes + MULTIPART_OVERHEAD))
        .layer(auth_layer.clone());

    let admin_routes = Router::new()
        .route("/submissions", get(handlers::admin::list_submissions))
        .route("/submissions/{id}/approve", post(handlers::admin::approve_submission))
        .route("/submissions/{id}/reject", post(handlers::admin::reject_submission))
        .route("/users", get(handlers::admin::list_users))
        .route("/users/{id}/status", post(handlers::admin::set_user_status))
        .route("/audit", get(handlers::admin::audit_log))
        // 执行顺序从下往上：先查黑名单，再验证角色
        .layer(middleware::from_fn_with_state(
            state.clone(),
            app_middleware::auth::admin_guard,
        ))
        .layer(auth_layer.clone());

    // 页面错误要以纯文本输出，黑名单检查放在处理函数里，不挂 auth_layer
    let page_routes = Router::new().route("/dashboard", get(handlers::dashboard::page));

    Router::new()
        .route("/health", get(handlers::health::health))
        .nest("/auth", auth_routes)
        .nest("/users", user_routes)
        .nest("/leagues", league_routes)
        .nest("/trades", trade_routes)
        .nest("/submissions", submission_routes)
        .nest("/admin", admin_routes)
        .merge(page_routes)
        .layer(middleware::from_fn(app_middleware::csrf::csrf_guard))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_request(DefaultOnRequest::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO))
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
