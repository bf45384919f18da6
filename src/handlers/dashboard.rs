//! 服务端渲染的仪表盘页面。错误统一以纯文本输出，包括 429。

use std::fmt::Write;

use axum::{extract::State, http::HeaderMap, response::Html};

use crate::{
    core::error::{AppError, PageError},
    dtos::{auth::Claims, dashboard::Dashboard},
    extractors::{claims::access_token, client_ip::ClientIp},
    middleware::auth::ensure_not_revoked,
    rate_limit,
    services::dashboard as DashboardService,
    state::AppState,
    utils::limiter::actor_key,
};

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn render(dashboard: &Dashboard) -> String {
    let name = dashboard.display_name.as_deref().unwrap_or(&dashboard.username);
    let s = &dashboard.stats;

    let mut html = String::new();
    let _ = write!(
        html,
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>Dashboard</title></head><body>\
         <h1>{}</h1>\
         <section><h2>Stats</h2><ul>\
         <li>Total trades: {}</li><li>Open: {}</li><li>Closed: {}</li>\
         <li>Wins: {}</li><li>Losses: {}</li><li>Win rate: {:.1}%</li>\
         <li>Realized PnL: {:.2}</li></ul></section>",
        escape_html(name),
        s.total,
        s.open,
        s.closed,
        s.wins,
        s.losses,
        s.win_rate,
        s.realized_pnl,
    );

    html.push_str("<section><h2>Leagues</h2><ul>");
    for league in &dashboard.leagues {
        let _ = write!(html, "<li>{} ({} members)</li>", escape_html(&league.name), league.member_count);
    }
    html.push_str("</ul></section><section><h2>Recent trades</h2><ul>");
    for trade in &dashboard.recent_trades {
        let pnl = trade
            .realized_pnl
            .map(|p| format!("{:.2}", p))
            .unwrap_or_else(|| "open".to_string());
        let _ = write!(
            html,
            "<li>{} {} x {} @ {}: {}</li>",
            trade.side,
            escape_html(&trade.symbol),
            trade.quantity,
            trade.entry_price,
            pnl
        );
    }
    html.push_str("</ul></section></body></html>");
    html
}

/// 不挂 `auth_middleware`（它输出 JSON），黑名单检查在这里完成
pub async fn page(
    claims: Result<Claims, AppError>,
    ip: ClientIp,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Html<String>, PageError> {
    let claims = claims?;
    if let Some(token) = access_token(&headers) {
        ensure_not_revoked(&state.redis, &token).await?;
    }
    rate_limit!(state.limiter, "page:dashboard", &actor_key(Some(&claims.sub), &ip.0), 30);

    let dashboard = DashboardService::build(&state, claims.user_id()?).await?;
    Ok(Html(render(&dashboard)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtos::dashboard::TradeStats;
    use axum::{http::{header, StatusCode}, response::IntoResponse};

    #[test]
    fn revoked_session_is_plain_text() {
        let response = PageError::from(AppError::AuthError("Token has been revoked".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
    }

    #[test]
    fn markup_is_escaped() {
        assert_eq!(escape_html("<b>\"Tom\" & 'Jerry'</b>"), "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;");
    }

    #[test]
    fn page_uses_display_name_and_stats() {
        let dashboard = Dashboard {
            username: "alice".to_string(),
            display_name: Some("Alice <3".to_string()),
            stats: TradeStats { total: 2, closed: 1, wins: 1, win_rate: 100.0, realized_pnl: 12.5, ..TradeStats::default() },
            leagues: vec![],
            recent_trades: vec![],
        };
        let html = render(&dashboard);
        assert!(html.contains("<h1>Alice &lt;3</h1>"));
        assert!(html.contains("Win rate: 100.0%"));
        assert!(html.contains("Realized PnL: 12.50"));
    }
}
