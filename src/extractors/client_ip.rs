use std::{convert::Infallible, net::SocketAddr};

use axum::{
    extract::{ConnectInfo, FromRequestParts},
    http::{request::Parts, HeaderMap},
};

use crate::state::AppState;

/// 请求来源 IP，用于限流主体和审计日志
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

/// 取 X-Forwarded-For 从右往左第 `trusted_hops` 个地址。
///
/// 每层代理都把它看到的对端地址追加到末尾，所以只有右侧由我们自己的代理写入的条目可信，
/// 客户端可以在左侧任意伪造。条目数少于代理层数时返回 None，由调用方回退到连接地址。
pub fn forwarded_ip(headers: &HeaderMap, trusted_hops: usize) -> Option<String> {
    let entries: Vec<&str> = headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    let index = entries.len().checked_sub(trusted_hops.max(1))?;
    entries.get(index).map(|s| s.to_string())
}

impl FromRequestParts<AppState> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        if state.config.trust_proxy_headers {
            if let Some(ip) = forwarded_ip(&parts.headers, state.config.trusted_proxy_hops) {
                return Ok(ClientIp(ip));
            }
        }

        let ip = parts
            .extensions
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Ok(ClientIp(ip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xff(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", value.parse().unwrap());
        headers
    }

    #[test]
    fn takes_address_appended_by_proxy() {
        assert_eq!(forwarded_ip(&xff(" 203.0.113.7 , 10.0.0.2"), 1).as_deref(), Some("10.0.0.2"));
        assert_eq!(forwarded_ip(&xff("198.51.100.4"), 1).as_deref(), Some("198.51.100.4"));
    }

    #[test]
    fn forged_left_entries_do_not_change_the_key() {
        let honest = forwarded_ip(&xff("198.51.100.4"), 1);
        let forged = forwarded_ip(&xff("1.1.1.1, 198.51.100.4"), 1);
        let forged_again = forwarded_ip(&xff("2.2.2.2, 3.3.3.3, 198.51.100.4"), 1);
        assert_eq!(honest, forged);
        assert_eq!(honest, forged_again);
    }

    #[test]
    fn counts_trusted_hops_from_the_right() {
        let headers = xff("6.6.6.6, 198.51.100.4, 10.0.0.2");
        assert_eq!(forwarded_ip(&headers, 2).as_deref(), Some("198.51.100.4"));
        // 条目少于代理层数，说明链路不完整
        assert_eq!(forwarded_ip(&xff("10.0.0.2"), 2), None);
    }

    #[test]
    fn missing_or_empty_header_yields_none() {
        assert_eq!(forwarded_ip(&HeaderMap::new(), 1), None);
        assert_eq!(forwarded_ip(&xff(" , "), 1), None);
    }
}
