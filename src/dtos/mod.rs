use std::sync::LazyLock;
use regex::Regex;
use serde::Deserialize;

use crate::core::constants::{DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};

pub mod audit;
pub mod auth;
pub mod dashboard;
pub mod league;
pub mod response;
pub mod submission;
pub mod trade;
pub mod user;

/// 用户名：字母数字下划线，3-32 位
pub static USERNAME_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_]{3,32}$").expect("Invalid Regex")
});

/// 交易标的：大写字母、数字以及 . - / 分隔符（如 BRK.B、BTC/USDT）
pub static SYMBOL_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9./\-]{0,23}$").expect("Invalid Regex")
});

/// 通用分页查询参数，page 从 1 开始
#[derive(Debug, Deserialize, Default, Clone, Copy)]
pub struct PageQuery {
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

impl PageQuery {
    /// 返回 (页码索引, 每页数量)，页码索引从 0 开始
    pub fn resolve(&self) -> (u64, u64) {
        let per_page = self.per_page.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
        let page = self.page.unwrap_or(1).max(1) - 1;
        (page, per_page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_query_defaults_and_clamps() {
        assert_eq!(PageQuery::default().resolve(), (0, DEFAULT_PAGE_SIZE));
        let q = PageQuery { page: Some(0), per_page: Some(10_000) };
        assert_eq!(q.resolve(), (0, MAX_PAGE_SIZE));
        let q = PageQuery { page: Some(3), per_page: Some(0) };
        assert_eq!(q.resolve(), (2, 1));
    }

    #[test]
    fn symbol_regex_accepts_common_tickers() {
        for s in ["AAPL", "BRK.B", "BTC/USDT", "es-mini"] {
            assert!(SYMBOL_REGEX.is_match(s), "{s}");
        }
        assert!(!SYMBOL_REGEX.is_match(""));
        assert!(!SYMBOL_REGEX.is_match("DROP TABLE"));
    }

    #[test]
    fn username_regex_rejects_spaces() {
        assert!(USERNAME_REGEX.is_match("trader_01"));
        assert!(!USERNAME_REGEX.is_match("bad name"));
        assert!(!USERNAME_REGEX.is_match("ab"));
    }
}
