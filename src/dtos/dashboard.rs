use serde::Serialize;

use crate::dtos::{league::LeagueView, trade::TradeView};

#[derive(Serialize, Debug, Default, Clone, PartialEq)]
pub struct TradeStats {
    pub total: u64,
    pub open: u64,
    pub closed: u64,
    pub wins: u64,
    pub losses: u64,
    /// 已平仓交易中盈利的比例，0-100
    pub win_rate: f64,
    pub realized_pnl: f64,
}

#[derive(Serialize, Debug)]
pub struct Dashboard {
    pub username: String,
    pub display_name: Option<String>,
    pub stats: TradeStats,
    pub leagues: Vec<LeagueView>,
    pub recent_trades: Vec<TradeView>,
}
