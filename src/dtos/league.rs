use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::entity::leagues;

#[derive(Deserialize, Validate)]
pub struct CreateLeagueRequest {
    #[validate(length(min = 3, max = 80, message = "League name must be 3-80 characters"))]
    pub name: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    #[serde(default = "default_public")]
    pub is_public: bool,

    #[validate(range(min = 2, max = 10000, message = "Max members must be between 2 and 10000"))]
    pub max_members: Option<i32>,
}

fn default_public() -> bool {
    true
}

#[derive(Deserialize, Default)]
pub struct JoinLeagueRequest {
    pub join_code: Option<String>,
}

#[derive(Serialize, Debug)]
pub struct LeagueView {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub owner_id: String,
    pub is_public: bool,
    pub max_members: Option<i32>,
    pub member_count: u64,
    /// 仅对联赛创建者返回
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join_code: Option<String>,
    pub created_at: String,
}

impl LeagueView {
    pub fn new(league: leagues::Model, member_count: u64, reveal_code: bool) -> Self {
        Self {
            id: league.id.to_string(),
            name: league.name,
            description: league.description,
            owner_id: league.owner_id.to_string(),
            is_public: league.is_public,
            max_members: league.max_members,
            member_count,
            join_code: if reveal_code { league.join_code } else { None },
            created_at: league.created_at.to_rfc3339(),
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub user_id: String,
    pub username: String,
    pub closed_trades: u64,
    pub realized_pnl: f64,
}
