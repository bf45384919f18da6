use sea_orm::*;
use uuid::Uuid;

use crate::{
    core::{constants::DASHBOARD_RECENT_TRADES, error::AppError},
    dtos::{
        dashboard::{Dashboard, TradeStats},
        trade::TradeView,
    },
    entity::{trades, users},
    services::{league, trade::realized_pnl},
    state::AppState,
};

/// 汇总交易统计。盈亏为零的平仓交易既不算赢也不算输。
pub fn summarize(all: &[trades::Model]) -> TradeStats {
    let mut stats = TradeStats {
        total: all.len() as u64,
        ..TradeStats::default()
    };

    for trade in all {
        match realized_pnl(trade) {
            None => stats.open += 1,
            Some(pnl) => {
                stats.closed += 1;
                stats.realized_pnl += pnl;
                if pnl > 0.0 {
                    stats.wins += 1;
                } else if pnl < 0.0 {
                    stats.losses += 1;
                }
            }
        }
    }

    if stats.closed > 0 {
        stats.win_rate = stats.wins as f64 * 100.0 / stats.closed as f64;
    }
    stats
}

pub async fn build(state: &AppState, user_id: Uuid) -> Result<Dashboard, AppError> {
    let user = users::Entity::find_by_id(user_id)
        .one(&*state.db)
        .await?
        .ok_or(AppError::NotFound("User not found".to_string()))?;

    let all = trades::Entity::find()
        .filter(trades::Column::UserId.eq(user_id))
        .order_by_desc(trades::Column::OpenedAt)
        .all(&*state.db)
        .await?;

    let stats = summarize(&all);
    let recent_trades = all
        .into_iter()
        .take(DASHBOARD_RECENT_TRADES as usize)
        .map(TradeView::from)
        .collect();
    let leagues = league::memberships(&*state.db, user_id).await?;

    Ok(Dashboard {
        username: user.username,
        display_name: user.display_name,
        stats,
        leagues,
        recent_trades,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::enums::TradeSide;
    use chrono::Utc;

    fn trade(side: TradeSide, entry: f64, exit: Option<f64>) -> trades::Model {
        let now = Utc::now().fixed_offset();
        trades::Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            league_id: None,
            symbol: "AAPL".to_string(),
            side,
            quantity: 10.0,
            entry_price: entry,
            exit_price: exit,
            fees: 0.0,
            emotion: None,
            confidence: None,
            notes: None,
            opened_at: now,
            closed_at: exit.map(|_| now),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn empty_history_has_zero_stats() {
        assert_eq!(summarize(&[]), TradeStats::default());
    }

    #[test]
    fn wins_losses_and_open_positions_are_counted() {
        let all = vec![
            trade(TradeSide::Long, 100.0, Some(110.0)),
            trade(TradeSide::Short, 100.0, Some(105.0)),
            trade(TradeSide::Long, 100.0, Some(102.0)),
            trade(TradeSide::Long, 100.0, None),
        ];
        let stats = summarize(&all);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.open, 1);
        assert_eq!(stats.closed, 3);
        assert_eq!(stats.wins, 2);
        assert_eq!(stats.losses, 1);
        assert_eq!(stats.realized_pnl, 70.0);
        assert!((stats.win_rate - 66.666).abs() < 0.01);
    }
}
