use chrono::{DateTime, FixedOffset, Utc};
use sea_orm::*;
use uuid::Uuid;

use crate::{
    core::{enums::TradeSide, error::AppError},
    dtos::{
        response::Paged,
        trade::{CreateTradeRequest, TradeListQuery, TradeView, UpdateTradeRequest},
        PageQuery,
    },
    entity::trades,
    services::{
        audit::{self, AuditContext, AuditEntry},
        league,
    },
    state::AppState,
};

/// 已实现盈亏：多头 `(exit - entry) * qty`，空头 `(entry - exit) * qty`，再扣除手续费
pub fn pnl(side: TradeSide, quantity: f64, entry: f64, exit: f64, fees: f64) -> f64 {
    let gross = match side {
        TradeSide::Long => (exit - entry) * quantity,
        TradeSide::Short => (entry - exit) * quantity,
    };
    gross - fees
}

/// 持仓中的交易没有已实现盈亏
pub fn realized_pnl(trade: &trades::Model) -> Option<f64> {
    trade
        .exit_price
        .map(|exit| pnl(trade.side, trade.quantity, trade.entry_price, exit, trade.fees))
}

/// 平仓时间规则：有出场价必须有平仓时间（缺省为当前时间），没有出场价不能有平仓时间，
/// 平仓时间不得早于开仓时间。
fn resolve_close(
    exit_price: Option<f64>,
    closed_at: Option<DateTime<FixedOffset>>,
    opened_at: DateTime<FixedOffset>,
    now: DateTime<FixedOffset>,
) -> Result<Option<DateTime<FixedOffset>>, AppError> {
    let closed_at = match (exit_price, closed_at) {
        (None, None) => return Ok(None),
        (None, Some(_)) => {
            return Err(AppError::BadRequest("closed_at requires an exit_price".to_string()));
        }
        (Some(_), Some(c)) => c,
        (Some(_), None) => now,
    };
    if closed_at < opened_at {
        return Err(AppError::BadRequest("closed_at cannot be before opened_at".to_string()));
    }
    Ok(Some(closed_at))
}

fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

async fn find_owned(db: &DatabaseConnection, user_id: Uuid, trade_id: Uuid) -> Result<trades::Model, AppError> {
    trades::Entity::find_by_id(trade_id)
        .filter(trades::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Trade not found".to_string()))
}

pub async fn create(
    state: &AppState,
    user_id: Uuid,
    req: CreateTradeRequest,
    ctx: &AuditContext,
) -> Result<TradeView, AppError> {
    if let Some(league_id) = req.league_id {
        league::require_member(&*state.db, league_id, user_id).await?;
    }

    let now = Utc::now().fixed_offset();
    let opened_at = req.opened_at.unwrap_or(now);
    let closed_at = resolve_close(req.exit_price, req.closed_at, opened_at, now)?;

    let trade = trades::ActiveModel {
        id: Set(Uuid::new_v4()),
        user_id: Set(user_id),
        league_id: Set(req.league_id),
        symbol: Set(normalize_symbol(&req.symbol)),
        side: Set(req.side),
        quantity: Set(req.quantity),
        entry_price: Set(req.entry_price),
        exit_price: Set(req.exit_price),
        fees: Set(req.fees.unwrap_or(0.0)),
        emotion: Set(req.emotion),
        confidence: Set(req.confidence),
        notes: Set(req.notes),
        opened_at: Set(opened_at),
        closed_at: Set(closed_at),
        created_at: Set(now),
        updated_at: Set(now),
    }
    .insert(&*state.db)
    .await?;

    let description = format!(
        "{} {} {} @ {}",
        trade.side.to_string().to_uppercase(),
        trade.quantity,
        trade.symbol,
        trade.entry_price
    );
    audit::log_trade_create(&*state.db, ctx, trade.id, &description).await;

    Ok(trade.into())
}

pub async fn list(
    db: &DatabaseConnection,
    user_id: Uuid,
    query: TradeListQuery,
) -> Result<Paged<TradeView>, AppError> {
    let (page_idx, per_page) = PageQuery { page: query.page, per_page: query.per_page }.resolve();

    let mut select = trades::Entity::find().filter(trades::Column::UserId.eq(user_id));
    if let Some(symbol) = query.symbol.as_deref().filter(|s| !s.trim().is_empty()) {
        select = select.filter(trades::Column::Symbol.eq(normalize_symbol(symbol)));
    }
    if let Some(league_id) = query.league_id {
        select = select.filter(trades::Column::LeagueId.eq(league_id));
    }
    match query.open {
        Some(true) => select = select.filter(trades::Column::ExitPrice.is_null()),
        Some(false) => select = select.filter(trades::Column::ExitPrice.is_not_null()),
        None => {}
    }

    let paginator = select
        .order_by_desc(trades::Column::OpenedAt)
        .paginate(db, per_page);
    let total = paginator.num_items().await?;
    let items = paginator
        .fetch_page(page_idx)
        .await?
        .into_iter()
        .map(TradeView::from)
        .collect();

    Ok(Paged { items, page: page_idx + 1, per_page, total })
}

pub async fn get(db: &DatabaseConnection, user_id: Uuid, trade_id: Uuid) -> Result<TradeView, AppError> {
    Ok(find_owned(db, user_id, trade_id).await?.into())
}

pub async fn update(
    state: &AppState,
    user_id: Uuid,
    trade_id: Uuid,
    req: UpdateTradeRequest,
) -> Result<TradeView, AppError> {
    let trade = find_owned(&*state.db, user_id, trade_id).await?;

    let exit_price = req.exit_price.or(trade.exit_price);
    let requested_close = req.closed_at.or(trade.closed_at);
    let closed_at = resolve_close(exit_price, requested_close, trade.opened_at, Utc::now().fixed_offset())?;

    let mut active: trades::ActiveModel = trade.into();
    if let Some(symbol) = req.symbol {
        active.symbol = Set(normalize_symbol(&symbol));
    }
    if let Some(side) = req.side {
        active.side = Set(side);
    }
    if let Some(quantity) = req.quantity {
        active.quantity = Set(quantity);
    }
    if let Some(entry_price) = req.entry_price {
        active.entry_price = Set(entry_price);
    }
    if let Some(fees) = req.fees {
        active.fees = Set(fees);
    }
    if req.emotion.is_some() {
        active.emotion = Set(req.emotion);
    }
    if req.confidence.is_some() {
        active.confidence = Set(req.confidence);
    }
    if req.notes.is_some() {
        active.notes = Set(req.notes);
    }
    active.exit_price = Set(exit_price);
    active.closed_at = Set(closed_at);

    let updated = active.update(&*state.db).await?;
    Ok(updated.into())
}

pub async fn delete(
    state: &AppState,
    user_id: Uuid,
    trade_id: Uuid,
    ctx: &AuditContext,
) -> Result<(), AppError> {
    let trade = find_owned(&*state.db, user_id, trade_id).await?;
    trades::Entity::delete_by_id(trade.id).exec(&*state.db).await?;

    let entry = AuditEntry::new("trade.delete", "trade")
        .entity_id(trade.id)
        .summary(trade.symbol);
    audit::record(&*state.db, ctx, entry).await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn long_and_short_pnl() {
        assert_eq!(pnl(TradeSide::Long, 10.0, 100.0, 110.0, 0.0), 100.0);
        assert_eq!(pnl(TradeSide::Short, 10.0, 100.0, 110.0, 0.0), -100.0);
        assert_eq!(pnl(TradeSide::Short, 2.0, 50.0, 40.0, 1.5), 18.5);
    }

    #[test]
    fn exit_price_defaults_close_time_to_now() {
        let opened = Utc::now().fixed_offset() - Duration::hours(1);
        let now = Utc::now().fixed_offset();
        assert_eq!(resolve_close(Some(1.0), None, opened, now).unwrap(), Some(now));
        assert_eq!(resolve_close(None, None, opened, now).unwrap(), None);
    }

    #[test]
    fn close_time_requires_exit_and_ordering() {
        let opened = Utc::now().fixed_offset();
        let before = opened - Duration::minutes(5);
        assert!(matches!(resolve_close(None, Some(opened), opened, opened), Err(AppError::BadRequest(_))));
        assert!(matches!(resolve_close(Some(1.0), Some(before), opened, opened), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn symbols_are_upper_cased() {
        assert_eq!(normalize_symbol(" brk.b "), "BRK.B");
    }

    #[tokio::test]
    async fn other_users_trade_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<trades::Model>::new()])
            .into_connection();

        let result = find_owned(&db, Uuid::new_v4(), Uuid::new_v4()).await;
        assert!(matches!(result, Err(AppError::NotFound(ref m)) if m == "Trade not found"));

        // 归属条件必须落在同一条查询里
        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("user_id"));
    }
}
