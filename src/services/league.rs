use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{sea_query::Expr, *};
use uuid::Uuid;

use crate::{
    core::{constants::LEAGUE_JOIN_CODE_LEN, error::AppError},
    dtos::{
        league::{CreateLeagueRequest, LeaderboardEntry, LeagueView},
        response::Paged,
        PageQuery,
    },
    entity::{league_members, leagues, trades, users},
    services::{
        audit::{self, AuditContext, AuditEntry},
        trade::realized_pnl,
    },
    state::AppState,
    utils::token::{constant_time_eq, random_token},
};

pub async fn is_member<C: ConnectionTrait>(db: &C, league_id: Uuid, user_id: Uuid) -> Result<bool, AppError> {
    let found = league_members::Entity::find()
        .filter(league_members::Column::LeagueId.eq(league_id))
        .filter(league_members::Column::UserId.eq(user_id))
        .one(db)
        .await?;
    Ok(found.is_some())
}

/// 用于给交易或上传材料打联赛标签前的校验
pub async fn require_member<C: ConnectionTrait>(db: &C, league_id: Uuid, user_id: Uuid) -> Result<(), AppError> {
    if is_member(db, league_id, user_id).await? {
        Ok(())
    } else {
        Err(AppError::Forbidden("You are not a member of this league".to_string()))
    }
}

async fn member_counts<C: ConnectionTrait>(db: &C, league_ids: Vec<Uuid>) -> Result<HashMap<Uuid, u64>, AppError> {
    if league_ids.is_empty() {
        return Ok(HashMap::new());
    }
    let rows: Vec<(Uuid, i64)> = league_members::Entity::find()
        .select_only()
        .column(league_members::Column::LeagueId)
        .column_as(Expr::col(league_members::Column::Id).count(), "members")
        .filter(league_members::Column::LeagueId.is_in(league_ids))
        .group_by(league_members::Column::LeagueId)
        .into_tuple()
        .all(db)
        .await?;
    Ok(rows.into_iter().map(|(id, n)| (id, n.max(0) as u64)).collect())
}

async fn member_count<C: ConnectionTrait>(db: &C, league_id: Uuid) -> Result<u64, AppError> {
    Ok(league_members::Entity::find()
        .filter(league_members::Column::LeagueId.eq(league_id))
        .count(db)
        .await?)
}

async fn find_league<C: ConnectionTrait>(db: &C, league_id: Uuid) -> Result<leagues::Model, AppError> {
    leagues::Entity::find_by_id(league_id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("League not found".to_string()))
}

/// 创建联赛，创建者自动成为成员。两条插入放在同一事务中。
pub async fn create(
    state: &AppState,
    owner_id: Uuid,
    req: CreateLeagueRequest,
    ctx: &AuditContext,
) -> Result<LeagueView, AppError> {
    let now = Utc::now().fixed_offset();
    let league = leagues::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(req.name.trim().to_string()),
        description: Set(req.description),
        owner_id: Set(owner_id),
        is_public: Set(req.is_public),
        join_code: Set((!req.is_public).then(|| random_token(LEAGUE_JOIN_CODE_LEN))),
        max_members: Set(req.max_members),
        created_at: Set(now),
    };

    let txn = state.db.begin().await?;
    let league = league.insert(&txn).await.map_err(|e| {
        if e.to_string().contains("duplicate key") {
            AppError::Conflict("League name already taken".to_string())
        } else {
            AppError::DatabaseError(e)
        }
    })?;
    league_members::ActiveModel {
        id: Set(Uuid::new_v4()),
        league_id: Set(league.id),
        user_id: Set(owner_id),
        joined_at: Set(now),
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    tracing::info!("🏆 League '{}' created by {}", league.name, owner_id);
    audit::log_enroll(&*state.db, ctx, league.id, &league.name).await;

    Ok(LeagueView::new(league, 1, true))
}

pub async fn list_public(db: &DatabaseConnection, page: PageQuery) -> Result<Paged<LeagueView>, AppError> {
    let (page_idx, per_page) = page.resolve();
    let paginator = leagues::Entity::find()
        .filter(leagues::Column::IsPublic.eq(true))
        .order_by_desc(leagues::Column::CreatedAt)
        .paginate(db, per_page);

    let total = paginator.num_items().await?;
    let rows = paginator.fetch_page(page_idx).await?;
    let counts = member_counts(db, rows.iter().map(|l| l.id).collect()).await?;

    let items = rows
        .into_iter()
        .map(|l| {
            let n = counts.get(&l.id).copied().unwrap_or(0);
            LeagueView::new(l, n, false)
        })
        .collect();

    Ok(Paged { items, page: page_idx + 1, per_page, total })
}

/// 私有联赛只对成员可见，非成员得到 404
pub async fn get(db: &DatabaseConnection, league_id: Uuid, viewer: Uuid) -> Result<LeagueView, AppError> {
    let league = find_league(db, league_id).await?;
    if !league.is_public && !is_member(db, league_id, viewer).await? {
        return Err(AppError::NotFound("League not found".to_string()));
    }
    let n = member_count(db, league_id).await?;
    let is_owner = league.owner_id == viewer;
    Ok(LeagueView::new(league, n, is_owner))
}

/// 加入前的规则检查，不涉及数据库
pub fn check_join(
    league: &leagues::Model,
    provided_code: Option<&str>,
    already_member: bool,
    current_members: u64,
) -> Result<(), AppError> {
    if !league.is_public {
        let expected = league.join_code.as_deref().unwrap_or_default();
        let provided = provided_code.unwrap_or_default().trim();
        if expected.is_empty() || !constant_time_eq(expected.as_bytes(), provided.as_bytes()) {
            return Err(AppError::Forbidden("Invalid join code".to_string()));
        }
    }
    if already_member {
        return Err(AppError::Conflict("Already a member of this league".to_string()));
    }
    if let Some(max) = league.max_members {
        if current_members >= max.max(0) as u64 {
            return Err(AppError::Conflict("League is full".to_string()));
        }
    }
    Ok(())
}

/// 在事务内完成加入：先对联赛行加 `FOR UPDATE` 锁，并发的加入请求在此排队，
/// 人数检查和插入看到的是同一份计数，不会超出上限。返回联赛和加入后的人数。
async fn enroll(
    db: &DatabaseConnection,
    user_id: Uuid,
    league_id: Uuid,
    join_code: Option<&str>,
) -> Result<(leagues::Model, u64), AppError> {
    let txn = db.begin().await?;

    let league = leagues::Entity::find_by_id(league_id)
        .lock_exclusive()
        .one(&txn)
        .await?
        .ok_or(AppError::NotFound("League not found".to_string()))?;
    let already = is_member(&txn, league_id, user_id).await?;
    let current = member_count(&txn, league_id).await?;
    // 校验失败时 txn 被丢弃，自动回滚并释放锁
    check_join(&league, join_code, already, current)?;

    league_members::ActiveModel {
        id: Set(Uuid::new_v4()),
        league_id: Set(league_id),
        user_id: Set(user_id),
        joined_at: Set(Utc::now().fixed_offset()),
    }
    .insert(&txn)
    .await
    .map_err(|e| {
        // 唯一索引兜底重复加入
        if e.to_string().contains("duplicate key") {
            AppError::Conflict("Already a member of this league".to_string())
        } else {
            AppError::DatabaseError(e)
        }
    })?;

    txn.commit().await?;
    Ok((league, current + 1))
}

pub async fn join(
    state: &AppState,
    user_id: Uuid,
    league_id: Uuid,
    join_code: Option<&str>,
    ctx: &AuditContext,
) -> Result<LeagueView, AppError> {
    let (league, members) = enroll(&state.db, user_id, league_id, join_code).await?;

    audit::log_enroll(&*state.db, ctx, league.id, &league.name).await;
    let is_owner = league.owner_id == user_id;
    Ok(LeagueView::new(league, members, is_owner))
}

pub async fn leave(state: &AppState, user_id: Uuid, league_id: Uuid, ctx: &AuditContext) -> Result<(), AppError> {
    let league = find_league(&*state.db, league_id).await?;
    if league.owner_id == user_id {
        return Err(AppError::Conflict("The league owner cannot leave the league".to_string()));
    }

    let res = league_members::Entity::delete_many()
        .filter(league_members::Column::LeagueId.eq(league_id))
        .filter(league_members::Column::UserId.eq(user_id))
        .exec(&*state.db)
        .await?;
    if res.rows_affected == 0 {
        return Err(AppError::NotFound("Not a member of this league".to_string()));
    }

    let entry = AuditEntry::new("league.leave", "league")
        .entity_id(league_id)
        .summary(format!("left league '{}'", league.name));
    audit::record(&*state.db, ctx, entry).await;
    Ok(())
}

/// 当前用户加入的所有联赛
pub async fn memberships(db: &DatabaseConnection, user_id: Uuid) -> Result<Vec<LeagueView>, AppError> {
    let rows = leagues::Entity::find()
        .inner_join(league_members::Entity)
        .filter(league_members::Column::UserId.eq(user_id))
        .order_by_asc(leagues::Column::Name)
        .all(db)
        .await?;
    let counts = member_counts(db, rows.iter().map(|l| l.id).collect()).await?;

    Ok(rows
        .into_iter()
        .map(|l| {
            let n = counts.get(&l.id).copied().unwrap_or(0);
            let is_owner = l.owner_id == user_id;
            LeagueView::new(l, n, is_owner)
        })
        .collect())
}

/// 按已实现盈亏排名。没有已平仓交易的成员也会出现在榜单末尾。
pub fn rank_leaderboard(members: Vec<(Uuid, String)>, league_trades: &[trades::Model]) -> Vec<LeaderboardEntry> {
    let mut totals: HashMap<Uuid, (u64, f64)> = HashMap::new();
    for trade in league_trades {
        if let Some(pnl) = realized_pnl(trade) {
            let entry = totals.entry(trade.user_id).or_insert((0, 0.0));
            entry.0 += 1;
            entry.1 += pnl;
        }
    }

    let mut rows: Vec<LeaderboardEntry> = members
        .into_iter()
        .map(|(user_id, username)| {
            let (closed_trades, realized_pnl) = totals.get(&user_id).copied().unwrap_or((0, 0.0));
            LeaderboardEntry {
                rank: 0,
                user_id: user_id.to_string(),
                username,
                closed_trades,
                realized_pnl,
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.realized_pnl
            .total_cmp(&a.realized_pnl)
            .then_with(|| a.username.cmp(&b.username))
    });
    for (i, row) in rows.iter_mut().enumerate() {
        row.rank = i + 1;
    }
    rows
}

pub async fn leaderboard(
    db: &DatabaseConnection,
    league_id: Uuid,
    viewer: Uuid,
) -> Result<Vec<LeaderboardEntry>, AppError> {
    let league = find_league(db, league_id).await?;
    if !league.is_public && !is_member(db, league_id, viewer).await? {
        return Err(AppError::NotFound("League not found".to_string()));
    }

    let members: Vec<(Uuid, String)> = users::Entity::find()
        .select_only()
        .column(users::Column::Id)
        .column(users::Column::Username)
        .inner_join(league_members::Entity)
        .filter(league_members::Column::LeagueId.eq(league_id))
        .into_tuple()
        .all(db)
        .await?;

    let league_trades = trades::Entity::find()
        .filter(trades::Column::LeagueId.eq(league_id))
        .filter(trades::Column::ExitPrice.is_not_null())
        .all(db)
        .await?;

    Ok(rank_leaderboard(members, &league_trades))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::enums::TradeSide;

    fn league(is_public: bool, code: Option<&str>, max: Option<i32>) -> leagues::Model {
        leagues::Model {
            id: Uuid::new_v4(),
            name: "Swing Masters".to_string(),
            description: None,
            owner_id: Uuid::new_v4(),
            is_public,
            join_code: code.map(str::to_string),
            max_members: max,
            created_at: Utc::now().fixed_offset(),
        }
    }

    fn closed_trade(user_id: Uuid, side: TradeSide, entry: f64, exit: f64) -> trades::Model {
        let now = Utc::now().fixed_offset();
        trades::Model {
            id: Uuid::new_v4(),
            user_id,
            league_id: None,
            symbol: "ES".to_string(),
            side,
            quantity: 1.0,
            entry_price: entry,
            exit_price: Some(exit),
            fees: 0.0,
            emotion: None,
            confidence: None,
            notes: None,
            opened_at: now,
            closed_at: Some(now),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn private_league_requires_matching_code() {
        let l = league(false, Some("ABCD1234"), None);
        assert!(check_join(&l, Some("ABCD1234"), false, 3).is_ok());
        assert!(matches!(check_join(&l, Some("nope"), false, 3), Err(AppError::Forbidden(_))));
        assert!(matches!(check_join(&l, None, false, 3), Err(AppError::Forbidden(_))));
    }

    #[test]
    fn public_league_ignores_code() {
        assert!(check_join(&league(true, None, None), Some("whatever"), false, 0).is_ok());
    }

    #[test]
    fn duplicate_and_full_are_conflicts() {
        let l = league(true, None, Some(2));
        assert!(matches!(check_join(&l, None, true, 1), Err(AppError::Conflict(_))));
        assert!(matches!(
            check_join(&l, None, false, 2),
            Err(AppError::Conflict(msg)) if msg == "League is full"
        ));
        assert!(check_join(&l, None, false, 1).is_ok());
    }

    #[test]
    fn leaderboard_ranks_by_realized_pnl() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let trades = vec![
            closed_trade(a, TradeSide::Long, 100.0, 110.0),
            closed_trade(a, TradeSide::Short, 50.0, 55.0),
            closed_trade(b, TradeSide::Short, 100.0, 80.0),
        ];
        let members = vec![(a, "alice".to_string()), (b, "bob".to_string()), (c, "carol".to_string())];

        let board = rank_leaderboard(members, &trades);
        let names: Vec<_> = board.iter().map(|e| e.username.as_str()).collect();
        assert_eq!(names, ["bob", "alice", "carol"]);
        assert_eq!(board[0].realized_pnl, 20.0);
        assert_eq!(board[1].closed_trades, 2);
        assert_eq!(board[1].realized_pnl, 5.0);
        assert_eq!(board[2].closed_trades, 0);
        assert_eq!(board.iter().map(|e| e.rank).collect::<Vec<_>>(), [1, 2, 3]);
    }

    fn count_row(n: i64) -> std::collections::BTreeMap<&'static str, Value> {
        std::collections::BTreeMap::from([("num_items", Value::BigInt(Some(n)))])
    }

    #[tokio::test]
    async fn full_league_is_rejected_under_row_lock() {
        let full = league(true, None, Some(2));
        let league_id = full.id;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[full]])
            .append_query_results([Vec::<league_members::Model>::new()])
            .append_query_results([[count_row(2)]])
            .into_connection();

        let result = enroll(&db, Uuid::new_v4(), league_id, None).await;
        assert!(matches!(result, Err(AppError::Conflict(ref m)) if m == "League is full"));

        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("FOR UPDATE"));
        // 被拒绝时不会写入成员表
        assert!(!log.contains("INSERT"));
    }

    #[tokio::test]
    async fn join_inserts_member_inside_transaction() {
        let open = league(true, None, Some(3));
        let league_id = open.id;
        let user_id = Uuid::new_v4();
        let member = league_members::Model {
            id: Uuid::new_v4(),
            league_id,
            user_id,
            joined_at: Utc::now().fixed_offset(),
        };
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[open]])
            .append_query_results([Vec::<league_members::Model>::new()])
            .append_query_results([[count_row(2)]])
            .append_query_results([[member]])
            .into_connection();

        let (joined, members) = enroll(&db, user_id, league_id, None).await.unwrap();
        assert_eq!(joined.id, league_id);
        assert_eq!(members, 3);

        let log = format!("{:?}", db.into_transaction_log());
        assert!(log.contains("FOR UPDATE"));
        assert!(log.contains("INSERT INTO"));
    }
}
