use sea_orm_migration::prelude::*;

use super::{m20251229_063323_create_users::Users, m20260104_101500_create_leagues::Leagues};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Trades::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Trades::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(ColumnDef::new(Trades::UserId).uuid().not_null())
                    .col(ColumnDef::new(Trades::LeagueId).uuid())
                    .col(ColumnDef::new(Trades::Symbol).string_len(24).not_null())
                    .col(ColumnDef::new(Trades::Side).string_len(8).not_null())
                    .col(ColumnDef::new(Trades::Quantity).double().not_null())
                    .col(ColumnDef::new(Trades::EntryPrice).double().not_null())
                    .col(ColumnDef::new(Trades::ExitPrice).double())
                    .col(ColumnDef::new(Trades::Fees).double().not_null().default(0.0))
                    .col(ColumnDef::new(Trades::Emotion).string_len(32))
                    .col(ColumnDef::new(Trades::Confidence).small_integer())
                    .col(ColumnDef::new(Trades::Notes).text())
                    .col(ColumnDef::new(Trades::OpenedAt).timestamp_with_time_zone().not_null())
                    .col(ColumnDef::new(Trades::ClosedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Trades::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Trades::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_trades_user")
                            .from(Trades::Table, Trades::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_trades_league")
                            .from(Trades::Table, Trades::LeagueId)
                            .to(Leagues::Table, Leagues::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_trades_user_opened")
                    .table(Trades::Table)
                    .col(Trades::UserId)
                    .col(Trades::OpenedAt)
                    .to_owned(),
            )
            .await?;

        let db = manager.get_connection();
        db.execute_unprepared(
            "CREATE TRIGGER trades_set_timestamp
             BEFORE UPDATE ON trades
             FOR EACH ROW
             EXECUTE PROCEDURE update_timestamp();",
        )
        .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared("DROP TRIGGER IF EXISTS trades_set_timestamp ON trades;").await?;

        manager
            .drop_table(Table::drop().table(Trades::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Trades {
    Table,
    Id,
    UserId,
    LeagueId,
    Symbol,
    Side,
    Quantity,
    EntryPrice,
    ExitPrice,
    Fees,
    Emotion,
    Confidence,
    Notes,
    OpenedAt,
    ClosedAt,
    CreatedAt,
    UpdatedAt,
}
