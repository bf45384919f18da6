use sea_orm_migration::prelude::*;

use super::m20251229_063323_create_users::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Leagues::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Leagues::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(ColumnDef::new(Leagues::Name).string_len(80).not_null().unique_key())
                    .col(ColumnDef::new(Leagues::Description).text())
                    .col(ColumnDef::new(Leagues::OwnerId).uuid().not_null())
                    .col(ColumnDef::new(Leagues::IsPublic).boolean().not_null().default(true))
                    .col(ColumnDef::new(Leagues::JoinCode).string_len(16))
                    .col(ColumnDef::new(Leagues::MaxMembers).integer())
                    .col(
                        ColumnDef::new(Leagues::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_leagues_owner")
                            .from(Leagues::Table, Leagues::OwnerId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(LeagueMembers::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(LeagueMembers::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(ColumnDef::new(LeagueMembers::LeagueId).uuid().not_null())
                    .col(ColumnDef::new(LeagueMembers::UserId).uuid().not_null())
                    .col(
                        ColumnDef::new(LeagueMembers::JoinedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_league_members_league")
                            .from(LeagueMembers::Table, LeagueMembers::LeagueId)
                            .to(Leagues::Table, Leagues::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_league_members_user")
                            .from(LeagueMembers::Table, LeagueMembers::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // 同一用户在同一联赛只能有一条成员记录
        manager
            .create_index(
                Index::create()
                    .name("uq_league_members_league_user")
                    .table(LeagueMembers::Table)
                    .col(LeagueMembers::LeagueId)
                    .col(LeagueMembers::UserId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(LeagueMembers::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Leagues::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub(crate) enum Leagues {
    Table,
    Id,
    Name,
    Description,
    OwnerId,
    IsPublic,
    JoinCode,
    MaxMembers,
    CreatedAt,
}

#[derive(DeriveIden)]
enum LeagueMembers {
    Table,
    Id,
    LeagueId,
    UserId,
    JoinedAt,
}
