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
                    .table(Submissions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Submissions::Id)
                            .uuid()
                            .not_null()
                            .primary_key()
                            .default(Expr::cust("gen_random_uuid()")),
                    )
                    .col(ColumnDef::new(Submissions::UserId).uuid().not_null())
                    .col(ColumnDef::new(Submissions::LeagueId).uuid())
                    .col(ColumnDef::new(Submissions::Title).string_len(120).not_null())
                    .col(ColumnDef::new(Submissions::OriginalFilename).string().not_null())
                    .col(ColumnDef::new(Submissions::StoredPath).string().not_null())
                    .col(ColumnDef::new(Submissions::ContentType).string_len(100))
                    .col(ColumnDef::new(Submissions::SizeBytes).big_integer().not_null())
                    .col(ColumnDef::new(Submissions::Status).string_len(16).not_null().default("pending"))
                    .col(ColumnDef::new(Submissions::ReviewerId).uuid())
                    .col(ColumnDef::new(Submissions::ReviewNote).text())
                    .col(ColumnDef::new(Submissions::ReviewedAt).timestamp_with_time_zone())
                    .col(
                        ColumnDef::new(Submissions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_submissions_user")
                            .from(Submissions::Table, Submissions::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_submissions_league")
                            .from(Submissions::Table, Submissions::LeagueId)
                            .to(Leagues::Table, Leagues::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // 管理员审核列表按状态查询
        manager
            .create_index(
                Index::create()
                    .name("idx_submissions_status")
                    .table(Submissions::Table)
                    .col(Submissions::Status)
                    .col(Submissions::CreatedAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Submissions::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum Submissions {
    Table,
    Id,
    UserId,
    LeagueId,
    Title,
    OriginalFilename,
    StoredPath,
    ContentType,
    SizeBytes,
    Status,
    ReviewerId,
    ReviewNote,
    ReviewedAt,
    CreatedAt,
}
