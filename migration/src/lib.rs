pub use sea_orm_migration::prelude::*;

mod m20251229_063323_create_users;
mod m20260104_101500_create_leagues;
mod m20260104_102000_create_trades;
mod m20260106_090000_create_submissions;
mod m20260108_140000_create_audit_logs;
mod m20260108_141500_create_rate_limits;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251229_063323_create_users::Migration),
            Box::new(m20260104_101500_create_leagues::Migration),
            Box::new(m20260104_102000_create_trades::Migration),
            Box::new(m20260106_090000_create_submissions::Migration),
            Box::new(m20260108_140000_create_audit_logs::Migration),
            Box::new(m20260108_141500_create_rate_limits::Migration),
        ]
    }
}
