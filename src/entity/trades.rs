use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::enums::TradeSide;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "trades")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub league_id: Option<Uuid>,
    pub symbol: String,
    pub side: TradeSide,
    #[sea_orm(column_type = "Double")]
    pub quantity: f64,
    #[sea_orm(column_type = "Double")]
    pub entry_price: f64,
    #[sea_orm(column_type = "Double", nullable)]
    pub exit_price: Option<f64>,
    #[sea_orm(column_type = "Double")]
    pub fees: f64,
    /// 交易时的情绪标签，例如 calm / fearful / greedy
    pub emotion: Option<String>,
    pub confidence: Option<i16>,
    #[sea_orm(column_type = "Text", nullable)]
    pub notes: Option<String>,
    pub opened_at: DateTimeWithTimeZone,
    pub closed_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id",
        on_delete = "Cascade"
    )]
    User,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
