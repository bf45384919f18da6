use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::enums::SubmissionStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "submissions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: Uuid,
    pub league_id: Option<Uuid>,
    pub title: String,
    pub original_filename: String,
    /// 相对于 UPLOAD_DIR 的存储文件名
    #[serde(skip_serializing)]
    pub stored_path: String,
    pub content_type: Option<String>,
    pub size_bytes: i64,
    pub status: SubmissionStatus,
    pub reviewer_id: Option<Uuid>,
    #[sea_orm(column_type = "Text", nullable)]
    pub review_note: Option<String>,
    pub reviewed_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
