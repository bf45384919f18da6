use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::core::enums::SubmissionStatus;

#[derive(Deserialize, Debug, Default)]
pub struct SubmissionListQuery {
    pub status: Option<SubmissionStatus>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Deserialize, Validate, Default)]
pub struct ReviewRequest {
    #[validate(length(max = 1000, message = "Note must be at most 1000 characters"))]
    pub note: Option<String>,
}

/// Multipart 表单解析后的上传内容
#[derive(Debug)]
pub struct UploadForm {
    pub title: String,
    pub league_id: Option<uuid::Uuid>,
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Serialize)]
pub struct SubmissionCreated {
    pub id: String,
}
