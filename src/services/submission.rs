use std::path::{Path, PathBuf};

use chrono::Utc;
use sea_orm::{sea_query::Expr, *};
use uuid::Uuid;

use crate::{
    core::{constants::ALLOWED_UPLOAD_EXTENSIONS, enums::SubmissionStatus, error::AppError},
    dtos::{
        response::Paged,
        submission::{SubmissionListQuery, UploadForm},
        PageQuery,
    },
    entity::submissions,
    services::{
        audit::{self, AuditContext, AuditEntry},
        league,
    },
    state::AppState,
};

/// 取出小写扩展名，不在白名单内返回 `None`
pub fn allowed_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    ALLOWED_UPLOAD_EXTENSIONS
        .contains(&ext.as_str())
        .then_some(ext)
}

/// 上传前的纯校验，返回扩展名
pub fn check_upload(form: &UploadForm, max_bytes: usize) -> Result<String, AppError> {
    let title_len = form.title.trim().chars().count();
    if title_len == 0 || title_len > 200 {
        return Err(AppError::BadRequest("Title must be 1-200 characters".to_string()));
    }
    if form.bytes.is_empty() {
        return Err(AppError::BadRequest("File is empty".to_string()));
    }
    if form.bytes.len() > max_bytes {
        return Err(AppError::PayloadTooLarge(format!(
            "File exceeds the {} byte limit",
            max_bytes
        )));
    }
    allowed_extension(&form.file_name).ok_or(AppError::BadRequest(format!(
        "Unsupported file type, allowed: {}",
        ALLOWED_UPLOAD_EXTENSIONS.join(", ")
    )))
}

/// 保存上传文件并写入一条待审核记录。数据库写入失败时删除已落盘的文件。
pub async fn create(
    state: &AppState,
    user_id: Uuid,
    form: UploadForm,
    ctx: &AuditContext,
) -> Result<Uuid, AppError> {
    let ext = check_upload(&form, state.config.max_upload_bytes)?;
    if let Some(league_id) = form.league_id {
        league::require_member(&*state.db, league_id, user_id).await?;
    }

    let id = Uuid::new_v4();
    let stored_name = format!("{}.{}", id, ext);
    let dir = PathBuf::from(&state.config.upload_dir);
    let path = dir.join(&stored_name);

    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| AppError::InternalServerError(format!("Upload dir unavailable: {}", e)))?;
    tokio::fs::write(&path, &form.bytes)
        .await
        .map_err(|e| AppError::InternalServerError(format!("Failed to store upload: {}", e)))?;

    let row = submissions::ActiveModel {
        id: Set(id),
        user_id: Set(user_id),
        league_id: Set(form.league_id),
        title: Set(form.title.trim().to_string()),
        original_filename: Set(form.file_name.clone()),
        stored_path: Set(stored_name),
        content_type: Set(form.content_type),
        size_bytes: Set(form.bytes.len() as i64),
        status: Set(SubmissionStatus::Pending),
        reviewer_id: Set(None),
        review_note: Set(None),
        reviewed_at: Set(None),
        created_at: Set(Utc::now().fixed_offset()),
    };

    if let Err(e) = row.insert(&*state.db).await {
        if let Err(rm) = tokio::fs::remove_file(&path).await {
            tracing::warn!("⚠️ Could not remove orphaned upload {}: {}", path.display(), rm);
        }
        return Err(e.into());
    }

    tracing::info!("📎 Stored submission {} ({} bytes)", id, form.bytes.len());
    let entry = AuditEntry::new("submission.create", "submission")
        .entity_id(id)
        .summary(form.file_name);
    audit::record(&*state.db, ctx, entry).await;

    Ok(id)
}

async fn paged(
    db: &DatabaseConnection,
    select: Select<submissions::Entity>,
    page: PageQuery,
) -> Result<Paged<submissions::Model>, AppError> {
    let (page_idx, per_page) = page.resolve();
    let paginator = select
        .order_by_desc(submissions::Column::CreatedAt)
        .paginate(db, per_page);
    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(page_idx).await?;
    Ok(Paged { items, page: page_idx + 1, per_page, total })
}

pub async fn list_mine(
    db: &DatabaseConnection,
    user_id: Uuid,
    query: SubmissionListQuery,
) -> Result<Paged<submissions::Model>, AppError> {
    let mut select = submissions::Entity::find().filter(submissions::Column::UserId.eq(user_id));
    if let Some(status) = query.status {
        select = select.filter(submissions::Column::Status.eq(status));
    }
    paged(db, select, PageQuery { page: query.page, per_page: query.per_page }).await
}

/// 管理员审核列表，未指定状态时默认只看待审核的
pub async fn list_for_review(
    db: &DatabaseConnection,
    query: SubmissionListQuery,
) -> Result<Paged<submissions::Model>, AppError> {
    let status = query.status.unwrap_or(SubmissionStatus::Pending);
    let select = submissions::Entity::find().filter(submissions::Column::Status.eq(status));
    paged(db, select, PageQuery { page: query.page, per_page: query.per_page }).await
}

/// 审核：只有 Pending 可以流转。用带状态条件的 UPDATE 保证并发审核只有一个成功。
pub async fn review(
    db: &DatabaseConnection,
    reviewer_id: Uuid,
    submission_id: Uuid,
    decision: SubmissionStatus,
    note: Option<String>,
    ctx: &AuditContext,
) -> Result<submissions::Model, AppError> {
    if decision == SubmissionStatus::Pending {
        return Err(AppError::BadRequest("Invalid review decision".to_string()));
    }

    let result = submissions::Entity::update_many()
        .col_expr(submissions::Column::Status, Expr::value(decision))
        .col_expr(submissions::Column::ReviewerId, Expr::value(reviewer_id))
        .col_expr(submissions::Column::ReviewNote, Expr::value(note.clone()))
        .col_expr(submissions::Column::ReviewedAt, Expr::value(Utc::now().fixed_offset()))
        .filter(submissions::Column::Id.eq(submission_id))
        .filter(submissions::Column::Status.eq(SubmissionStatus::Pending))
        .exec(db)
        .await?;

    let submission = submissions::Entity::find_by_id(submission_id)
        .one(db)
        .await?
        .ok_or(AppError::NotFound("Submission not found".to_string()))?;

    if result.rows_affected == 0 {
        return Err(AppError::Conflict(format!(
            "Submission is already {}",
            submission.status
        )));
    }

    match decision {
        SubmissionStatus::Approved => {
            audit::log_approve(db, ctx, "submission", submission.id, &submission.title).await;
        }
        _ => {
            let summary = note.unwrap_or_else(|| submission.title.clone());
            audit::log_admin_action(db, ctx, "submission.reject", "submission", submission.id, &summary)
                .await;
        }
    }

    Ok(submission)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(name: &str, bytes: usize) -> UploadForm {
        UploadForm {
            title: "Q3 broker statement".to_string(),
            league_id: None,
            file_name: name.to_string(),
            content_type: None,
            bytes: vec![b'x'; bytes],
        }
    }

    #[test]
    fn extensions_are_case_insensitive() {
        assert_eq!(allowed_extension("Statement.PDF").as_deref(), Some("pdf"));
        assert_eq!(allowed_extension("chart.jpeg").as_deref(), Some("jpeg"));
        assert_eq!(allowed_extension("payload.exe"), None);
        assert_eq!(allowed_extension("no_extension"), None);
    }

    #[test]
    fn oversized_upload_is_rejected() {
        assert!(matches!(check_upload(&form("a.csv", 11), 10), Err(AppError::PayloadTooLarge(_))));
        assert_eq!(check_upload(&form("a.csv", 10), 10).unwrap(), "csv");
    }

    #[test]
    fn empty_file_and_blank_title_are_rejected() {
        assert!(matches!(check_upload(&form("a.png", 0), 10), Err(AppError::BadRequest(_))));
        let mut blank = form("a.png", 1);
        blank.title = "   ".to_string();
        assert!(matches!(check_upload(&blank, 10), Err(AppError::BadRequest(_))));
    }

    fn reviewed(status: SubmissionStatus) -> submissions::Model {
        submissions::Model {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            league_id: None,
            title: "Q3 broker statement".to_string(),
            original_filename: "q3.pdf".to_string(),
            stored_path: "q3.pdf".to_string(),
            content_type: Some("application/pdf".to_string()),
            size_bytes: 1024,
            status,
            reviewer_id: Some(Uuid::new_v4()),
            review_note: None,
            reviewed_at: Some(Utc::now().fixed_offset()),
            created_at: Utc::now().fixed_offset(),
        }
    }

    fn ctx() -> AuditContext {
        AuditContext::new(Some(Uuid::new_v4()), &crate::extractors::client_ip::ClientIp("127.0.0.1".to_string()))
    }

    #[tokio::test]
    async fn second_review_conflicts() {
        let existing = reviewed(SubmissionStatus::Approved);
        let id = existing.id;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult { last_insert_id: 0, rows_affected: 0 }])
            .append_query_results([[existing]])
            .into_connection();

        let result = review(&db, Uuid::new_v4(), id, SubmissionStatus::Rejected, None, &ctx()).await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn pending_submission_is_approved() {
        let approved = reviewed(SubmissionStatus::Approved);
        let id = approved.id;
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult { last_insert_id: 0, rows_affected: 1 }])
            .append_query_results([[approved]])
            .into_connection();

        // 审计写入失败只记日志，不影响审核结果
        let result = review(&db, Uuid::new_v4(), id, SubmissionStatus::Approved, None, &ctx()).await.unwrap();
        assert_eq!(result.status, SubmissionStatus::Approved);
    }

    #[tokio::test]
    async fn review_back_to_pending_is_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let result = review(&db, Uuid::new_v4(), Uuid::new_v4(), SubmissionStatus::Pending, None, &ctx()).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }
}
