use axum::{
    extract::{multipart::MultipartError, Multipart, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use crate::{
    core::error::AppError,
    dtos::{
        auth::Claims,
        response::ApiResponse,
        submission::{SubmissionCreated, SubmissionListQuery, UploadForm},
    },
    extractors::client_ip::ClientIp,
    rate_limit,
    services::{audit::AuditContext, submission as SubmissionService},
    state::AppState,
    utils::limiter::actor_key,
};

fn multipart_error(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge("Upload exceeds the size limit".to_string())
    } else {
        AppError::BadRequest(format!("Malformed multipart body: {}", e.body_text()))
    }
}

/// 读取 `file`、`title`、`league_id` 三个字段，其余字段忽略
async fn read_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut title = None;
    let mut league_id = None;
    let mut file = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or(AppError::BadRequest("File name is missing".to_string()))?;
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await.map_err(multipart_error)?;
                file = Some((file_name, content_type, bytes.to_vec()));
            }
            Some("title") => title = Some(field.text().await.map_err(multipart_error)?),
            Some("league_id") => {
                let raw = field.text().await.map_err(multipart_error)?;
                if !raw.trim().is_empty() {
                    let id = Uuid::parse_str(raw.trim())
                        .map_err(|_| AppError::BadRequest("Invalid league_id".to_string()))?;
                    league_id = Some(id);
                }
            }
            _ => {}
        }
    }

    let (file_name, content_type, bytes) =
        file.ok_or(AppError::BadRequest("Missing file field".to_string()))?;

    Ok(UploadForm {
        // 没有标题时使用文件名
        title: title.unwrap_or_else(|| file_name.clone()),
        league_id,
        file_name,
        content_type,
        bytes,
    })
}

pub async fn upload(
    claims: Claims,
    ip: ClientIp,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    rate_limit!(state.limiter, "submission:upload", &actor_key(Some(&claims.sub), &ip.0), 10);

    let form = read_form(multipart).await?;
    let user_id = claims.user_id()?;
    let id = SubmissionService::create(&state, user_id, form, &AuditContext::new(Some(user_id), &ip)).await?;

    Ok(ApiResponse::with_code(
        StatusCode::CREATED,
        "Submission received",
        Some(SubmissionCreated { id: id.to_string() }),
    ))
}

pub async fn list_mine(
    claims: Claims,
    State(state): State<AppState>,
    Query(query): Query<SubmissionListQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = SubmissionService::list_mine(&*state.db, claims.user_id()?, query).await?;
    Ok(ApiResponse::with_data(page))
}
