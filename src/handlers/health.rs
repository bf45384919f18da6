use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};

use crate::{services::health as HealthService, state::AppState};

/// 健康检查：全部通过返回 200，否则 503，响应体列出每一项的结果
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let report = HealthService::check(&state).await;
    let status = if report.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(report))
}
