//! HTTP路由handlers

use std::path::Path;

use axum::{
    body::Bytes,
    extract::{Path as UrlPath, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use tubefetch_core::api::{CancelOutcome, Task};

use crate::http::{models::*, state::AppState, validation::parse_download_body};

/// 创建所有路由
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/download_video", post(download_video_handler))
        .route("/tasks", get(list_tasks_handler))
        .route(
            "/tasks/:task_id",
            get(get_task_handler).delete(cancel_task_handler),
        )
        .route("/config", get(config_handler))
        .route("/files", get(files_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// POST /download_video - 创建下载任务，立即返回 task_id
async fn download_video_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<DownloadAccepted>), HttpServerError> {
    state.record_request("/download_video");

    let (url, format) = parse_download_body(&body).inspect_err(|_| state.record_error())?;
    let task = state
        .dispatcher
        .submit(&url, format)
        .await
        .inspect_err(|_| state.record_error())?;

    Ok((
        StatusCode::ACCEPTED,
        Json(DownloadAccepted::processing(task.task_id)),
    ))
}

/// GET /tasks - 所有任务（按创建时间排序）
async fn list_tasks_handler(State(state): State<AppState>) -> Json<Vec<Task>> {
    state.record_request("/tasks");
    Json(state.store().list().await)
}

/// GET /tasks/:task_id
async fn get_task_handler(
    State(state): State<AppState>,
    UrlPath(task_id): UrlPath<String>,
) -> Result<Json<Task>, HttpServerError> {
    state.record_request("/tasks/:task_id");
    let task = state
        .store()
        .get(&task_id)
        .await
        .inspect_err(|_| state.record_error())?;
    Ok(Json(task))
}

/// DELETE /tasks/:task_id - 取消任务；已结束的任务原样返回
async fn cancel_task_handler(
    State(state): State<AppState>,
    UrlPath(task_id): UrlPath<String>,
) -> Result<Json<CancelResponse>, HttpServerError> {
    state.record_request("/tasks/:task_id");

    let outcome = state
        .store()
        .request_cancel(&task_id)
        .await
        .inspect_err(|_| state.record_error())?;
    let resp = match outcome {
        CancelOutcome::Cancelled(task) => {
            tracing::info!(target: "tubefetch.task", task_id = %task.task_id, "cancellation requested");
            CancelResponse {
                status: task.status,
                message: "Cancellation requested.",
            }
        }
        CancelOutcome::AlreadyFinished(task) => CancelResponse {
            status: task.status,
            message: "Task already finished.",
        },
    };
    Ok(Json(resp))
}

/// GET /config - 前端需要的媒体库子目录
async fn config_handler(State(state): State<AppState>) -> Json<ConfigResponse> {
    state.record_request("/config");
    Json(ConfigResponse {
        media_subdir: state.config.downloads.media_subdir.clone(),
    })
}

/// GET /files - 下载目录中的文件名
async fn files_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, HttpServerError> {
    state.record_request("/files");
    let files = list_files(Path::new(&state.config.downloads.download_dir))
        .await
        .map_err(|e| {
            state.record_error();
            HttpServerError::Internal(format!("failed to list downloads: {e}"))
        })?;
    Ok(Json(files))
}

async fn list_files(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut rd = match tokio::fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut names = Vec::new();
    while let Some(entry) = rd.next_entry().await? {
        if entry.file_type().await?.is_file() {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
    }
    names.sort();
    Ok(names)
}

/// GET /health - 健康检查
async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    state.record_request("/health");

    Json(HealthResponse {
        status: "healthy".to_string(),
        uptime_seconds: state.uptime_seconds(),
        tasks: state.store().counts().await,
        requests: state.request_stats(),
        timestamp: Local::now().to_rfc3339(),
    })
}
