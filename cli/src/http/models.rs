//! HTTP API数据模型

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tubefetch_core::api::{
    DispatchError, ErrorCode, StatusCounts, StoreError, TaskStatus, ValidationError,
};

// ============= Download =============

/// `format` 可省略或为任意字符串，未识别时按 mp4 处理。
#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DownloadAccepted {
    pub status: &'static str,
    pub task_id: String,
}

impl DownloadAccepted {
    pub fn processing(task_id: String) -> Self {
        Self {
            status: "processing",
            task_id,
        }
    }
}

// ============= Cancel =============

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub status: TaskStatus,
    pub message: &'static str,
}

// ============= Config / Health =============

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub media_subdir: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub uptime_seconds: f64,
    pub tasks: StatusCounts,
    pub requests: RequestStats,
    pub timestamp: String,
}

/// 自启动以来的请求计数
#[derive(Debug, Clone, Default, Serialize)]
pub struct RequestStats {
    pub total: u64,
    pub errors: u64,
    pub by_endpoint: BTreeMap<String, u64>,
}

// ============= Error Handling =============

/// 错误响应；HTTP 状态由 `ErrorCode` 决定
#[derive(Debug)]
pub enum HttpServerError {
    Api(ErrorCode, String),
    Internal(String),
}

impl HttpServerError {
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Api(code, _) => *code,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self.error_code() {
            ErrorCode::InvalidRequest | ErrorCode::PlaylistNotAllowed => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ValidationError> for HttpServerError {
    fn from(e: ValidationError) -> Self {
        Self::Api(e.error_code(), e.to_string())
    }
}

impl From<StoreError> for HttpServerError {
    fn from(e: StoreError) -> Self {
        Self::Api(e.error_code(), e.to_string())
    }
}

impl From<DispatchError> for HttpServerError {
    fn from(e: DispatchError) -> Self {
        Self::Api(e.error_code(), e.to_string())
    }
}

impl IntoResponse for HttpServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code();
        let message = match self {
            Self::Api(_, msg) | Self::Internal(msg) => msg,
        };

        let body = serde_json::json!({
            "success": false,
            "error": message,
            "error_code": error_code.as_str(),
        });

        (status, Json(body)).into_response()
    }
}
