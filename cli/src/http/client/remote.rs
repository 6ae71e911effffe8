//! 远程客户端 - 通过 HTTP 调用任务服务

use std::{error::Error as StdError, fmt, time::Duration};

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use tubefetch_core::api::{MediaFormat, RemoteTask};

const BODY_PREVIEW_LIMIT: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiClientErrorKind {
    Timeout,
    Connect,
    Request,
    Body,
    Decode,
    Status,
    Unknown,
}

impl ApiClientErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Connect => "connect",
            Self::Request => "request",
            Self::Body => "body",
            Self::Decode => "decode",
            Self::Status => "status",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ApiClientErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub struct ApiClientError {
    kind: ApiClientErrorKind,
    status: Option<u16>,
    url: Option<String>,
    message: String,
    source: Option<anyhow::Error>,
}

impl ApiClientError {
    pub fn kind(&self) -> ApiClientErrorKind {
        self.kind
    }

    pub fn status(&self) -> Option<u16> {
        self.status
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    /// Text for the user: the server's `error` field for rejected requests,
    /// otherwise a short transport description.
    pub fn user_message(&self) -> String {
        match (self.kind, self.status) {
            (ApiClientErrorKind::Status, _) => self.message.clone(),
            (ApiClientErrorKind::Decode, Some(status)) => format!("HTTP {status}: unexpected response"),
            _ => format!("{}: {}", self.kind, self.message),
        }
    }

    fn from_reqwest(err: reqwest::Error, url: String) -> Self {
        let kind = if err.is_timeout() {
            ApiClientErrorKind::Timeout
        } else if err.is_connect() {
            ApiClientErrorKind::Connect
        } else if err.is_request() {
            ApiClientErrorKind::Request
        } else if err.is_body() {
            ApiClientErrorKind::Body
        } else if err.is_decode() {
            ApiClientErrorKind::Decode
        } else {
            ApiClientErrorKind::Unknown
        };
        let status = err.status().map(|s| s.as_u16());
        let message = err.to_string();
        ApiClientError {
            kind,
            status,
            url: Some(url),
            message,
            source: Some(anyhow::Error::new(err)),
        }
    }

    fn status_error(status: u16, url: String, body: &str) -> Self {
        let message = server_error_message(body).unwrap_or_else(|| format!("HTTP {status}"));
        ApiClientError {
            kind: ApiClientErrorKind::Status,
            status: Some(status),
            url: Some(url),
            message,
            source: None,
        }
    }

    fn decode_error(status: u16, url: String, err: serde_json::Error, preview: String) -> Self {
        let message = format!("failed to decode response body: {} | body={}", err, preview);
        ApiClientError {
            kind: ApiClientErrorKind::Decode,
            status: Some(status),
            url: Some(url),
            message,
            source: Some(anyhow::Error::new(err)),
        }
    }

    fn build(err: reqwest::Error) -> Self {
        ApiClientError {
            kind: ApiClientErrorKind::Request,
            status: None,
            url: None,
            message: err.to_string(),
            source: Some(anyhow::Error::new(err)),
        }
    }
}

impl fmt::Display for ApiClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "api error kind={}", self.kind)?;
        if let Some(status) = self.status {
            write!(f, " status={}", status)?;
        }
        if let Some(url) = &self.url {
            write!(f, " url={}", url)?;
        }
        write!(f, ": {}", self.message)
    }
}

impl StdError for ApiClientError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|err| &**err as &(dyn StdError + 'static))
    }
}

fn server_error_message(body: &str) -> Option<String> {
    let v: Value = serde_json::from_str(body).ok()?;
    v.get("error")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn preview_body(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return "<empty body>".to_string();
    }

    let mut out: String = trimmed.chars().take(BODY_PREVIEW_LIMIT).collect();
    if trimmed.chars().count() > BODY_PREVIEW_LIMIT {
        out.push_str("...");
    }
    out
}

async fn parse_json_response<T: DeserializeOwned>(
    resp: reqwest::Response,
) -> Result<T, ApiClientError> {
    let status = resp.status();
    let url = resp.url().to_string();
    let body = resp
        .text()
        .await
        .map_err(|err| ApiClientError::from_reqwest(err, url.clone()))?;

    if !status.is_success() {
        return Err(ApiClientError::status_error(status.as_u16(), url, &body));
    }

    serde_json::from_str::<T>(&body)
        .map_err(|err| ApiClientError::decode_error(status.as_u16(), url, err, preview_body(&body)))
}

#[derive(Debug, Serialize)]
struct SubmitBody<'a> {
    url: &'a str,
    format: MediaFormat,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SubmitAccepted {
    pub task_id: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CancelReply {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

/// Client for the task service endpoints.
#[derive(Clone)]
pub struct TaskApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl TaskApiClient {
    pub fn new(base_url: &str, timeout_ms: u64) -> Result<Self, ApiClientError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .build()
            .map_err(ApiClientError::build)?;
        Ok(Self {
            http,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn submit(
        &self,
        url: &str,
        format: MediaFormat,
    ) -> Result<SubmitAccepted, ApiClientError> {
        let endpoint = format!("{}/download_video", self.base_url);
        tracing::debug!(target: "tubefetch.client", endpoint = %endpoint, %format, "submitting");
        let resp = self
            .http
            .post(&endpoint)
            .json(&SubmitBody { url, format })
            .send()
            .await
            .map_err(|err| ApiClientError::from_reqwest(err, endpoint.clone()))?;
        let accepted: SubmitAccepted = parse_json_response(resp).await?;
        if accepted.task_id.trim().is_empty() {
            return Err(ApiClientError {
                kind: ApiClientErrorKind::Decode,
                status: None,
                url: Some(endpoint),
                message: "No task_id returned by the API.".to_string(),
                source: None,
            });
        }
        Ok(accepted)
    }

    pub async fn get_task(&self, task_id: &str) -> Result<RemoteTask, ApiClientError> {
        let endpoint = format!("{}/tasks/{}", self.base_url, task_id);
        let resp = self
            .http
            .get(&endpoint)
            .send()
            .await
            .map_err(|err| ApiClientError::from_reqwest(err, endpoint.clone()))?;
        parse_json_response(resp).await
    }

    pub async fn cancel(&self, task_id: &str) -> Result<CancelReply, ApiClientError> {
        let endpoint = format!("{}/tasks/{}", self.base_url, task_id);
        let resp = self
            .http
            .delete(&endpoint)
            .send()
            .await
            .map_err(|err| ApiClientError::from_reqwest(err, endpoint.clone()))?;
        parse_json_response(resp).await
    }

    pub async fn list(&self) -> Result<Vec<RemoteTask>, ApiClientError> {
        let endpoint = format!("{}/tasks", self.base_url);
        let resp = self
            .http
            .get(&endpoint)
            .send()
            .await
            .map_err(|err| ApiClientError::from_reqwest(err, endpoint.clone()))?;
        parse_json_response(resp).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use tubefetch_core::api::RemoteStatus;

    #[test]
    fn test_preview_body_empty() {
        assert_eq!(preview_body("   "), "<empty body>");
    }

    #[test]
    fn test_preview_body_truncates() {
        let body = "a".repeat(BODY_PREVIEW_LIMIT + 10);
        let preview = preview_body(&body);
        assert!(preview.ends_with("..."));
        assert_eq!(preview.len(), BODY_PREVIEW_LIMIT + 3);
    }

    #[test]
    fn test_status_error_display_and_user_message() {
        let err = ApiClientError::status_error(
            400,
            "http://ha.local:5000/download_video".to_string(),
            r#"{"error":"invalid url","error_code":"INVALID_REQUEST"}"#,
        );
        let msg = err.to_string();
        assert!(msg.contains("kind=status"));
        assert!(msg.contains("status=400"));
        assert!(msg.contains("url=http://ha.local:5000/download_video"));
        assert_eq!(err.user_message(), "invalid url");
    }

    #[test]
    fn test_status_error_without_json_body() {
        let err = ApiClientError::status_error(502, "http://x/tasks/1".into(), "<html>");
        assert_eq!(err.user_message(), "HTTP 502");
    }

    #[tokio::test]
    async fn test_submit_posts_url_and_format() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/download_video")
            .match_body(Matcher::Json(serde_json::json!({
                "url": "https://www.youtube.com/watch?v=abc123",
                "format": "mp3"
            })))
            .with_status(202)
            .with_header("content-type", "application/json")
            .with_body(r#"{"status":"processing","task_id":"t-1"}"#)
            .create_async()
            .await;

        let client = TaskApiClient::new(&format!("{}/", server.url()), 1_000).unwrap();
        let accepted = client
            .submit("https://www.youtube.com/watch?v=abc123", MediaFormat::Mp3)
            .await
            .unwrap();
        assert_eq!(accepted.task_id, "t-1");
        assert_eq!(accepted.status.as_deref(), Some("processing"));
    }

    #[tokio::test]
    async fn test_submit_surfaces_server_rejection() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/download_video")
            .with_status(400)
            .with_body(
                r#"{"error":"Playlist URLs are not allowed. Use a single video URL (e.g. youtube.com/watch?v=...).","error_code":"PLAYLIST_NOT_ALLOWED"}"#,
            )
            .create_async()
            .await;

        let client = TaskApiClient::new(&server.url(), 1_000).unwrap();
        let err = client
            .submit("https://www.youtube.com/playlist?list=PL1", MediaFormat::Mp4)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ApiClientErrorKind::Status);
        assert_eq!(err.status(), Some(400));
        assert!(err.user_message().starts_with("Playlist URLs are not allowed"));
    }

    #[tokio::test]
    async fn test_submit_without_task_id_is_an_error() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("POST", "/download_video")
            .with_status(202)
            .with_body(r#"{"status":"processing","task_id":""}"#)
            .create_async()
            .await;

        let client = TaskApiClient::new(&server.url(), 1_000).unwrap();
        let err = client
            .submit("https://www.youtube.com/watch?v=abc123", MediaFormat::Mp4)
            .await
            .unwrap_err();
        assert!(err.user_message().contains("No task_id"));
    }

    #[tokio::test]
    async fn test_get_task_parses_status() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/tasks/t-1")
            .with_status(200)
            .with_body(r#"{"task_id":"t-1","status":"running","progress":40}"#)
            .create_async()
            .await;

        let client = TaskApiClient::new(&server.url(), 1_000).unwrap();
        let task = client.get_task("t-1").await.unwrap();
        assert_eq!(task.status, RemoteStatus::Running);
        assert_eq!(task.percent(), Some(40));
    }

    #[tokio::test]
    async fn test_get_unknown_task_is_status_404() {
        let mut server = Server::new_async().await;
        let _m = server
            .mock("GET", "/tasks/missing")
            .with_status(404)
            .with_body(r#"{"error":"task not found"}"#)
            .create_async()
            .await;

        let client = TaskApiClient::new(&server.url(), 1_000).unwrap();
        let err = client.get_task("missing").await.unwrap_err();
        assert_eq!(err.status(), Some(404));
        assert_eq!(err.user_message(), "task not found");
    }

    #[tokio::test]
    async fn test_cancel_and_list() {
        let mut server = Server::new_async().await;
        let _d = server
            .mock("DELETE", "/tasks/t-1")
            .with_status(200)
            .with_body(r#"{"status":"cancelled","message":"Cancellation requested."}"#)
            .create_async()
            .await;
        let _l = server
            .mock("GET", "/tasks")
            .with_status(200)
            .with_body(r#"[{"task_id":"t-1","status":"cancelled"},{"task_id":"t-2","status":"paused"}]"#)
            .create_async()
            .await;

        let client = TaskApiClient::new(&server.url(), 1_000).unwrap();
        let reply = client.cancel("t-1").await.unwrap();
        assert_eq!(reply.status, "cancelled");

        let tasks = client.list().await.unwrap();
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].status, RemoteStatus::Unknown);
    }

    #[tokio::test]
    async fn test_connect_failure_is_classified() {
        // Nothing listens on port 9 (discard) in CI sandboxes.
        let client = TaskApiClient::new("http://127.0.0.1:9", 500).unwrap();
        let err = client.get_task("t-1").await.unwrap_err();
        assert!(matches!(
            err.kind(),
            ApiClientErrorKind::Connect | ApiClientErrorKind::Timeout | ApiClientErrorKind::Request
        ));
        assert!(err.url().is_some());
    }
}
