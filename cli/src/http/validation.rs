//! 基础请求验证逻辑

use axum::body::Bytes;
use tubefetch_core::api::{MediaFormat, ValidationError};

use super::models::DownloadRequest;

/// 解析 `POST /download_video` 的请求体
///
/// URL 的合法性和播放列表规则由 dispatcher 判断，这里只处理 JSON 形状。
pub fn parse_download_body(body: &Bytes) -> Result<(String, MediaFormat), ValidationError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(ValidationError::MissingUrl);
    }
    let req: DownloadRequest = serde_json::from_slice(body)
        .map_err(|e| ValidationError::MalformedBody(e.to_string()))?;

    let url = req
        .url
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or(ValidationError::MissingUrl)?;

    Ok((url, MediaFormat::parse_lenient(req.format.as_deref())))
}
