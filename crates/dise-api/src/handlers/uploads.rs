//! Upload intake and preview handlers.

use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use axum::Json;
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::{AppState, UploadSession};

/// Extensions the intake accepts.
const ALLOWED_EXTENSIONS: [&str; 3] = ["mp4", "mov", "avi"];

/// Upload response.
#[derive(Serialize)]
pub struct UploadResponse {
    pub upload_id: Uuid,
    pub filename: String,
    pub size_bytes: u64,
}

fn has_allowed_extension(filename: &str) -> bool {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| ALLOWED_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

/// Accept a browser-uploaded video and materialize it as a local file.
///
/// The temp file is always suffixed `.mp4` whatever the original
/// container was; the remote upload later declares `video/mp4`. The
/// original filename is kept on the session for display.
pub async fn create_upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<UploadResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .map(|n| n.to_string())
            .ok_or_else(|| ApiError::bad_request("Upload is missing a filename"))?;

        if !has_allowed_extension(&filename) {
            return Err(ApiError::bad_request(
                "Unsupported file type (expected mp4, mov, or avi)",
            ));
        }

        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("Failed to read upload: {}", e)))?;

        if data.is_empty() {
            return Err(ApiError::bad_request("Uploaded file is empty"));
        }

        let temp_file = tempfile::Builder::new()
            .prefix("dise-")
            .suffix(".mp4")
            .tempfile()
            .map_err(|e| ApiError::internal(format!("Failed to create temp file: {}", e)))?;

        tokio::fs::write(temp_file.path(), &data)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to store upload: {}", e)))?;

        let size_bytes = data.len() as u64;
        let session = state
            .insert_session(UploadSession::new(filename.clone(), temp_file, size_bytes))
            .await;

        metrics::record_upload(size_bytes);
        info!(
            upload_id = %session.id,
            size_bytes,
            "Video stored for analysis"
        );

        return Ok(Json(UploadResponse {
            upload_id: session.id,
            filename,
            size_bytes,
        }));
    }

    Err(ApiError::bad_request("Missing 'file' field"))
}

/// Parse a single `bytes=start-end` range against a known length.
fn parse_range(header: &str, len: u64) -> Option<(u64, u64)> {
    let spec = header.strip_prefix("bytes=")?;
    // Multi-range requests are not supported for the preview player.
    if spec.contains(',') {
        return None;
    }
    let (start, end) = spec.split_once('-')?;
    let start: u64 = start.parse().ok()?;
    let end: u64 = match end {
        "" => len.saturating_sub(1),
        e => e.parse().ok()?,
    };
    if start > end || end >= len {
        return None;
    }
    Some((start, end))
}

/// Serve the uploaded video for the preview player.
pub async fn stream_video(
    State(state): State<AppState>,
    Path(upload_id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let session = state
        .session(&upload_id)
        .await
        .ok_or_else(|| ApiError::not_found("Upload not found"))?;

    let bytes = tokio::fs::read(session.video_path())
        .await
        .map_err(|e| ApiError::internal(format!("Failed to read video: {}", e)))?;
    let total_len = bytes.len() as u64;

    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| parse_range(v, total_len));

    let mut builder = Response::builder()
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::ACCEPT_RANGES, "bytes");

    let body = if let Some((start, end)) = range {
        builder = builder
            .status(StatusCode::PARTIAL_CONTENT)
            .header(
                header::CONTENT_RANGE,
                format!("bytes {}-{}/{}", start, end, total_len),
            )
            .header(header::CONTENT_LENGTH, end - start + 1);
        bytes[start as usize..=end as usize].to_vec()
    } else {
        builder = builder
            .status(StatusCode::OK)
            .header(header::CONTENT_LENGTH, total_len);
        bytes
    };

    builder
        .body(Body::from(body))
        .map_err(|e| ApiError::internal(format!("Failed to build response: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extension_allow_list() {
        assert!(has_allowed_extension("exam.mp4"));
        assert!(has_allowed_extension("exam.MOV"));
        assert!(has_allowed_extension("exam.avi"));
        assert!(!has_allowed_extension("exam.mkv"));
        assert!(!has_allowed_extension("exam"));
        assert!(!has_allowed_extension("exam.mp4.exe"));
    }

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("bytes=0-99", 200), Some((0, 99)));
        assert_eq!(parse_range("bytes=100-", 200), Some((100, 199)));
        assert_eq!(parse_range("bytes=0-199", 200), Some((0, 199)));
        // Out of bounds, inverted, or multi-range specs are ignored.
        assert_eq!(parse_range("bytes=0-200", 200), None);
        assert_eq!(parse_range("bytes=50-10", 200), None);
        assert_eq!(parse_range("bytes=0-10,20-30", 200), None);
        assert_eq!(parse_range("items=0-10", 200), None);
    }
}
