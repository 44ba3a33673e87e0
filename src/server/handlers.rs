//! HTTP route handlers

use super::extract::{ClientIdentity, DownloadRequest, JsonOrForm, PreviewRequest};
use super::AppState;
use crate::core::PreviewEntry;
use crate::download::Occupancy;
use crate::error::ServiceError;
use crate::utils::{mime_for_path, validate_served_name};
use axum::body::Body;
use axum::extract::{Form, Path, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::io::ReaderStream;
use tracing::{debug, info};

/// Characters kept verbatim in an RFC 5987 `filename*` value
const FILENAME_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Serialize)]
pub struct PreviewResponse {
    pub success: bool,
    #[serde(flatten)]
    pub entry: PreviewEntry,
}

#[derive(Debug, Serialize)]
pub struct DownloadDescriptor {
    pub success: bool,
    pub filename: String,
    pub title: String,
    pub filesize: u64,
    pub strategy_used: String,
    pub has_cookies: bool,
    pub download_url: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub cache_size: u64,
    pub rate_limit_entries: usize,
    pub downloads: Occupancy,
    pub has_cookies: bool,
}

#[derive(Debug, Serialize)]
pub struct CleanupResponse {
    pub removed: usize,
}

#[derive(Debug, Serialize)]
pub struct PurgeResponse {
    pub success: bool,
}

/// `POST /api/preview`
pub async fn preview(
    State(state): State<Arc<AppState>>,
    ClientIdentity(caller): ClientIdentity,
    JsonOrForm(body): JsonOrForm<PreviewRequest>,
) -> Result<Json<PreviewResponse>, ServiceError> {
    state.admit(&caller)?;
    let url = body.url()?;

    let entry = state.preview(&url).await?;
    Ok(Json(PreviewResponse {
        success: true,
        entry,
    }))
}

/// `POST /api/download`
pub async fn download(
    State(state): State<Arc<AppState>>,
    ClientIdentity(caller): ClientIdentity,
    JsonOrForm(body): JsonOrForm<DownloadRequest>,
) -> Result<Json<DownloadDescriptor>, ServiceError> {
    state.admit(&caller)?;
    let (url, format, quality) = body.parse()?;

    let file = state.download(&url, format, quality).await?;
    info!("Prepared {} for {}", file.filename, caller);

    Ok(Json(DownloadDescriptor {
        success: true,
        download_url: format!(
            "/api/file/{}",
            utf8_percent_encode(&file.filename, FILENAME_ENCODE_SET)
        ),
        filename: file.filename,
        title: file.title,
        filesize: file.size_bytes,
        strategy_used: file.persona.name().to_string(),
        has_cookies: state.has_cookies(),
    }))
}

/// `POST /download`: download and stream the file back in one request
pub async fn download_attachment(
    State(state): State<Arc<AppState>>,
    ClientIdentity(caller): ClientIdentity,
    Form(body): Form<DownloadRequest>,
) -> Result<Response, ServiceError> {
    state.admit(&caller)?;
    let (url, format, quality) = body.parse()?;

    let file = state.download(&url, format, quality).await?;
    serve_and_schedule(&state, file.path, &file.filename).await
}

/// `GET /api/file/{name}`
pub async fn get_file(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, ServiceError> {
    validate_served_name(&name)?;

    let path = state.options.downloads_dir.join(&name);
    serve_and_schedule(&state, path, &name).await
}

/// `GET /health`
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let sweeper = Arc::clone(&state.sweeper);
    let downloads = tokio::task::spawn_blocking(move || sweeper.occupancy())
        .await
        .unwrap_or_default();

    Json(HealthResponse {
        status: "ok",
        timestamp: Utc::now(),
        cache_size: state.cache.len().await,
        rate_limit_entries: state.limiter.len(),
        downloads,
        has_cookies: state.has_cookies(),
    })
}

/// `POST /api/cleanup`
pub async fn cleanup(
    State(state): State<Arc<AppState>>,
) -> Result<Json<CleanupResponse>, ServiceError> {
    let sweeper = Arc::clone(&state.sweeper);
    let report = tokio::task::spawn_blocking(move || sweeper.sweep_now())
        .await
        .map_err(|e| ServiceError::Internal(format!("sweep task failed: {}", e)))?;

    Ok(Json(CleanupResponse {
        removed: report.removed,
    }))
}

/// `POST /api/purge`
pub async fn purge(State(state): State<Arc<AppState>>) -> Result<Json<PurgeResponse>, ServiceError> {
    let sweeper = Arc::clone(&state.sweeper);
    tokio::task::spawn_blocking(move || sweeper.purge())
        .await
        .map_err(|e| ServiceError::Internal(format!("purge task failed: {}", e)))??;

    Ok(Json(PurgeResponse { success: true }))
}

/// Fallback for unknown routes
pub async fn not_found() -> ServiceError {
    ServiceError::NotFound("no such route".to_string())
}

/// Stream `path` as an attachment and delete it after the grace period
async fn serve_and_schedule(
    state: &Arc<AppState>,
    path: PathBuf,
    filename: &str,
) -> Result<Response, ServiceError> {
    let file = match tokio::fs::File::open(&path).await {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(ServiceError::NotFound(filename.to_string()));
        }
        Err(e) => return Err(e.into()),
    };

    let metadata = file.metadata().await?;
    if !metadata.is_file() {
        return Err(ServiceError::NotFound(filename.to_string()));
    }

    let content_type = mime_for_path(&path);
    state.sweeper.schedule_removal(path);
    debug!("Serving {} ({} bytes)", filename, metadata.len());

    let mut response = Body::from_stream(ReaderStream::new(file)).into_response();

    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(metadata.len()));
    if let Ok(value) = HeaderValue::from_str(&content_disposition(filename)) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    Ok(response)
}

/// `attachment` disposition with an ASCII fallback and the UTF-8 name
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        utf8_percent_encode(filename, FILENAME_ENCODE_SET)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_disposition_ascii() {
        assert_eq!(
            content_disposition("My Clip.mp4"),
            "attachment; filename=\"My Clip.mp4\"; filename*=UTF-8''My%20Clip.mp4"
        );
    }

    #[test]
    fn test_content_disposition_unicode() {
        let value = content_disposition("Canção \"1\".mp3");
        assert!(value.starts_with("attachment; filename=\"Can__o _1_.mp3\""));
        assert!(value.ends_with("filename*=UTF-8''Can%C3%A7%C3%A3o%20%221%22.mp3"));
        assert!(HeaderValue::from_str(&value).is_ok());
    }
}
