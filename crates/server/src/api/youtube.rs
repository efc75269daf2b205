//! Remote video API handlers.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    http::{header, StatusCode},
    response::Response,
    Json,
};
use serde::Deserialize;
use transmux_core::RemoteVideoInfo;

use super::handlers::{api_error, attachment_disposition, resolver_error, ApiError};
use crate::state::AppState;

// ============================================================================
// Request types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct InfoParams {
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadRequest {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_format")]
    pub format: String,
}

fn default_format() -> String {
    "mp4".to_string()
}

fn required_url(url: Option<String>) -> Result<String, ApiError> {
    match url {
        Some(url) if !url.trim().is_empty() => Ok(url.trim().to_string()),
        _ => Err(api_error(StatusCode::BAD_REQUEST, "URL is required")),
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /youtube/info?url=
///
/// Look up title, duration, thumbnail and author of a video.
pub async fn get_info(
    State(state): State<Arc<AppState>>,
    params: Result<Query<InfoParams>, QueryRejection>,
) -> Result<Json<RemoteVideoInfo>, ApiError> {
    let Query(params) = params.map_err(|e| api_error(StatusCode::BAD_REQUEST, e.body_text()))?;
    let url = required_url(params.url)?;

    state
        .resolver()
        .fetch_info(&url)
        .await
        .map(Json)
        .map_err(|e| resolver_error(&e))
}

/// POST /youtube/download
///
/// Stream a video converted to `format` (default `mp4`).
pub async fn download(
    State(state): State<Arc<AppState>>,
    body: Result<Json<DownloadRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body.map_err(|e| api_error(StatusCode::BAD_REQUEST, e.body_text()))?;
    let url = required_url(request.url)?;

    let media = state
        .resolver()
        .fetch_media(&url, &request.format)
        .await
        .map_err(|e| resolver_error(&e))?;

    let mut response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, media.mime_type.as_str())
        .header(
            header::CONTENT_DISPOSITION,
            attachment_disposition(&media.filename),
        );
    if let Some(length) = media.content_length {
        response = response.header(header::CONTENT_LENGTH, length);
    }

    response
        .body(Body::from_stream(media.stream))
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
