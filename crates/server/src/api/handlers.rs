use axum::{
    extract::State,
    http::{header, HeaderValue, StatusCode},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use transmux_core::{ConverterError, MediaKind, ResolverError, SanitizedConfig};

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

/// Nonstandard status for requests abandoned by the client.
const CLIENT_CLOSED_REQUEST: u16 = 499;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Error half of every fallible handler.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

pub fn converter_error(e: &ConverterError) -> ApiError {
    let status = match e {
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        ConverterError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        ConverterError::Cancelled => StatusCode::from_u16(CLIENT_CLOSED_REQUEST)
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, e.user_message())
}

pub fn resolver_error(e: &ResolverError) -> ApiError {
    let status = match e {
        e if e.is_client_error() => StatusCode::BAD_REQUEST,
        ResolverError::ExtractionUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        ResolverError::Resolution(_) | ResolverError::Http(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, e.to_string())
}

/// `Content-Disposition` for a file download.
///
/// The quoted `filename` is an ASCII fallback; `filename*` carries the exact
/// UTF-8 name for clients that understand RFC 5987.
pub fn attachment_disposition(filename: &str) -> HeaderValue {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii() && !c.is_ascii_control() && c != '"' && c != '\\' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let value = format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    );
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("attachment"))
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    /// Transcoding engine lifecycle state.
    pub engine: String,
    pub extraction_available: bool,
    pub extraction_backend: Option<String>,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let resolver = state.resolver();
    Json(HealthResponse {
        status: "ok".to_string(),
        engine: state.orchestrator().session().state().as_str().to_string(),
        extraction_available: resolver.is_available(),
        extraction_backend: resolver.backend_name().map(str::to_string),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

#[derive(Debug, Serialize)]
pub struct FormatEntry {
    pub token: &'static str,
    pub kind: MediaKind,
    pub mime_type: &'static str,
}

/// GET /formats
///
/// Output formats accepted by `/convert/media`.
pub async fn list_formats(State(state): State<Arc<AppState>>) -> Json<Vec<FormatEntry>> {
    let formats = state
        .orchestrator()
        .registry()
        .all()
        .iter()
        .map(|spec| FormatEntry {
            token: spec.token,
            kind: spec.kind,
            mime_type: spec.mime_type,
        })
        .collect();
    Json(formats)
}

/// GET /metrics
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state);
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
