//! Media conversion API handler.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::Response,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};
use transmux_core::{ConversionRequest, ProgressEvent};

use super::handlers::{api_error, attachment_disposition, converter_error, ApiError};
use crate::state::AppState;

/// Progress events buffered between the engine and the log forwarder.
const PROGRESS_BUFFER: usize = 32;

/// Fields collected from the upload form.
#[derive(Debug, Default)]
struct ConvertForm {
    file: Option<(String, axum::body::Bytes)>,
    target_format: Option<String>,
}

async fn read_form(multipart: &mut Multipart) -> Result<ConvertForm, ApiError> {
    let mut form = ConvertForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(e.status(), e.body_text()))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().unwrap_or("").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| api_error(e.status(), format!("Failed to read file: {}", e)))?;
                form.file = Some((filename, bytes));
            }
            "targetFormat" | "format" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| api_error(e.status(), e.body_text()))?;
                if !text.trim().is_empty() {
                    form.target_format = Some(text);
                }
            }
            _ => {}
        }
    }

    Ok(form)
}

/// POST /convert/media
///
/// Converts the uploaded `file` to `targetFormat` and returns the converted
/// bytes as an attachment.
pub async fn convert_media(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Response, ApiError> {
    let form = read_form(&mut multipart).await?;

    let Some((filename, bytes)) = form.file else {
        return Err(api_error(StatusCode::BAD_REQUEST, "No file provided"));
    };
    let Some(target_format) = form.target_format else {
        return Err(api_error(StatusCode::BAD_REQUEST, "No target format provided"));
    };

    // The job runs in its own task so an abandoned request still cleans up:
    // dropping this handler cancels the token and the task unwinds.
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    let (progress_tx, mut progress_rx) = mpsc::channel::<ProgressEvent>(PROGRESS_BUFFER);
    let progress_name = filename.clone();
    tokio::spawn(async move {
        while let Some(event) = progress_rx.recv().await {
            debug!(file = %progress_name, percent = event.percent, "Conversion progress");
        }
    });

    let orchestrator = Arc::clone(state.orchestrator());
    let request = ConversionRequest::new(bytes, filename, target_format);
    let job = tokio::spawn(async move {
        orchestrator
            .convert(request, Some(progress_tx), cancel)
            .await
    });

    let result = job.await.map_err(|e| {
        error!(error = %e, "Conversion task panicked");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, "Conversion task failed")
    })?;
    guard.disarm();

    let result = result.map_err(|e| converter_error(&e))?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, result.mime_type.as_str())
        .header(
            header::CONTENT_DISPOSITION,
            attachment_disposition(&result.suggested_filename),
        )
        .header(header::CONTENT_LENGTH, result.bytes.len())
        .body(Body::from(result.bytes))
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}
