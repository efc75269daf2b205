//! Client for a separately deployed extraction service.
//!
//! The service exposes `GET /api/info?url=` returning video metadata and
//! `POST /api/download {url, format}` returning the media file.

use std::time::Duration;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use reqwest::{header, Client, Response};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::error::ResolverError;
use super::types::{RemoteMedia, RemoteVideoInfo};
use super::url::VideoUrl;
use super::{media_filename, MediaExtractor};
use crate::converter::FormatSpec;

static FILENAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"filename="?([^";]+)"?"#).unwrap());
/// RFC 5987 form, sent alongside the ASCII fallback for non-ASCII titles.
static EXTENDED_FILENAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)filename\*\s*=\s*utf-8'[^']*'([^;\s]+)").unwrap());

/// Extraction service client.
pub struct HttpExtractor {
    client: Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct ServiceInfo {
    title: Option<String>,
    duration: Option<f64>,
    thumbnail: Option<String>,
    author: Option<String>,
    view_count: Option<u64>,
}

#[derive(Debug, Serialize)]
struct DownloadRequest<'a> {
    url: &'a str,
    format: &'a str,
}

#[derive(Debug, Deserialize)]
struct ServiceError {
    error: String,
}

impl HttpExtractor {
    /// Create a new client for the service at `base_url`.
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, ResolverError> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ResolverError::InvalidInput(
                "extraction service base_url is empty".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Turns a non-success response into a resolution error carrying the service message.
    async fn error_for(response: Response) -> ResolverError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ServiceError>(&body)
            .map(|e| e.error)
            .unwrap_or_else(|_| {
                if body.trim().is_empty() {
                    format!("extraction service returned {}", status)
                } else {
                    body.trim().to_string()
                }
            });

        if status.is_client_error() {
            ResolverError::InvalidInput(message)
        } else {
            ResolverError::Resolution(message)
        }
    }

    fn map_send_error(e: reqwest::Error) -> ResolverError {
        if e.is_connect() {
            warn!("Extraction service unreachable: {}", e);
            ResolverError::unavailable()
        } else {
            ResolverError::Http(e)
        }
    }
}

#[async_trait]
impl MediaExtractor for HttpExtractor {
    fn name(&self) -> &str {
        "http"
    }

    async fn probe(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                info!("Extraction service reachable at {}", self.base_url);
            }
            Ok(response) => warn!(
                "Extraction service health check at {} returned {}",
                self.base_url,
                response.status()
            ),
            Err(e) => warn!(
                "Extraction service health check at {} failed: {}",
                self.base_url, e
            ),
        }
        // A configured service counts as available, it may come up after us
        true
    }

    async fn fetch_info(&self, url: &VideoUrl) -> Result<RemoteVideoInfo, ResolverError> {
        let endpoint = format!("{}/api/info", self.base_url);
        debug!("Extraction service info: url='{}'", url.as_str());

        let response = self
            .client
            .get(&endpoint)
            .query(&[("url", url.as_str())])
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let raw: ServiceInfo = response.json().await.map_err(|e| {
            ResolverError::Resolution(format!("Failed to parse info response: {}", e))
        })?;

        let defaults = RemoteVideoInfo::default();
        Ok(RemoteVideoInfo {
            title: raw.title.unwrap_or(defaults.title),
            duration_seconds: raw
                .duration
                .filter(|d| d.is_finite() && *d > 0.0)
                .map(|d| d.round() as u64)
                .unwrap_or(0),
            thumbnail_url: raw.thumbnail.unwrap_or_default(),
            author: raw.author.unwrap_or(defaults.author),
            view_count: raw.view_count,
        })
    }

    async fn fetch_media(
        &self,
        url: &VideoUrl,
        spec: &'static FormatSpec,
    ) -> Result<RemoteMedia, ResolverError> {
        let endpoint = format!("{}/api/download", self.base_url);
        debug!(
            "Extraction service download: url='{}', format={}",
            url.as_str(),
            spec.token
        );

        let response = self
            .client
            .post(&endpoint)
            .json(&DownloadRequest {
                url: url.as_str(),
                format: spec.token,
            })
            .send()
            .await
            .map_err(Self::map_send_error)?;

        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }

        let title = response
            .headers()
            .get(header::CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(filename_stem);
        let content_length = response.content_length();

        Ok(RemoteMedia {
            stream: response.bytes_stream().map_err(ResolverError::Http).boxed(),
            mime_type: spec.mime_type.to_string(),
            filename: media_filename(title.as_deref(), spec),
            content_length,
        })
    }
}

/// Stem of the file name announced in a Content-Disposition header.
fn filename_stem(disposition: &str) -> Option<String> {
    let extended = EXTENDED_FILENAME_RE
        .captures(disposition)
        .and_then(|caps| caps.get(1))
        .and_then(|encoded| urlencoding::decode(encoded.as_str()).ok());
    let name = match extended {
        Some(decoded) => decoded.into_owned(),
        None => FILENAME_RE
            .captures(disposition)?
            .get(1)?
            .as_str()
            .to_string(),
    };
    let name = name.trim();
    let stem = match name.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => name,
    };
    Some(stem.to_string())
}
