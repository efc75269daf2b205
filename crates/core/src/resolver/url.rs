//! Video URL validation.

use reqwest::Url;

use super::error::ResolverError;

/// A URL that passed validation, with the video id it points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoUrl {
    pub url: Url,
    pub video_id: String,
}

impl VideoUrl {
    pub fn as_str(&self) -> &str {
        self.url.as_str()
    }
}

/// Checks that `raw` is an http(s) URL on an allowed host that names a video.
pub fn validate_url(raw: &str, allowed_hosts: &[String]) -> Result<VideoUrl, ResolverError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ResolverError::InvalidInput("URL is required".to_string()));
    }

    let url = Url::parse(raw).map_err(|e| ResolverError::InvalidUrl(format!("{}: {}", raw, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ResolverError::InvalidUrl(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }

    let host = url
        .host_str()
        .map(str::to_ascii_lowercase)
        .ok_or_else(|| ResolverError::InvalidUrl("URL has no host".to_string()))?;

    if !allowed_hosts.iter().any(|allowed| allowed.eq_ignore_ascii_case(&host)) {
        return Err(ResolverError::InvalidUrl(format!(
            "host '{}' is not a supported video site",
            host
        )));
    }

    let video_id = extract_video_id(&url)
        .ok_or_else(|| ResolverError::InvalidUrl("URL does not point at a video".to_string()))?;

    Ok(VideoUrl { url, video_id })
}

/// Extracts the video id from the common YouTube URL shapes.
pub fn extract_video_id(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_ascii_lowercase();
    let mut segments = url.path_segments()?.filter(|s| !s.is_empty());

    let candidate = if host == "youtu.be" {
        segments.next().map(str::to_string)
    } else {
        match segments.next()? {
            "watch" => url
                .query_pairs()
                .find(|(key, _)| key == "v")
                .map(|(_, value)| value.into_owned()),
            "shorts" | "embed" | "live" | "v" => segments.next().map(str::to_string),
            _ => None,
        }
    }?;

    is_video_id(&candidate).then_some(candidate)
}

fn is_video_id(candidate: &str) -> bool {
    !candidate.is_empty()
        && candidate.len() <= 64
        && candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
