//! Service endpoints and credentials.

use std::time::Duration;
use url::Url;

use crate::error::{ClientError, ClientResult};

pub const DEFAULT_VIDEO_MODEL: &str = "veo3_fast";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
/// Artifact downloads stream larger bodies
pub const DEFAULT_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct VideoServiceConfig {
    pub base_url: Url,
    pub api_key: String,
    pub model: String,
    pub request_timeout: Duration,
}

impl VideoServiceConfig {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> ClientResult<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            api_key: api_key.into(),
            model: DEFAULT_VIDEO_MODEL.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// `VIDEO_API_BASE_URL`, `VIDEO_API_KEY`, `VIDEO_MODEL`.
    pub fn from_env() -> ClientResult<Self> {
        let mut config = Self::new(&required_env("VIDEO_API_BASE_URL")?, required_env("VIDEO_API_KEY")?)?;
        if let Ok(model) = std::env::var("VIDEO_MODEL") {
            if !model.trim().is_empty() {
                config.model = model;
            }
        }
        Ok(config)
    }
}

#[derive(Debug, Clone)]
pub struct ImageServiceConfig {
    pub base_url: Url,
    pub api_key: String,
    pub request_timeout: Duration,
}

impl ImageServiceConfig {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> ClientResult<Self> {
        Ok(Self {
            base_url: parse_base_url(base_url)?,
            api_key: api_key.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }

    /// `IMAGE_API_BASE_URL`, `IMAGE_API_KEY`.
    pub fn from_env() -> ClientResult<Self> {
        Self::new(&required_env("IMAGE_API_BASE_URL")?, required_env("IMAGE_API_KEY")?)
    }
}

fn required_env(name: &str) -> ClientResult<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| ClientError::config(format!("{name} not set")))
}

/// Parse a base URL so that `join` appends rather than replaces the path.
pub(crate) fn parse_base_url(raw: &str) -> ClientResult<Url> {
    let with_slash = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{raw}/")
    };
    Url::parse(&with_slash).map_err(|e| ClientError::config(format!("invalid base URL {raw}: {e}")))
}

pub(crate) fn endpoint(base: &Url, path: &str) -> ClientResult<Url> {
    base.join(path.trim_start_matches('/'))
        .map_err(|e| ClientError::config(format!("invalid endpoint {path}: {e}")))
}

pub(crate) fn build_http_client(timeout: Duration) -> ClientResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("reelgen/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| ClientError::config(format!("failed to build HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_keeps_base_path() {
        let base = parse_base_url("https://gw.example.com/proxy").unwrap();
        assert_eq!(
            endpoint(&base, "/api/v1/veo/generate").unwrap().as_str(),
            "https://gw.example.com/proxy/api/v1/veo/generate"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(VideoServiceConfig::new("not a url", "k"), Err(ClientError::Config(_))));
    }
}
