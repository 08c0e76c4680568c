//! Image generation service client.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;

use reelgen_models::ShotType;

use crate::config::{build_http_client, endpoint, ImageServiceConfig};
use crate::error::{ClientError, ClientResult};

const GENERATIONS_PATH: &str = "v1/images/generations";

/// Portrait canvas the reference images are generated at.
pub const IMAGE_SIZE: &str = "1080x1920";

/// External image generator. Returns a temporary URL to the image.
#[async_trait]
pub trait ImageGenerationService: Send + Sync {
    async fn generate(&self, prompt: &str, shot: ShotType) -> ClientResult<String>;
}

#[derive(Debug, Serialize)]
struct GenerationBody<'a> {
    prompt: &'a str,
    size: &'a str,
    shot: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerationResponse {
    #[serde(default)]
    data: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    url: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpImageClient {
    client: Client,
    api_key: String,
    generations_url: Url,
}

impl HttpImageClient {
    pub fn new(config: ImageServiceConfig) -> ClientResult<Self> {
        Ok(Self {
            client: build_http_client(config.request_timeout)?,
            generations_url: endpoint(&config.base_url, GENERATIONS_PATH)?,
            api_key: config.api_key,
        })
    }

    pub fn from_env() -> ClientResult<Self> {
        Self::new(ImageServiceConfig::from_env()?)
    }
}

#[async_trait]
impl ImageGenerationService for HttpImageClient {
    async fn generate(&self, prompt: &str, shot: ShotType) -> ClientResult<String> {
        debug!(shot = shot.as_str(), "Requesting reference image");

        let response = self
            .client
            .post(self.generations_url.clone())
            .bearer_auth(&self.api_key)
            .json(&GenerationBody {
                prompt,
                size: IMAGE_SIZE,
                shot: shot.as_str(),
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::Http {
                status: status.as_u16(),
                body: response.text().await.unwrap_or_default(),
            });
        }

        let body: GenerationResponse = response.json().await?;
        body.data
            .into_iter()
            .find_map(|image| image.url.filter(|u| !u.is_empty()))
            .ok_or_else(|| ClientError::invalid_response("image response has no URL"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> HttpImageClient {
        HttpImageClient::new(ImageServiceConfig::new(&server.uri(), "img-key").unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_generate_returns_first_url() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/images/generations"))
            .and(body_partial_json(json!({"size": "1080x1920", "shot": "close_up"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [{"url": "https://tmp.example/img.png"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let url = client(&server)
            .generate("presenter, face and shoulders", ShotType::CloseUp)
            .await
            .unwrap();
        assert_eq!(url, "https://tmp.example/img.png");
    }

    #[tokio::test]
    async fn test_empty_data_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
            .mount(&server)
            .await;

        let err = client(&server).generate("p", ShotType::Wide).await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn test_throttled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&server)
            .await;

        let err = client(&server).generate("p", ShotType::Medium).await.unwrap_err();
        assert!(err.is_transient());
    }
}
