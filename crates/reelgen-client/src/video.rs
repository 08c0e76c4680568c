//! Video generation service client.
//!
//! The service is asynchronous: `submit` returns a task id immediately and
//! the clip is fetched once `poll` reports success, minutes later.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use reelgen_models::AspectRatio;

use crate::config::{build_http_client, endpoint, VideoServiceConfig};
use crate::error::{ClientError, ClientResult};

const GENERATE_PATH: &str = "api/v1/veo/generate";
const RECORD_INFO_PATH: &str = "api/v1/veo/record-info";

/// One clip generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoRequest {
    pub prompt: String,
    /// Signed URL of the reference image, if any
    pub image_url: Option<String>,
    pub seed: u32,
    pub duration_secs: u32,
    pub aspect_ratio: AspectRatio,
}

/// Status reported by one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteStatus {
    /// Still generating
    Generating,
    Succeeded { result_url: String },
    Failed { message: String },
}

impl RemoteStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RemoteStatus::Generating)
    }
}

/// External video generation service.
#[async_trait]
pub trait VideoGenerationService: Send + Sync {
    /// Submit a request. Returns the remote task id.
    async fn submit(&self, request: &VideoRequest) -> ClientResult<String>;

    /// Current status of a task. Idempotent.
    async fn poll(&self, task_id: &str) -> ClientResult<RemoteStatus>;
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateBody<'a> {
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    image_urls: Option<Vec<&'a str>>,
    model: &'a str,
    aspect_ratio: &'a str,
    seeds: u32,
    duration: u32,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: i64,
    #[serde(default)]
    msg: String,
    data: Option<T>,
}

impl<T> Envelope<T> {
    fn into_data(self) -> ClientResult<T> {
        if self.code != 200 {
            return Err(ClientError::Api {
                code: self.code,
                message: self.msg,
            });
        }
        self.data
            .ok_or_else(|| ClientError::invalid_response("response has no data"))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TaskCreated {
    task_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordInfo {
    success_flag: i64,
    error_message: Option<String>,
    response: Option<RecordResponse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordResponse {
    #[serde(default)]
    result_urls: Vec<String>,
}

impl RecordInfo {
    fn into_status(self) -> ClientResult<RemoteStatus> {
        match self.success_flag {
            0 => Ok(RemoteStatus::Generating),
            1 => self
                .response
                .and_then(|r| r.result_urls.into_iter().next())
                .map(|result_url| RemoteStatus::Succeeded { result_url })
                .ok_or_else(|| ClientError::invalid_response("success without result URL")),
            2 | 3 => Ok(RemoteStatus::Failed {
                message: self
                    .error_message
                    .filter(|m| !m.is_empty())
                    .unwrap_or_else(|| format!("generation failed (flag {})", self.success_flag)),
            }),
            other => Err(ClientError::invalid_response(format!("unknown successFlag {other}"))),
        }
    }
}

/// HTTP client for the video generation service.
#[derive(Debug, Clone)]
pub struct HttpVideoClient {
    client: Client,
    config: VideoServiceConfig,
    generate_url: Url,
    record_info_url: Url,
}

impl HttpVideoClient {
    pub fn new(config: VideoServiceConfig) -> ClientResult<Self> {
        Ok(Self {
            client: build_http_client(config.request_timeout)?,
            generate_url: endpoint(&config.base_url, GENERATE_PATH)?,
            record_info_url: endpoint(&config.base_url, RECORD_INFO_PATH)?,
            config,
        })
    }

    pub fn from_env() -> ClientResult<Self> {
        Self::new(VideoServiceConfig::from_env()?)
    }

    async fn read_envelope<T: for<'de> Deserialize<'de>>(response: reqwest::Response) -> ClientResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClientError::Http {
                status: status.as_u16(),
                body,
            });
        }
        let envelope: Envelope<T> = response.json().await?;
        envelope.into_data()
    }
}

#[async_trait]
impl VideoGenerationService for HttpVideoClient {
    async fn submit(&self, request: &VideoRequest) -> ClientResult<String> {
        let body = GenerateBody {
            prompt: &request.prompt,
            image_urls: request.image_url.as_deref().map(|u| vec![u]),
            model: &self.config.model,
            aspect_ratio: request.aspect_ratio.as_str(),
            seeds: request.seed,
            duration: request.duration_secs,
        };
        debug!(
            seed = request.seed,
            has_reference = request.image_url.is_some(),
            "Submitting video generation"
        );

        let response = self
            .client
            .post(self.generate_url.clone())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let created: TaskCreated = Self::read_envelope(response).await?;
        if created.task_id.trim().is_empty() {
            return Err(ClientError::invalid_response("empty taskId"));
        }
        info!(task_id = %created.task_id, "Video generation submitted");
        Ok(created.task_id)
    }

    async fn poll(&self, task_id: &str) -> ClientResult<RemoteStatus> {
        let response = self
            .client
            .get(self.record_info_url.clone())
            .query(&[("taskId", task_id)])
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        let record: RecordInfo = Self::read_envelope(response).await?;
        record.into_status()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client(server: &MockServer) -> HttpVideoClient {
        HttpVideoClient::new(VideoServiceConfig::new(&server.uri(), "secret").unwrap()).unwrap()
    }

    fn request(image_url: Option<&str>) -> VideoRequest {
        VideoRequest {
            prompt: "The presenter speaks".into(),
            image_url: image_url.map(String::from),
            seed: 30001,
            duration_secs: 8,
            aspect_ratio: AspectRatio::Portrait,
        }
    }

    #[tokio::test]
    async fn test_submit_sends_reference_and_seed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/veo/generate"))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(json!({
                "imageUrls": ["https://r2.example/ref.png?sig"],
                "seeds": 30001,
                "aspectRatio": "9:16",
                "model": "veo3_fast"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200, "msg": "success", "data": {"taskId": "task-123"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let task_id = client(&server)
            .await
            .submit(&request(Some("https://r2.example/ref.png?sig")))
            .await
            .unwrap();
        assert_eq!(task_id, "task-123");
    }

    #[tokio::test]
    async fn test_submit_server_error_is_transient() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let err = client(&server).await.submit(&request(None)).await.unwrap_err();
        assert!(matches!(err, ClientError::Http { status: 502, .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_submit_body_error_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 422, "msg": "prompt rejected", "data": null
            })))
            .mount(&server)
            .await;

        let err = client(&server).await.submit(&request(None)).await.unwrap_err();
        assert!(matches!(err, ClientError::Api { code: 422, .. }));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_poll_statuses() {
        let server = MockServer::start().await;
        let record = |task: &str, body: serde_json::Value| {
            Mock::given(method("GET"))
                .and(path("/api/v1/veo/record-info"))
                .and(query_param("taskId", task))
                .respond_with(ResponseTemplate::new(200).set_body_json(body))
        };
        record("running", json!({"code": 200, "msg": "", "data": {"taskId": "running", "successFlag": 0}}))
            .mount(&server)
            .await;
        record(
            "done",
            json!({"code": 200, "msg": "", "data": {
                "taskId": "done", "successFlag": 1,
                "response": {"resultUrls": ["https://cdn.example/clip.mp4"]}
            }}),
        )
        .mount(&server)
        .await;
        record(
            "rejected",
            json!({"code": 200, "msg": "", "data": {
                "taskId": "rejected", "successFlag": 2, "errorMessage": "content policy"
            }}),
        )
        .mount(&server)
        .await;

        let client = client(&server).await;
        assert_eq!(client.poll("running").await.unwrap(), RemoteStatus::Generating);
        assert_eq!(
            client.poll("done").await.unwrap(),
            RemoteStatus::Succeeded {
                result_url: "https://cdn.example/clip.mp4".into()
            }
        );
        assert_eq!(
            client.poll("rejected").await.unwrap(),
            RemoteStatus::Failed {
                message: "content policy".into()
            }
        );
    }

    #[tokio::test]
    async fn test_success_without_url_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "code": 200, "msg": "", "data": {"taskId": "t", "successFlag": 1, "response": {"resultUrls": []}}
            })))
            .mount(&server)
            .await;

        let err = client(&server).await.poll("t").await.unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)));
    }
}
