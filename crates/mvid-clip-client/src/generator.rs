//! Remote clip generator client.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use mvid_models::{AspectRatio, Resolution};

use crate::error::{ClientError, ClientResult};
use crate::http::{build_http, check_status, join_url, map_send_error};
use crate::types::{GenerationResponse, ImageToVideoRequest, TextToVideoRequest};

const TEXT_TO_VIDEO_PATH: &str = "/v1/generations/text-to-video";
const IMAGE_TO_VIDEO_PATH: &str = "/v1/generations/image-to-video";

/// Configuration for the clip generator client.
#[derive(Debug, Clone)]
pub struct ClipGeneratorConfig {
    /// Base URL of the generation API
    pub base_url: String,
    /// Bearer token, when the API requires one
    pub api_key: Option<String>,
    /// Request timeout; generation calls block until the clip is hosted
    pub timeout: Duration,
}

impl Default for ClipGeneratorConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8010".to_string(),
            api_key: None,
            timeout: Duration::from_secs(600),
        }
    }
}

impl ClipGeneratorConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("CLIP_API_URL")
                .unwrap_or_else(|_| "http://localhost:8010".to_string()),
            api_key: std::env::var("CLIP_API_KEY").ok().filter(|k| !k.is_empty()),
            timeout: Duration::from_secs(
                std::env::var("CLIP_API_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(600),
            ),
        }
    }
}

/// Client for the hosted text/image-to-video API.
///
/// Calls are never retried here; a failed call becomes a failed segment upstream.
pub struct ClipGeneratorClient {
    http: Client,
    config: ClipGeneratorConfig,
}

impl ClipGeneratorClient {
    pub fn new(config: ClipGeneratorConfig) -> ClientResult<Self> {
        let http = build_http(config.timeout)?;
        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> ClientResult<Self> {
        Self::new(ClipGeneratorConfig::from_env())
    }

    /// Generate a clip from a prompt alone.
    pub async fn text_to_video(
        &self,
        prompt: &str,
        duration_tag: &str,
        aspect_ratio: AspectRatio,
        resolution: Resolution,
    ) -> ClientResult<String> {
        let request = TextToVideoRequest::new(prompt, duration_tag, aspect_ratio, resolution);
        self.generate(TEXT_TO_VIDEO_PATH, &request).await
    }

    /// Generate a clip continuing from a seed image.
    pub async fn image_to_video(
        &self,
        seed_image: &[u8],
        seed_mime_type: &str,
        prompt: &str,
        duration_tag: &str,
        aspect_ratio: AspectRatio,
        resolution: Resolution,
    ) -> ClientResult<String> {
        if seed_image.is_empty() {
            return Err(ClientError::invalid_request("seed image is empty"));
        }
        let request = ImageToVideoRequest {
            base: TextToVideoRequest::new(prompt, duration_tag, aspect_ratio, resolution),
            image: data_uri(seed_image, seed_mime_type),
        };
        self.generate(IMAGE_TO_VIDEO_PATH, &request).await
    }

    async fn generate<B: Serialize>(&self, path: &str, body: &B) -> ClientResult<String> {
        let url = join_url(&self.config.base_url, path);
        debug!("Requesting clip generation from {}", url);

        let mut request = self.http.post(&url).json(body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| map_send_error(e, self.config.timeout))?;
        let response = check_status(response).await?;
        let generated: GenerationResponse = response.json().await?;

        generated
            .url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| ClientError::invalid_response("generation response carried no clip URL"))
    }
}

fn data_uri(bytes: &[u8], mime_type: &str) -> String {
    format!("data:{};base64,{}", mime_type, BASE64.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer, api_key: Option<&str>) -> ClipGeneratorClient {
        ClipGeneratorClient::new(ClipGeneratorConfig {
            base_url: server.uri(),
            api_key: api_key.map(String::from),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_text_to_video() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TEXT_TO_VIDEO_PATH))
            .and(header("authorization", "Bearer secret"))
            .and(body_partial_json(json!({"prompt": "intro", "duration": "5s", "aspect_ratio": "16:9"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"url": "https://cdn.example.com/1.mp4"})))
            .expect(1)
            .mount(&server)
            .await;

        let url = client(&server, Some("secret"))
            .text_to_video("intro", "5s", AspectRatio::LANDSCAPE, Resolution::P720)
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example.com/1.mp4");
    }

    #[tokio::test]
    async fn test_image_to_video_sends_data_uri() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(IMAGE_TO_VIDEO_PATH))
            .and(body_partial_json(json!({"image": "data:image/jpeg;base64,AQID"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"video_url": "https://cdn.example.com/2.mp4"})))
            .mount(&server)
            .await;

        let url = client(&server, None)
            .image_to_video(&[1, 2, 3], "image/jpeg", "mechanism", "5s", AspectRatio::LANDSCAPE, Resolution::P720)
            .await
            .unwrap();
        assert_eq!(url, "https://cdn.example.com/2.mp4");
    }

    #[tokio::test]
    async fn test_server_error_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TEXT_TO_VIDEO_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client(&server, None)
            .text_to_video("intro", "5s", AspectRatio::LANDSCAPE, Resolution::P720)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::RequestFailed { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_empty_url_is_invalid() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"url": "  "})))
            .mount(&server)
            .await;

        let err = client(&server, None)
            .text_to_video("intro", "5s", AspectRatio::LANDSCAPE, Resolution::P720)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidResponse(_)));
    }
}
