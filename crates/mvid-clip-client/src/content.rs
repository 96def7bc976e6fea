//! Content (analysis and script) service client.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::http::{build_http, check_status, join_url, map_send_error, with_retry};
use crate::types::{MechanismRequest, MechanismResponse, PromptsRequest, PromptsResponse};

const MECHANISM_PATH: &str = "/api/v1/video/mechanism";
const PROMPTS_PATH: &str = "/api/v1/video/prompts";

/// Configuration for the content service client.
#[derive(Debug, Clone)]
pub struct ContentServiceConfig {
    pub base_url: String,
    pub timeout: Duration,
    pub max_retries: u32,
}

impl Default for ContentServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout: Duration::from_secs(120),
            max_retries: 2,
        }
    }
}

impl ContentServiceConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("CONTENT_API_URL")
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            timeout: Duration::from_secs(
                std::env::var("CONTENT_API_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
            max_retries: std::env::var("CONTENT_API_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        }
    }
}

/// Client producing the mechanism summary and the segment prompts.
pub struct ContentServiceClient {
    http: Client,
    config: ContentServiceConfig,
}

impl ContentServiceClient {
    pub fn new(config: ContentServiceConfig) -> ClientResult<Self> {
        let http = build_http(config.timeout)?;
        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> ClientResult<Self> {
        Self::new(ContentServiceConfig::from_env())
    }

    /// Describe how the drug works.
    pub async fn mechanism(&self, drug_name: &str) -> ClientResult<String> {
        let url = join_url(&self.config.base_url, MECHANISM_PATH);
        debug!(drug_name, "Requesting mechanism summary");

        let response: MechanismResponse = with_retry(self.config.max_retries, || async {
            let response = self
                .http
                .post(&url)
                .json(&MechanismRequest { drug_name })
                .send()
                .await
                .map_err(|e| map_send_error(e, self.config.timeout))?;
            Ok(check_status(response).await?.json().await?)
        })
        .await?;

        let summary = response.mechanism_summary.trim().to_string();
        if summary.is_empty() {
            return Err(ClientError::invalid_response("empty mechanism summary"));
        }
        Ok(summary)
    }

    /// Build the segment prompts for a mechanism summary.
    pub async fn prompts(&self, drug_name: &str, mechanism_summary: &str) -> ClientResult<Vec<String>> {
        let url = join_url(&self.config.base_url, PROMPTS_PATH);
        debug!(drug_name, "Requesting segment prompts");

        let response: PromptsResponse = with_retry(self.config.max_retries, || async {
            let response = self
                .http
                .post(&url)
                .json(&PromptsRequest {
                    drug_name,
                    mechanism_summary,
                })
                .send()
                .await
                .map_err(|e| map_send_error(e, self.config.timeout))?;
            Ok(check_status(response).await?.json().await?)
        })
        .await?;

        Ok(response.prompts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> ContentServiceClient {
        ContentServiceClient::new(ContentServiceConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
            max_retries: 1,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_mechanism_and_prompts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MECHANISM_PATH))
            .and(body_json(json!({"drug_name": "metformin"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"mechanism_summary": "Lowers hepatic glucose output."})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(PROMPTS_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"prompts": ["intro", "mechanism", "effects", "safety"]})))
            .mount(&server)
            .await;

        let client = client(&server);
        let summary = client.mechanism("metformin").await.unwrap();
        assert_eq!(summary, "Lowers hepatic glucose output.");
        let prompts = client.prompts("metformin", &summary).await.unwrap();
        assert_eq!(prompts.len(), 4);
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(MECHANISM_PATH))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(MECHANISM_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"mechanism_summary": "ok"})))
            .mount(&server)
            .await;

        assert_eq!(client(&server).mechanism("aspirin").await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_empty_summary_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"mechanism_summary": ""})))
            .mount(&server)
            .await;

        assert!(client(&server).mechanism("aspirin").await.is_err());
    }
}
