//! Backend merge-job API client.

use std::time::Duration;

use reqwest::Client;
use tracing::{debug, warn};
use validator::Validate;

use mvid_models::MergeRequest;

use crate::error::{ClientError, ClientResult};
use crate::http::{build_http, check_status, join_url, map_send_error};
use crate::types::{CombineResponse, JobStatus};

const COMBINE_PATH: &str = "/api/v1/video/combine";
const JOB_PATH: &str = "/api/v1/video/job";
const DOWNLOAD_PATH: &str = "/api/v1/video/download";

/// Configuration for the merge backend client.
#[derive(Debug, Clone)]
pub struct MergeBackendConfig {
    pub base_url: String,
    /// Per-request timeout; the overall job window is enforced by the caller
    pub timeout: Duration,
}

impl Default for MergeBackendConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl MergeBackendConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("MERGE_API_URL")
                .or_else(|_| std::env::var("CONTENT_API_URL"))
                .unwrap_or_else(|_| "http://localhost:8000".to_string()),
            timeout: Duration::from_secs(
                std::env::var("MERGE_API_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
        }
    }
}

/// Client for server-side merge jobs.
pub struct MergeJobClient {
    http: Client,
    config: MergeBackendConfig,
}

impl MergeJobClient {
    pub fn new(config: MergeBackendConfig) -> ClientResult<Self> {
        let http = build_http(config.timeout)?;
        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> ClientResult<Self> {
        Self::new(MergeBackendConfig::from_env())
    }

    /// Submit a merge job and return its ID.
    ///
    /// Requests the backend would reject are refused locally.
    pub async fn submit(&self, request: &MergeRequest) -> ClientResult<String> {
        request
            .validate()
            .map_err(|e| ClientError::invalid_request(e.to_string()))?;

        let url = join_url(&self.config.base_url, COMBINE_PATH);
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.config.timeout))?;
        let created: CombineResponse = check_status(response).await?.json().await?;

        debug!(job_id = %created.job_id, segments = request.segments.len(), "Submitted merge job");
        Ok(created.job_id)
    }

    /// Current status of a job.
    pub async fn status(&self, job_id: &str) -> ClientResult<JobStatus> {
        let url = join_url(&self.config.base_url, &format!("{}/{}", JOB_PATH, job_id));
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.config.timeout))?;
        Ok(check_status(response).await?.json().await?)
    }

    /// Download the merged output of a completed job.
    pub async fn fetch(&self, job_id: &str) -> ClientResult<Vec<u8>> {
        let url = join_url(&self.config.base_url, &format!("{}/{}", DOWNLOAD_PATH, job_id));
        let response = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.config.timeout))?;
        let bytes = check_status(response).await?.bytes().await?;
        if bytes.is_empty() {
            return Err(ClientError::invalid_response("merge job returned an empty file"));
        }
        Ok(bytes.to_vec())
    }

    /// Remove a job and its files from the backend. Best effort.
    pub async fn delete(&self, job_id: &str) {
        let url = join_url(&self.config.base_url, &format!("{}/{}", JOB_PATH, job_id));
        match self.http.delete(&url).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(job_id, "Deleted merge job");
            }
            Ok(response) => warn!(job_id, status = %response.status(), "Merge job cleanup rejected"),
            Err(e) => warn!(job_id, "Merge job cleanup failed: {}", e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobState;
    use mvid_models::{OutputFormat, Quality, Segment};
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> MergeJobClient {
        MergeJobClient::new(MergeBackendConfig {
            base_url: server.uri(),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    fn request(urls: &[&str]) -> MergeRequest {
        let segments: Vec<Segment> = urls
            .iter()
            .enumerate()
            .map(|(i, url)| Segment::pending(i as u32 + 1, "p", 10.0).completed(*url))
            .collect();
        MergeRequest::from_segments(&segments, OutputFormat::Mp4, Quality::High, Some("metformin".into()))
    }

    #[tokio::test]
    async fn test_job_lifecycle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(COMBINE_PATH))
            .and(body_partial_json(json!({"output_format": "mp4", "quality": "high", "drug_name": "metformin"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "job_id": "job-9", "status": "pending", "created_at": "2025-01-01T00:00:00"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/video/job/job-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "job_id": "job-9",
                "status": "processing",
                "progress": {"stage": "combining", "progress": 55.0, "message": "Combining"}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/video/download/job-9"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0u8, 1, 2, 3]))
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/api/v1/video/job/job-9"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = client(&server);
        let job_id = client
            .submit(&request(&["https://cdn.example.com/1.mp4", "https://cdn.example.com/2.mp4"]))
            .await
            .unwrap();
        assert_eq!(job_id, "job-9");

        let status = client.status(&job_id).await.unwrap();
        assert_eq!(status.status, JobState::Processing);
        assert_eq!(status.progress.unwrap().progress as u32, 55);

        assert_eq!(client.fetch(&job_id).await.unwrap(), vec![0, 1, 2, 3]);
        client.delete(&job_id).await;
    }

    #[tokio::test]
    async fn test_invalid_request_never_reaches_backend() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let err = client(&server)
            .submit(&request(&["blob:https://app.example.com/1"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidRequest(_)));
    }
}
