//! Hosted clip download.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::error::{ClientError, ClientResult};
use crate::http::{build_http, check_status, map_send_error};

/// Fetches hosted clips as bytes.
pub struct SegmentDownloader {
    http: Client,
    timeout: Duration,
}

impl SegmentDownloader {
    /// Default per-clip download timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    pub fn new(timeout: Duration) -> ClientResult<Self> {
        Ok(Self {
            http: build_http(timeout)?,
            timeout,
        })
    }

    pub async fn fetch(&self, url: &str) -> ClientResult<Vec<u8>> {
        let parsed = url::Url::parse(url).map_err(|e| ClientError::invalid_request(e.to_string()))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(ClientError::invalid_request(format!(
                "unsupported clip URL scheme: {}",
                parsed.scheme()
            )));
        }

        let response = self
            .http
            .get(parsed)
            .send()
            .await
            .map_err(|e| map_send_error(e, self.timeout))?;
        let bytes = check_status(response).await?.bytes().await?;
        if bytes.is_empty() {
            return Err(ClientError::invalid_response(format!("empty clip at {}", url)));
        }

        debug!(url, size_bytes = bytes.len(), "Downloaded clip");
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_fetch() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/clips/1.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"clip-bytes".to_vec()))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/clips/missing.mp4"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let downloader = SegmentDownloader::new(Duration::from_secs(5)).unwrap();
        let bytes = downloader
            .fetch(&format!("{}/clips/1.mp4", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, b"clip-bytes");

        let err = downloader
            .fetch(&format!("{}/clips/missing.mp4", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::RequestFailed { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_rejects_non_http() {
        let downloader = SegmentDownloader::new(Duration::from_secs(5)).unwrap();
        assert!(downloader.fetch("file:///etc/passwd").await.is_err());
        assert!(downloader.fetch("not a url").await.is_err());
    }
}
