//! Shared reqwest plumbing.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use tracing::warn;

use crate::error::{ClientError, ClientResult};

/// Longest error body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

pub(crate) fn build_http(timeout: Duration) -> ClientResult<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("mvid/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(ClientError::Network)
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Map non-success statuses to errors, passing successful responses through.
pub(crate) async fn check_status(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().await.unwrap_or_default();
    body.truncate(MAX_ERROR_BODY);

    if status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::BAD_GATEWAY {
        return Err(ClientError::ServiceUnavailable(format!("{}: {}", status, body)));
    }

    Err(ClientError::RequestFailed {
        status: status.as_u16(),
        body,
    })
}

pub(crate) fn map_send_error(e: reqwest::Error, timeout: Duration) -> ClientError {
    if e.is_timeout() {
        ClientError::Timeout(timeout.as_secs())
    } else {
        ClientError::Network(e)
    }
}

const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

/// Doubling delay from 500ms, capped at 30s.
fn backoff_delay(attempt: u32) -> Duration {
    RETRY_BASE_DELAY
        .saturating_mul(2u32.saturating_pow(attempt))
        .min(RETRY_MAX_DELAY)
}

/// Execute with retry logic.
pub(crate) async fn with_retry<F, Fut, T>(max_retries: u32, operation: F) -> ClientResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = ClientResult<T>>,
{
    let mut attempt = 0;
    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && attempt < max_retries => {
                let delay = backoff_delay(attempt);
                warn!(
                    "Request failed (attempt {}), retrying in {:?}: {}",
                    attempt + 1,
                    delay,
                    e
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_join_url() {
        assert_eq!(join_url("http://x/", "/a/b"), "http://x/a/b");
        assert_eq!(join_url("http://x", "a"), "http://x/a");
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(backoff_delay(0), Duration::from_millis(500));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(10), RETRY_MAX_DELAY);
        assert_eq!(backoff_delay(64), RETRY_MAX_DELAY);
        assert_eq!(backoff_delay(u32::MAX), RETRY_MAX_DELAY);
    }

    #[tokio::test]
    async fn test_retry_stops_on_permanent_error() {
        let calls = AtomicU32::new(0);
        let result: ClientResult<()> = with_retry(3, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(ClientError::RequestFailed {
                status: 400,
                body: "bad".into(),
            })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_recovers() {
        let calls = AtomicU32::new(0);
        let result = with_retry(2, || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ClientError::ServiceUnavailable("warming up".into()))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
