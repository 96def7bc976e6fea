//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

use mvid_models::DEFAULT_HYBRID_CONCURRENCY;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Batch size for the hybrid strategy
    pub hybrid_concurrency: usize,
    /// Interval between backend merge-job status polls
    pub backend_poll_interval: Duration,
    /// Overall window for a backend merge job (submit to download)
    pub backend_timeout: Duration,
    /// Whether to upload the merged asset
    pub upload_enabled: bool,
    /// Retries for the upload step (not including the first attempt)
    pub upload_retries: u32,
    /// Capacity of the event broadcast channel
    pub event_capacity: usize,
    /// Per-clip download timeout
    pub segment_download_timeout: Duration,
    /// Scratch directory for local transcoding (system temp when unset)
    pub work_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            hybrid_concurrency: DEFAULT_HYBRID_CONCURRENCY,
            backend_poll_interval: Duration::from_millis(2000),
            backend_timeout: Duration::from_secs(45),
            upload_enabled: true,
            upload_retries: 2,
            event_capacity: 256,
            segment_download_timeout: Duration::from_secs(30),
            work_dir: None,
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            hybrid_concurrency: std::env::var("MVID_HYBRID_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(DEFAULT_HYBRID_CONCURRENCY),
            backend_poll_interval: Duration::from_millis(
                std::env::var("MVID_BACKEND_POLL_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(2000),
            ),
            backend_timeout: Duration::from_secs(
                std::env::var("MVID_BACKEND_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(45),
            ),
            upload_enabled: std::env::var("MVID_UPLOAD_ENABLED")
                .map(|v| !matches!(v.to_lowercase().as_str(), "0" | "false" | "no" | "off"))
                .unwrap_or(true),
            upload_retries: std::env::var("MVID_UPLOAD_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
            event_capacity: std::env::var("MVID_EVENT_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(256),
            segment_download_timeout: Duration::from_secs(
                std::env::var("MVID_SEGMENT_DOWNLOAD_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            work_dir: std::env::var("MVID_WORK_DIR")
                .ok()
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.hybrid_concurrency, 2);
        assert_eq!(config.backend_timeout, Duration::from_secs(45));
        assert!(config.upload_enabled);
        assert!(config.work_dir.is_none());
    }
}
