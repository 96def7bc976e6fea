//! Pipeline error types.

use thiserror::Error;

use mvid_models::SEGMENT_COUNT;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Expected {expected} prompts, got {0}", expected = SEGMENT_COUNT)]
    InvalidPromptCount(usize),

    #[error("Unknown segment number {0}")]
    UnknownSegment(u32),

    #[error("Analysis failed: {0}")]
    AnalysisFailed(String),

    #[error("Prompt generation failed: {0}")]
    PromptsFailed(String),

    #[error("No segment has a playable clip")]
    NoValidSegments,

    #[error("Every merge strategy failed: {0}")]
    MergeFailed(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Client error: {0}")]
    Client(#[from] mvid_clip_client::ClientError),

    #[error("Media error: {0}")]
    Media(#[from] mvid_media::MediaError),

    #[error("Storage error: {0}")]
    Storage(#[from] mvid_storage::StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub fn analysis_failed(msg: impl Into<String>) -> Self {
        Self::AnalysisFailed(msg.into())
    }

    pub fn prompts_failed(msg: impl Into<String>) -> Self {
        Self::PromptsFailed(msg.into())
    }

    pub fn merge_failed(msg: impl Into<String>) -> Self {
        Self::MergeFailed(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            PipelineError::Client(e) => e.is_retryable(),
            PipelineError::Storage(e) => e.is_retryable(),
            PipelineError::UploadFailed(_) | PipelineError::Io(_) => true,
            _ => false,
        }
    }

    /// Precondition violations are reported immediately and never retried.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            PipelineError::InvalidPromptCount(_)
                | PipelineError::UnknownSegment(_)
                | PipelineError::ConfigError(_)
        )
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            PipelineError::Cancelled | PipelineError::Media(mvid_media::MediaError::Cancelled)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(PipelineError::InvalidPromptCount(3).is_precondition());
        assert!(!PipelineError::InvalidPromptCount(3).is_retryable());
        assert!(PipelineError::UploadFailed("503".into()).is_retryable());
        assert!(PipelineError::Cancelled.is_cancelled());
        assert_eq!(
            PipelineError::InvalidPromptCount(3).to_string(),
            "Expected 4 prompts, got 3"
        );
    }
}
