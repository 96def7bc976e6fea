//! Capabilities the pipeline depends on.
//!
//! Each trait is implemented over the real clients in [`crate::adapters`];
//! tests substitute fakes or mocks.

use async_trait::async_trait;
use tokio::sync::watch;

use mvid_clip_client::{ClientResult, JobStatus};
use mvid_media::{ConcatOutput, FrameImage, MediaResult};
use mvid_models::{
    AspectRatio, EncodingConfig, MergeRequest, OutputFormat, Resolution, UploadMetadata,
    UploadedAsset,
};
use mvid_storage::StorageResult;

/// Per-call generation parameters shared by both generation modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipSpec<'a> {
    pub prompt: &'a str,
    /// e.g. "5s"
    pub duration_tag: &'a str,
    pub aspect_ratio: AspectRatio,
    pub resolution: Resolution,
}

/// Remote clip generation.
#[async_trait]
pub trait ClipGenerator: Send + Sync {
    async fn text_to_video(&self, spec: ClipSpec<'_>) -> ClientResult<String>;

    async fn image_to_video(&self, seed: &FrameImage, spec: ClipSpec<'_>) -> ClientResult<String>;
}

/// Last-frame extraction from a hosted clip.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    async fn last_frame(&self, media_url: &str) -> MediaResult<FrameImage>;
}

/// Mechanism summary and segment prompts.
#[async_trait]
pub trait ContentService: Send + Sync {
    async fn mechanism(&self, subject_name: &str) -> ClientResult<String>;

    async fn prompts(&self, subject_name: &str, mechanism_summary: &str) -> ClientResult<Vec<String>>;
}

/// Server-side merge jobs.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MergeJobApi: Send + Sync {
    async fn submit(&self, request: &MergeRequest) -> ClientResult<String>;

    async fn status(&self, job_id: &str) -> ClientResult<JobStatus>;

    async fn fetch(&self, job_id: &str) -> ClientResult<Vec<u8>>;

    /// Best-effort cleanup.
    async fn delete(&self, job_id: &str);
}

/// Downloads hosted clips.
#[async_trait]
pub trait SegmentFetcher: Send + Sync {
    async fn fetch(&self, media_url: &str) -> ClientResult<Vec<u8>>;
}

/// In-process transcoding.
#[async_trait]
pub trait MediaToolchain: Send + Sync {
    /// Concatenate clips in order with a re-encode; `on_progress` gets 0-100.
    async fn concat(
        &self,
        inputs: Vec<Vec<u8>>,
        encoding: EncodingConfig,
        format: OutputFormat,
        expected_duration_secs: f64,
        cancel: Option<watch::Receiver<bool>>,
        on_progress: Box<dyn Fn(u8) + Send + Sync>,
    ) -> MediaResult<ConcatOutput>;

    /// Re-encode one asset into another container/quality.
    async fn transcode(
        &self,
        input: Vec<u8>,
        encoding: EncodingConfig,
        format: OutputFormat,
        cancel: Option<watch::Receiver<bool>>,
    ) -> MediaResult<Vec<u8>>;
}

/// Object storage for the merged asset.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        metadata: &UploadMetadata,
        format: OutputFormat,
    ) -> StorageResult<UploadedAsset>;
}
