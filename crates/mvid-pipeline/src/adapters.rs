//! Collaborator implementations over the HTTP clients, FFmpeg and R2.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use mvid_clip_client::{
    ClientResult, ClipGeneratorClient, ContentServiceClient, JobStatus, MergeJobClient,
    SegmentDownloader,
};
use mvid_media::{ConcatOutput, FrameImage, MediaResult, Transcoder};
use mvid_models::{EncodingConfig, MergeRequest, OutputFormat, UploadMetadata, UploadedAsset};
use mvid_storage::{R2Client, StorageResult};

use crate::collaborators::{
    ClipGenerator, ClipSpec, ContentService, FrameExtractor, MediaToolchain, MergeJobApi,
    SegmentFetcher, Uploader,
};

#[async_trait]
impl ClipGenerator for ClipGeneratorClient {
    async fn text_to_video(&self, spec: ClipSpec<'_>) -> ClientResult<String> {
        ClipGeneratorClient::text_to_video(
            self,
            spec.prompt,
            spec.duration_tag,
            spec.aspect_ratio,
            spec.resolution,
        )
        .await
    }

    async fn image_to_video(&self, seed: &FrameImage, spec: ClipSpec<'_>) -> ClientResult<String> {
        ClipGeneratorClient::image_to_video(
            self,
            &seed.bytes,
            seed.mime_type,
            spec.prompt,
            spec.duration_tag,
            spec.aspect_ratio,
            spec.resolution,
        )
        .await
    }
}

#[async_trait]
impl ContentService for ContentServiceClient {
    async fn mechanism(&self, subject_name: &str) -> ClientResult<String> {
        ContentServiceClient::mechanism(self, subject_name).await
    }

    async fn prompts(&self, subject_name: &str, mechanism_summary: &str) -> ClientResult<Vec<String>> {
        ContentServiceClient::prompts(self, subject_name, mechanism_summary).await
    }
}

#[async_trait]
impl MergeJobApi for MergeJobClient {
    async fn submit(&self, request: &MergeRequest) -> ClientResult<String> {
        MergeJobClient::submit(self, request).await
    }

    async fn status(&self, job_id: &str) -> ClientResult<JobStatus> {
        MergeJobClient::status(self, job_id).await
    }

    async fn fetch(&self, job_id: &str) -> ClientResult<Vec<u8>> {
        MergeJobClient::fetch(self, job_id).await
    }

    async fn delete(&self, job_id: &str) {
        MergeJobClient::delete(self, job_id).await
    }
}

#[async_trait]
impl SegmentFetcher for SegmentDownloader {
    async fn fetch(&self, media_url: &str) -> ClientResult<Vec<u8>> {
        SegmentDownloader::fetch(self, media_url).await
    }
}

/// Frame extraction through the shared transcoder.
///
/// FFmpeg reads the hosted clip directly, so nothing is downloaded up front.
pub struct TranscoderFrameExtractor {
    transcoder: Arc<Transcoder>,
}

impl TranscoderFrameExtractor {
    pub fn new(transcoder: Arc<Transcoder>) -> Self {
        Self { transcoder }
    }
}

#[async_trait]
impl FrameExtractor for TranscoderFrameExtractor {
    async fn last_frame(&self, media_url: &str) -> MediaResult<FrameImage> {
        self.transcoder.last_frame(media_url).await
    }
}

#[async_trait]
impl MediaToolchain for Transcoder {
    async fn concat(
        &self,
        inputs: Vec<Vec<u8>>,
        encoding: EncodingConfig,
        format: OutputFormat,
        expected_duration_secs: f64,
        cancel: Option<watch::Receiver<bool>>,
        on_progress: Box<dyn Fn(u8) + Send + Sync>,
    ) -> MediaResult<ConcatOutput> {
        Transcoder::concat(
            self,
            &inputs,
            &encoding,
            format.extension(),
            expected_duration_secs,
            cancel,
            on_progress,
        )
        .await
    }

    async fn transcode(
        &self,
        input: Vec<u8>,
        encoding: EncodingConfig,
        format: OutputFormat,
        cancel: Option<watch::Receiver<bool>>,
    ) -> MediaResult<Vec<u8>> {
        Transcoder::transcode(self, &input, &encoding, format.extension(), cancel).await
    }
}

#[async_trait]
impl Uploader for R2Client {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        metadata: &UploadMetadata,
        format: OutputFormat,
    ) -> StorageResult<UploadedAsset> {
        self.store_video(bytes, metadata, format).await
    }
}
