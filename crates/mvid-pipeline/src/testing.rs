//! In-memory collaborators shared by the unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{watch, Barrier};

use mvid_clip_client::{ClientError, ClientResult};
use mvid_media::{ConcatOutput, FrameImage, MediaError, MediaResult};
use mvid_models::{EncodingConfig, OutputFormat};

use crate::collaborators::{
    ClipGenerator, ClipSpec, ContentService, FrameExtractor, MediaToolchain, SegmentFetcher,
};

pub const CDN: &str = "https://cdn.example.com";

pub fn clip_url(prompt: &str) -> String {
    format!("{}/{}.mp4", CDN, prompt)
}

pub fn prompts() -> Vec<String> {
    ["intro", "mechanism", "effects", "safety"]
        .iter()
        .map(|p| p.to_string())
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationCall {
    pub prompt: String,
    pub duration_tag: String,
    /// Clip URL the seed frame was taken from
    pub seed: Option<String>,
}

/// Generator answering `{CDN}/{prompt}.mp4`, failing for selected prompts.
#[derive(Default)]
pub struct FakeGenerator {
    failing: HashSet<String>,
    barrier: Option<Arc<Barrier>>,
    delay: Option<Duration>,
    prompt_delays: HashMap<String, Duration>,
    calls: Mutex<Vec<GenerationCall>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, prompt: &str) -> Self {
        self.failing.insert(prompt.to_string());
        self
    }

    /// Every call waits until `parties` calls are in flight.
    pub fn with_barrier(mut self, parties: usize) -> Self {
        self.barrier = Some(Arc::new(Barrier::new(parties)));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Extra latency for one prompt, used to make clips finish out of order.
    pub fn with_prompt_delay(mut self, prompt: &str, delay: Duration) -> Self {
        self.prompt_delays.insert(prompt.to_string(), delay);
        self
    }

    pub fn calls(&self) -> Vec<GenerationCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    async fn respond(&self, spec: ClipSpec<'_>, seed: Option<&FrameImage>) -> ClientResult<String> {
        self.calls.lock().unwrap().push(GenerationCall {
            prompt: spec.prompt.to_string(),
            duration_tag: spec.duration_tag.to_string(),
            seed: seed.map(|s| String::from_utf8_lossy(&s.bytes).into_owned()),
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(delay) = self.prompt_delays.get(spec.prompt) {
            tokio::time::sleep(*delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.failing.contains(spec.prompt) {
            return Err(ClientError::ServiceUnavailable("generator overloaded".into()));
        }
        Ok(clip_url(spec.prompt))
    }
}

#[async_trait]
impl ClipGenerator for FakeGenerator {
    async fn text_to_video(&self, spec: ClipSpec<'_>) -> ClientResult<String> {
        self.respond(spec, None).await
    }

    async fn image_to_video(&self, seed: &FrameImage, spec: ClipSpec<'_>) -> ClientResult<String> {
        self.respond(spec, Some(seed)).await
    }
}

/// Frame extractor whose frame bytes are the source URL.
#[derive(Default)]
pub struct FakeFrames {
    failing: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl FakeFrames {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, media_url: &str) -> Self {
        self.failing.insert(media_url.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FrameExtractor for FakeFrames {
    async fn last_frame(&self, media_url: &str) -> MediaResult<FrameImage> {
        self.calls.lock().unwrap().push(media_url.to_string());
        if self.failing.contains(media_url) {
            return Err(MediaError::invalid_image("truncated stream"));
        }
        Ok(FrameImage {
            bytes: media_url.as_bytes().to_vec(),
            width: 1280,
            height: 720,
            mime_type: "image/jpeg",
        })
    }
}

pub struct FakeContent {
    pub summary: Option<String>,
    pub prompts: Option<Vec<String>>,
}

impl Default for FakeContent {
    fn default() -> Self {
        Self {
            summary: Some("Inhibits hepatic gluconeogenesis".to_string()),
            prompts: Some(prompts()),
        }
    }
}

#[async_trait]
impl ContentService for FakeContent {
    async fn mechanism(&self, _subject_name: &str) -> ClientResult<String> {
        self.summary
            .clone()
            .ok_or_else(|| ClientError::ServiceUnavailable("content service down".into()))
    }

    async fn prompts(&self, _subject_name: &str, _mechanism_summary: &str) -> ClientResult<Vec<String>> {
        self.prompts
            .clone()
            .ok_or_else(|| ClientError::ServiceUnavailable("content service down".into()))
    }
}

/// Fetcher answering `clip:{url}`.
#[derive(Default)]
pub struct FakeFetcher {
    failing: HashSet<String>,
    calls: AtomicUsize,
}

impl FakeFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, media_url: &str) -> Self {
        self.failing.insert(media_url.to_string());
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

pub fn fetched_bytes(media_url: &str) -> Vec<u8> {
    format!("clip:{}", media_url).into_bytes()
}

#[async_trait]
impl SegmentFetcher for FakeFetcher {
    async fn fetch(&self, media_url: &str) -> ClientResult<Vec<u8>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(media_url) {
            return Err(ClientError::RequestFailed {
                status: 404,
                body: "gone".into(),
            });
        }
        Ok(fetched_bytes(media_url))
    }
}

/// Toolchain that joins inputs byte-wise.
#[derive(Default)]
pub struct FakeToolchain {
    pub unavailable: bool,
    pub concat_calls: AtomicUsize,
    pub transcode_calls: AtomicUsize,
}

impl FakeToolchain {
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }
}

#[async_trait]
impl MediaToolchain for FakeToolchain {
    async fn concat(
        &self,
        inputs: Vec<Vec<u8>>,
        _encoding: EncodingConfig,
        _format: OutputFormat,
        expected_duration_secs: f64,
        _cancel: Option<watch::Receiver<bool>>,
        on_progress: Box<dyn Fn(u8) + Send + Sync>,
    ) -> MediaResult<ConcatOutput> {
        self.concat_calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(MediaError::FfmpegNotFound);
        }
        on_progress(50);
        on_progress(100);
        Ok(ConcatOutput {
            bytes: inputs.concat(),
            duration_seconds: Some(expected_duration_secs),
        })
    }

    async fn transcode(
        &self,
        input: Vec<u8>,
        _encoding: EncodingConfig,
        format: OutputFormat,
        _cancel: Option<watch::Receiver<bool>>,
    ) -> MediaResult<Vec<u8>> {
        self.transcode_calls.fetch_add(1, Ordering::SeqCst);
        if self.unavailable {
            return Err(MediaError::FfmpegNotFound);
        }
        Ok([format!("{}:", format.extension()).into_bytes(), input].concat())
    }
}
