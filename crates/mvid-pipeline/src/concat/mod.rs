//! Concatenation pipeline.
//!
//! Merges a run's clips into one asset by trying an ordered list of
//! [`MergeStrategy`] tiers until one succeeds: a server-side merge job, a
//! local FFmpeg merge, then a single-clip passthrough.

mod backend;
mod local;
mod passthrough;

pub use backend::BackendMerge;
pub use local::LocalMerge;
pub use passthrough::Passthrough;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{info, warn};

use mvid_models::segment::playable;
use mvid_models::{MergeResult, MergeTier, OutputFormat, PipelineEvent, Quality, Segment};

use crate::cancel::{ensure_active, CancelSignal};
use crate::collaborators::{MediaToolchain, MergeJobApi, SegmentFetcher};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::events::ProgressScope;
use crate::metrics;

/// Requested output of a merge or conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MergeSettings {
    pub format: OutputFormat,
    pub quality: Quality,
}

impl MergeSettings {
    pub fn new(format: OutputFormat, quality: Quality) -> Self {
        Self { format, quality }
    }
}

/// Everything a tier needs for one attempt.
pub struct MergeJob<'a> {
    /// All input segments, failed ones included
    pub segments: &'a [Segment],
    /// Segments with a clip, ordered by number
    pub playable: Vec<&'a Segment>,
    pub settings: MergeSettings,
    pub subject_name: Option<&'a str>,
    /// Already merged asset when converting
    pub source: Option<&'a MergeResult>,
    pub scope: &'a ProgressScope,
    pub cancel: Option<&'a CancelSignal>,
}

impl MergeJob<'_> {
    /// Summed duration of the clips that will be merged.
    pub fn playable_duration(&self) -> f64 {
        self.playable.iter().map(|s| s.duration_seconds).sum()
    }
}

/// Bytes produced by a tier.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutput {
    pub bytes: Vec<u8>,
    pub duration_seconds: f64,
    /// Container of `bytes`, which may differ from the request for fallbacks
    pub format: OutputFormat,
}

/// One way of producing the merged asset.
#[async_trait]
pub trait MergeStrategy: Send + Sync {
    fn tier(&self) -> MergeTier;

    /// Upper bound for one attempt; `None` leaves it to cancellation.
    fn timeout(&self) -> Option<Duration>;

    async fn merge(&self, job: &MergeJob<'_>) -> PipelineResult<MergeOutput>;
}

/// Ordered merge tiers.
pub struct ConcatPipeline {
    strategies: Vec<Box<dyn MergeStrategy>>,
}

impl ConcatPipeline {
    pub fn new(strategies: Vec<Box<dyn MergeStrategy>>) -> Self {
        Self { strategies }
    }

    /// Backend job, then local transcode, then passthrough.
    pub fn standard(
        merge_api: Arc<dyn MergeJobApi>,
        fetcher: Arc<dyn SegmentFetcher>,
        toolchain: Arc<dyn MediaToolchain>,
        config: &PipelineConfig,
    ) -> Self {
        Self::new(vec![
            Box::new(BackendMerge::new(
                merge_api,
                config.backend_poll_interval,
                config.backend_timeout,
            )),
            Box::new(LocalMerge::new(Arc::clone(&fetcher), toolchain)),
            Box::new(Passthrough::new(fetcher)),
        ])
    }

    pub fn tiers(&self) -> Vec<MergeTier> {
        self.strategies.iter().map(|s| s.tier()).collect()
    }

    /// Merge the playable segments into one asset.
    ///
    /// Errors only when no segment has a clip or every tier failed.
    pub async fn merge(
        &self,
        segments: &[Segment],
        settings: MergeSettings,
        subject_name: Option<&str>,
        scope: &ProgressScope,
        cancel: Option<&CancelSignal>,
    ) -> PipelineResult<MergeResult> {
        let job = MergeJob {
            segments,
            playable: playable(segments),
            settings,
            subject_name,
            source: None,
            scope,
            cancel,
        };
        if job.playable.is_empty() {
            warn!(segments = segments.len(), "No playable segments to merge");
            return Err(PipelineError::NoValidSegments);
        }

        info!(
            playable = job.playable.len(),
            total = segments.len(),
            format = %settings.format,
            quality = %settings.quality,
            "Merging segments"
        );
        scope.report(0, format!("Merging {} segments", job.playable.len()));
        self.cascade(&job).await
    }

    /// Produce an alternate format of an already merged asset.
    pub async fn convert(
        &self,
        source: &MergeResult,
        settings: MergeSettings,
        subject_name: Option<&str>,
        scope: &ProgressScope,
        cancel: Option<&CancelSignal>,
    ) -> PipelineResult<MergeResult> {
        if source.bytes.is_empty() && playable(&source.segments).is_empty() {
            return Err(PipelineError::NoValidSegments);
        }

        let job = MergeJob {
            segments: &source.segments,
            playable: playable(&source.segments),
            settings,
            subject_name,
            source: Some(source),
            scope,
            cancel,
        };

        info!(from = %source.format, to = %settings.format, "Converting merged video");
        scope.report(0, format!("Converting to {}", settings.format));
        self.cascade(&job).await
    }

    async fn cascade(&self, job: &MergeJob<'_>) -> PipelineResult<MergeResult> {
        let mut failures = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            ensure_active(job.cancel)?;
            let tier = strategy.tier();
            let started = Instant::now();
            info!(tier = %tier, "Trying merge strategy");

            let attempt = match strategy.timeout() {
                Some(limit) => match tokio::time::timeout(limit, strategy.merge(job)).await {
                    Ok(result) => result,
                    Err(_) => Err(PipelineError::merge_failed(format!(
                        "timed out after {}s",
                        limit.as_secs_f64()
                    ))),
                },
                None => strategy.merge(job).await,
            };
            let elapsed = started.elapsed().as_secs_f64();

            match attempt {
                Ok(output) => {
                    metrics::record_merge_attempt(tier.as_str(), true, elapsed);
                    info!(
                        tier = %tier,
                        size_bytes = output.bytes.len(),
                        duration_secs = output.duration_seconds,
                        elapsed_secs = elapsed,
                        "Merge succeeded"
                    );
                    job.scope.report(100, format!("Merged video ready ({})", tier));
                    return Ok(MergeResult {
                        size_bytes: output.bytes.len() as u64,
                        bytes: output.bytes,
                        duration_seconds: output.duration_seconds,
                        segments: job.segments.to_vec(),
                        format: output.format,
                        quality: job.settings.quality,
                        tier,
                    });
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    metrics::record_merge_attempt(tier.as_str(), false, elapsed);
                    warn!(tier = %tier, elapsed_secs = elapsed, "Merge strategy failed: {}", e);
                    job.scope
                        .publish(PipelineEvent::warning(format!("{} merge failed: {}", tier, e)));
                    failures.push(format!("{}: {}", tier, e));
                }
            }
        }

        Err(PipelineError::merge_failed(failures.join("; ")))
    }
}
