//! In-process FFmpeg tier.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use mvid_models::{EncodingConfig, MergeTier};

use super::{MergeJob, MergeOutput, MergeStrategy};
use crate::cancel::ensure_active;
use crate::collaborators::{MediaToolchain, SegmentFetcher};
use crate::error::PipelineResult;

/// Downloads every clip and re-encodes them into one file.
pub struct LocalMerge {
    fetcher: Arc<dyn SegmentFetcher>,
    toolchain: Arc<dyn MediaToolchain>,
}

impl LocalMerge {
    pub fn new(fetcher: Arc<dyn SegmentFetcher>, toolchain: Arc<dyn MediaToolchain>) -> Self {
        Self { fetcher, toolchain }
    }

    async fn transcode_source(&self, job: &MergeJob<'_>, source: &[u8], duration_seconds: f64) -> PipelineResult<MergeOutput> {
        let settings = job.settings;
        job.scope.narrow(0, 90).report(0, format!("Transcoding to {}", settings.format));

        let bytes = self
            .toolchain
            .transcode(
                source.to_vec(),
                EncodingConfig::for_quality(settings.quality, settings.format),
                settings.format,
                job.cancel.cloned(),
            )
            .await?;

        Ok(MergeOutput {
            bytes,
            duration_seconds,
            format: settings.format,
        })
    }
}

#[async_trait]
impl MergeStrategy for LocalMerge {
    fn tier(&self) -> MergeTier {
        MergeTier::Local
    }

    fn timeout(&self) -> Option<Duration> {
        None
    }

    async fn merge(&self, job: &MergeJob<'_>) -> PipelineResult<MergeOutput> {
        if let Some(source) = job.source {
            return self
                .transcode_source(job, &source.bytes, source.duration_seconds)
                .await;
        }

        let settings = job.settings;
        let count = job.playable.len();

        let downloading = job.scope.narrow(0, 40);
        let mut inputs = Vec::with_capacity(count);
        for (index, segment) in job.playable.iter().enumerate() {
            ensure_active(job.cancel)?;
            let bytes = self.fetcher.fetch(&segment.media_url).await?;
            debug!(segment_number = segment.segment_number, size_bytes = bytes.len(), "Downloaded segment");
            inputs.push(bytes);
            downloading.report(
                ((index + 1) * 100 / count.max(1)) as u8,
                format!("Downloaded segment {} ({}/{})", segment.segment_number, index + 1, count),
            );
        }

        ensure_active(job.cancel)?;
        let expected = job.playable_duration();
        let combining = job.scope.narrow(40, 90);
        combining.report(0, format!("Combining {} segments", count));
        let on_progress: Box<dyn Fn(u8) + Send + Sync> = {
            let combining = combining.clone();
            Box::new(move |percent| combining.report(percent, "Combining segments"))
        };

        let output = self
            .toolchain
            .concat(
                inputs,
                EncodingConfig::for_quality(settings.quality, settings.format),
                settings.format,
                expected,
                job.cancel.cloned(),
                on_progress,
            )
            .await?;

        job.scope.narrow(90, 100).report(0, "Finalizing merged video");
        let duration_seconds = output
            .duration_seconds
            .filter(|d| *d > 0.0)
            .unwrap_or(expected);
        info!(
            segments = count,
            size_bytes = output.bytes.len(),
            duration_secs = duration_seconds,
            "Local merge finished"
        );

        Ok(MergeOutput {
            bytes: output.bytes,
            duration_seconds,
            format: settings.format,
        })
    }
}
