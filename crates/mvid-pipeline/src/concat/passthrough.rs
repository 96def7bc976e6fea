//! Single-clip stand-in tier.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::warn;

use mvid_models::segment::total_duration;
use mvid_models::{MergeTier, OutputFormat};

use super::{MergeJob, MergeOutput, MergeStrategy};
use crate::collaborators::SegmentFetcher;
use crate::error::{PipelineError, PipelineResult};

/// Returns the first clip that downloads, reporting the duration of the
/// whole run so players and progress displays stay consistent.
pub struct Passthrough {
    fetcher: Arc<dyn SegmentFetcher>,
}

impl Passthrough {
    pub fn new(fetcher: Arc<dyn SegmentFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait]
impl MergeStrategy for Passthrough {
    fn tier(&self) -> MergeTier {
        MergeTier::Passthrough
    }

    fn timeout(&self) -> Option<Duration> {
        None
    }

    async fn merge(&self, job: &MergeJob<'_>) -> PipelineResult<MergeOutput> {
        // Conversion: keep the asset we already have
        if let Some(source) = job.source.filter(|s| !s.bytes.is_empty()) {
            return Ok(MergeOutput {
                bytes: source.bytes.clone(),
                duration_seconds: source.duration_seconds,
                format: source.format,
            });
        }

        let mut last_error = None;
        for segment in &job.playable {
            match self.fetcher.fetch(&segment.media_url).await {
                Ok(bytes) => {
                    warn!(
                        segment_number = segment.segment_number,
                        "Using a single segment in place of the merged video"
                    );
                    return Ok(MergeOutput {
                        bytes,
                        duration_seconds: total_duration(job.segments),
                        // Generated clips are always MP4
                        format: OutputFormat::Mp4,
                    });
                }
                Err(e) => {
                    warn!(segment_number = segment.segment_number, "Segment download failed: {}", e);
                    last_error = Some(e);
                }
            }
        }

        Err(match last_error {
            Some(e) => e.into(),
            None => PipelineError::NoValidSegments,
        })
    }
}
