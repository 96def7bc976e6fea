//! One segment at a time, each seeded with the last frame of the previous clip.

use mvid_media::FrameImage;
use mvid_models::{Segment, VideoOptions};

use super::{SegmentEngine, SegmentTracker};
use crate::cancel::{ensure_active, CancelSignal};
use crate::error::PipelineResult;

impl SegmentEngine {
    pub(super) async fn run_sequential(
        &self,
        plan: &[Segment],
        options: &VideoOptions,
        tracker: &mut SegmentTracker<'_>,
        cancel: Option<&CancelSignal>,
    ) -> PipelineResult<()> {
        let last = plan.len().saturating_sub(1);
        let mut seed: Option<FrameImage> = None;

        for (index, segment) in plan.iter().enumerate() {
            ensure_active(cancel)?;
            tracker.started(segment);
            if index == last {
                tracker.all_started();
            }

            let outcome = self
                .generate_one(segment, options, seed.as_ref(), tracker.strategy())
                .await;
            tracker.record(outcome);

            if index < last {
                // Falls back to the nearest earlier success when this one failed
                seed = self.extract_seed(tracker.finished(), tracker.scope()).await;
            }
        }
        Ok(())
    }
}
