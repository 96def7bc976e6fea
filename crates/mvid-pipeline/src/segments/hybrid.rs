//! Fixed-size batches, one after another.

use tracing::debug;

use mvid_models::{Segment, VideoOptions};

use super::{SegmentEngine, SegmentTracker};
use crate::cancel::{ensure_active, CancelSignal};
use crate::error::PipelineResult;

impl SegmentEngine {
    pub(super) async fn run_hybrid(
        &self,
        plan: &[Segment],
        max_concurrency: usize,
        options: &VideoOptions,
        tracker: &mut SegmentTracker<'_>,
        cancel: Option<&CancelSignal>,
    ) -> PipelineResult<()> {
        let batch_size = max_concurrency.max(1);
        let batch_count = plan.chunks(batch_size).len();

        for (index, batch) in plan.chunks(batch_size).enumerate() {
            ensure_active(cancel)?;
            debug!(batch = index + 1, batch_count, size = batch.len(), "Dispatching batch");

            for segment in batch {
                tracker.started(segment);
            }
            if index + 1 == batch_count {
                tracker.all_started();
            }
            // The next batch waits for this one to settle
            self.run_wave(batch, options, tracker).await;
        }
        Ok(())
    }
}
