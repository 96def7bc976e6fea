//! All segments at once.

use futures::stream::{FuturesUnordered, StreamExt};

use mvid_models::{Segment, VideoOptions};

use super::{SegmentEngine, SegmentTracker};

impl SegmentEngine {
    pub(super) async fn run_parallel(
        &self,
        plan: &[Segment],
        options: &VideoOptions,
        tracker: &mut SegmentTracker<'_>,
    ) {
        for segment in plan {
            tracker.started(segment);
        }
        tracker.all_started();
        self.run_wave(plan, options, tracker).await;
    }

    /// Dispatch a wave of unseeded requests and record them as they arrive.
    ///
    /// A failed request never cancels its siblings.
    pub(super) async fn run_wave(
        &self,
        wave: &[Segment],
        options: &VideoOptions,
        tracker: &mut SegmentTracker<'_>,
    ) {
        let strategy = tracker.strategy();
        let mut in_flight: FuturesUnordered<_> = wave
            .iter()
            .map(|segment| self.generate_one(segment, options, None, strategy))
            .collect();

        while let Some(outcome) = in_flight.next().await {
            tracker.record(outcome);
        }
    }
}
