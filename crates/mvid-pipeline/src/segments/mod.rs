//! Segment generation strategy engine.
//!
//! Turns four prompts into four clips. Parallel and hybrid runs dispatch
//! text-to-video waves; sequential runs chain the last frame of each clip
//! into the next image-to-video request.

mod hybrid;
mod parallel;
mod sequential;

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use mvid_media::FrameImage;
use mvid_models::segment::{self, playable};
use mvid_models::{GenerationStrategy, PipelineEvent, Segment, VideoOptions, SEGMENT_COUNT};

use crate::cancel::{ensure_active, CancelSignal};
use crate::collaborators::{ClipGenerator, ClipSpec, FrameExtractor};
use crate::error::{PipelineError, PipelineResult};
use crate::events::ProgressScope;
use crate::metrics;

/// Drives the clip generator according to a [`GenerationStrategy`].
pub struct SegmentEngine {
    generator: Arc<dyn ClipGenerator>,
    frames: Arc<dyn FrameExtractor>,
}

/// Terminal state of one generation attempt.
struct SegmentOutcome {
    segment: Segment,
    error: Option<String>,
}

impl SegmentEngine {
    pub fn new(generator: Arc<dyn ClipGenerator>, frames: Arc<dyn FrameExtractor>) -> Self {
        Self { generator, frames }
    }

    /// Generate one clip per prompt.
    ///
    /// Always yields exactly four segments numbered 1 to 4; clips that could
    /// not be generated come back failed rather than as an error. Errors only
    /// on a wrong prompt count or cancellation.
    pub async fn generate_segments(
        &self,
        prompts: &[String],
        options: &VideoOptions,
        strategy: GenerationStrategy,
        scope: &ProgressScope,
        cancel: Option<&CancelSignal>,
    ) -> PipelineResult<Vec<Segment>> {
        if prompts.len() != SEGMENT_COUNT {
            return Err(PipelineError::InvalidPromptCount(prompts.len()));
        }
        ensure_active(cancel)?;

        let plan = plan_segments(prompts, options);
        info!(
            strategy = %strategy,
            duration = %options.duration,
            "Generating {} segments",
            plan.len()
        );
        scope.report(
            0,
            format!("Generating {} segments ({})", plan.len(), strategy.as_str()),
        );

        let mut tracker = SegmentTracker::new(scope, strategy, plan.len());
        match strategy {
            GenerationStrategy::Parallel => self.run_parallel(&plan, options, &mut tracker).await,
            GenerationStrategy::Hybrid { max_concurrency } => {
                self.run_hybrid(&plan, max_concurrency, options, &mut tracker, cancel)
                    .await?
            }
            GenerationStrategy::Sequential => {
                self.run_sequential(&plan, options, &mut tracker, cancel)
                    .await?
            }
        }

        let segments = tracker.into_segments();
        debug_assert_eq!(segments.len(), SEGMENT_COUNT);
        info!(
            completed = playable(&segments).len(),
            total = segments.len(),
            "Segment generation finished"
        );
        Ok(segments)
    }

    /// Generate a segment again and overwrite its entry by number.
    ///
    /// Under a frame-chaining strategy the retry is seeded from the nearest
    /// earlier completed segment.
    pub async fn regenerate_segment(
        &self,
        segments: &mut Vec<Segment>,
        segment_number: u32,
        options: &VideoOptions,
        strategy: GenerationStrategy,
        scope: &ProgressScope,
    ) -> PipelineResult<Segment> {
        let current = segments
            .iter()
            .find(|s| s.segment_number == segment_number)
            .cloned()
            .ok_or(PipelineError::UnknownSegment(segment_number))?;

        let seed = if strategy.chains_frames() {
            let mut earlier: Vec<Segment> = segments
                .iter()
                .filter(|s| s.segment_number < segment_number)
                .cloned()
                .collect();
            earlier.sort_by_key(|s| s.segment_number);
            self.extract_seed(&earlier, scope).await
        } else {
            None
        };

        info!(segment_number, seeded = seed.is_some(), "Regenerating segment");
        scope.publish(PipelineEvent::segment_started(segment_number, current.prompt.clone()));
        let outcome = self
            .generate_one(&current, options, seed.as_ref(), strategy)
            .await;
        if let Some(message) = &outcome.error {
            scope.publish(PipelineEvent::segment_error(segment_number, message.clone()));
        }
        scope.publish(PipelineEvent::segment_completed(outcome.segment.clone()));

        segment::upsert(segments, outcome.segment.clone());
        Ok(outcome.segment)
    }

    /// One generation call. Failures become a failed segment.
    async fn generate_one(
        &self,
        segment: &Segment,
        options: &VideoOptions,
        seed: Option<&FrameImage>,
        strategy: GenerationStrategy,
    ) -> SegmentOutcome {
        let tag = duration_tag(segment);
        let spec = ClipSpec {
            prompt: &segment.prompt,
            duration_tag: &tag,
            aspect_ratio: options.aspect_ratio,
            resolution: options.resolution,
        };
        let segment_number = segment.segment_number;
        let generating = segment.generating();
        let started = Instant::now();

        let result = match seed {
            Some(seed) => self.generator.image_to_video(seed, spec).await,
            None => self.generator.text_to_video(spec).await,
        };
        let (segment, error) = match result {
            Ok(url) if !url.trim().is_empty() => (generating.completed(url), None),
            Ok(_) => (generating.failed(), Some("generator returned no clip URL".to_string())),
            Err(e) => (generating.failed(), Some(e.to_string())),
        };

        let elapsed = started.elapsed().as_secs_f64();
        metrics::record_segment(strategy.as_str(), seed.is_some(), error.is_none(), elapsed);
        match &error {
            None => info!(
                segment_number,
                seeded = seed.is_some(),
                elapsed_secs = elapsed,
                "Segment completed"
            ),
            Some(message) => warn!(
                segment_number,
                seeded = seed.is_some(),
                "Segment generation failed: {}",
                message
            ),
        }

        SegmentOutcome { segment, error }
    }

    /// Last frame of the most recent completed segment in `finished`.
    async fn extract_seed(&self, finished: &[Segment], scope: &ProgressScope) -> Option<FrameImage> {
        let source = finished.iter().rev().find(|s| s.has_media())?;

        match self.frames.last_frame(&source.media_url).await {
            Ok(frame) => {
                metrics::record_frame_extraction(true);
                debug!(
                    segment_number = source.segment_number,
                    width = frame.width,
                    height = frame.height,
                    "Extracted seed frame"
                );
                Some(frame)
            }
            Err(e) => {
                metrics::record_frame_extraction(false);
                warn!(
                    segment_number = source.segment_number,
                    "Seed frame extraction failed, next segment is unseeded: {}",
                    e
                );
                scope.publish(PipelineEvent::warning(format!(
                    "Could not continue from segment {}: {}",
                    source.segment_number, e
                )));
                None
            }
        }
    }
}

/// Pending segments for the prompts, durations from the class table.
pub fn plan_segments(prompts: &[String], options: &VideoOptions) -> Vec<Segment> {
    prompts
        .iter()
        .zip(options.duration.segment_durations())
        .enumerate()
        .map(|(index, (prompt, secs))| Segment::pending(index as u32 + 1, prompt.clone(), secs as f64))
        .collect()
}

fn duration_tag(segment: &Segment) -> String {
    format!("{}s", segment.duration_seconds.round() as u32)
}

/// Lifecycle events and progress for one generation run.
struct SegmentTracker<'a> {
    scope: &'a ProgressScope,
    strategy: GenerationStrategy,
    total: usize,
    finished: Vec<Segment>,
}

impl<'a> SegmentTracker<'a> {
    fn new(scope: &'a ProgressScope, strategy: GenerationStrategy, total: usize) -> Self {
        Self {
            scope,
            strategy,
            total,
            finished: Vec::with_capacity(total),
        }
    }

    fn strategy(&self) -> GenerationStrategy {
        self.strategy
    }

    fn scope(&self) -> &'a ProgressScope {
        self.scope
    }

    /// Finished segments in arrival order.
    fn finished(&self) -> &[Segment] {
        &self.finished
    }

    fn started(&self, segment: &Segment) {
        debug!(segment_number = segment.segment_number, "Dispatching segment");
        self.scope.publish(PipelineEvent::segment_started(
            segment.segment_number,
            segment.prompt.clone(),
        ));
    }

    fn all_started(&self) {
        self.scope
            .publish(PipelineEvent::all_segments_started(self.total as u32));
    }

    fn record(&mut self, outcome: SegmentOutcome) {
        let segment_number = outcome.segment.segment_number;
        if let Some(message) = outcome.error {
            self.scope
                .publish(PipelineEvent::segment_error(segment_number, message));
        }
        self.scope
            .publish(PipelineEvent::segment_completed(outcome.segment.clone()));
        self.finished.push(outcome.segment);

        let done = self.finished.len();
        let completed: Vec<Segment> = playable(&self.finished).into_iter().cloned().collect();
        self.scope.report_segments(
            (done * 100 / self.total.max(1)) as u8,
            format!("Segment {} finished ({}/{})", segment_number, done, self.total),
            completed,
        );
    }

    fn into_segments(mut self) -> Vec<Segment> {
        self.finished.sort_by_key(|s| s.segment_number);
        self.finished
    }
}
