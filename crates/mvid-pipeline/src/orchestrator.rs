//! Generation orchestrator.
//!
//! Runs analysis, prompts, segment generation, concatenation and the
//! optional upload in order, with each stage reporting inside its own
//! progress band.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::Instrument;

use mvid_models::segment::playable;
use mvid_models::{
    slugify, FinalResult, GenerationStrategy, MergeResult, OutputFormat, PipelineEvent,
    ProgressStage, RunId, RunProvenance, UploadMetadata, UploadedAsset, VideoOptions,
};

use crate::cancel::{ensure_active, CancelSignal};
use crate::collaborators::{ContentService, Uploader};
use crate::concat::{ConcatPipeline, MergeSettings};
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::events::{EventBus, ProgressBand, ProgressScope};
use crate::logging::RunLogger;
use crate::metrics;
use crate::retry::{retry_async, RetryConfig};
use crate::segments::SegmentEngine;

/// One generation request.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub subject_name: String,
    pub options: VideoOptions,
    pub output_format: OutputFormat,
    /// Favor frame chaining over speed when picking a strategy
    pub prefer_continuity: bool,
    /// Fixed strategy instead of the one picked from the options
    pub strategy: Option<GenerationStrategy>,
}

impl RunRequest {
    pub fn new(subject_name: impl Into<String>, options: VideoOptions) -> Self {
        Self {
            subject_name: subject_name.into(),
            options,
            output_format: OutputFormat::default(),
            prefer_continuity: false,
            strategy: None,
        }
    }

    pub fn with_format(mut self, output_format: OutputFormat) -> Self {
        self.output_format = output_format;
        self
    }

    pub fn with_continuity(mut self, prefer_continuity: bool) -> Self {
        self.prefer_continuity = prefer_continuity;
        self
    }

    pub fn with_strategy(mut self, strategy: GenerationStrategy) -> Self {
        self.strategy = Some(strategy);
        self
    }
}

/// Sequences a full run and publishes its events.
pub struct Orchestrator {
    config: PipelineConfig,
    content: Arc<dyn ContentService>,
    engine: SegmentEngine,
    concat: ConcatPipeline,
    uploader: Option<Arc<dyn Uploader>>,
    bus: EventBus,
}

impl Orchestrator {
    pub fn new(
        config: PipelineConfig,
        content: Arc<dyn ContentService>,
        engine: SegmentEngine,
        concat: ConcatPipeline,
        uploader: Option<Arc<dyn Uploader>>,
    ) -> Self {
        let bus = EventBus::new(config.event_capacity);
        Self {
            config,
            content,
            engine,
            concat,
            uploader,
            bus,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.bus.subscribe()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn engine(&self) -> &SegmentEngine {
        &self.engine
    }

    pub fn concat(&self) -> &ConcatPipeline {
        &self.concat
    }

    /// Strategy for a request: the override, or the one suited to its duration.
    pub fn strategy_for(&self, request: &RunRequest) -> GenerationStrategy {
        if let Some(strategy) = request.strategy {
            return strategy;
        }
        match GenerationStrategy::optimal(request.options.duration, request.prefer_continuity) {
            GenerationStrategy::Hybrid { .. } => GenerationStrategy::hybrid(self.config.hybrid_concurrency),
            other => other,
        }
    }

    /// Run every stage for one subject.
    ///
    /// Analysis and prompt failures end the run. Segment and merge failures
    /// are absorbed by their fallbacks and only end it when nothing playable
    /// is left. Upload failures are recorded on the result.
    pub async fn run(
        &self,
        request: RunRequest,
        cancel: Option<CancelSignal>,
    ) -> PipelineResult<FinalResult> {
        let run_id = RunId::new();
        let logger = RunLogger::new(&run_id, &request.subject_name);
        let root = ProgressScope::root(self.bus.clone());
        let clock = Instant::now();

        logger.log_start(&format!(
            "duration={}, quality={}, format={}",
            request.options.duration, request.options.quality, request.output_format
        ));

        let result = self
            .execute(&run_id, &request, &root, cancel.as_ref(), &logger, clock)
            .instrument(logger.create_span())
            .await;

        let elapsed = clock.elapsed().as_secs_f64();
        match &result {
            Ok(outcome) => {
                metrics::record_run(true, elapsed);
                logger.log_completion(&format!(
                    "{} of {} segments, merged by {} in {:.1}s",
                    outcome.completed_segment_count(),
                    outcome.segments.len(),
                    outcome.merge.tier,
                    elapsed
                ));
                root.complete("Video ready");
            }
            Err(e) => {
                metrics::record_run(false, elapsed);
                logger.log_error(&e.to_string());
                root.fail(e.to_string());
            }
        }
        result
    }

    async fn execute(
        &self,
        run_id: &RunId,
        request: &RunRequest,
        root: &ProgressScope,
        cancel: Option<&CancelSignal>,
        logger: &RunLogger,
        clock: Instant,
    ) -> PipelineResult<FinalResult> {
        let started_at = Utc::now();
        let subject = request.subject_name.as_str();

        ensure_active(cancel)?;
        let analysis = root.stage(ProgressStage::Analyzing, ProgressBand::ANALYSIS);
        logger.log_stage("analysis", "Fetching mechanism summary");
        analysis.report(0, format!("Analyzing {}", subject));
        let mechanism_summary = self
            .content
            .mechanism(subject)
            .await
            .map_err(|e| PipelineError::analysis_failed(e.to_string()))?;
        analysis.report(100, "Mechanism analysis complete");

        ensure_active(cancel)?;
        let prompting = root.stage(ProgressStage::Prompting, ProgressBand::PROMPTS);
        logger.log_stage("prompts", "Building segment prompts");
        prompting.report(0, "Writing segment prompts");
        let prompts = self
            .content
            .prompts(subject, &mechanism_summary)
            .await
            .map_err(|e| PipelineError::prompts_failed(e.to_string()))?;
        prompting.report(100, format!("{} prompts ready", prompts.len()));

        ensure_active(cancel)?;
        let strategy = self.strategy_for(request);
        let generating = root.stage(ProgressStage::GeneratingSegments, ProgressBand::SEGMENTS);
        logger.log_stage("segments", &format!("Generating segments ({})", strategy));
        let segments = self
            .engine
            .generate_segments(&prompts, &request.options, strategy, &generating, cancel)
            .await?;
        if playable(&segments).is_empty() {
            return Err(PipelineError::NoValidSegments);
        }

        ensure_active(cancel)?;
        let concatenating = root.stage(ProgressStage::Concatenating, ProgressBand::CONCATENATION);
        logger.log_stage("concatenation", "Merging segments");
        let merge = self
            .concat
            .merge(
                &segments,
                MergeSettings::new(request.output_format, request.options.quality),
                Some(subject),
                &concatenating,
                cancel,
            )
            .await?;
        if merge.is_fallback() {
            logger.log_warning("Merged video is a single segment stand-in");
        }

        ensure_active(cancel)?;
        let (upload, upload_error) = self.upload(run_id, subject, &merge, root, logger).await;

        Ok(FinalResult {
            subject_name: subject.to_string(),
            mechanism_summary,
            segments,
            provenance: RunProvenance {
                run_id: run_id.clone(),
                strategy,
                merge_tier: merge.tier,
                processing_time_ms: clock.elapsed().as_millis() as u64,
                started_at,
                finished_at: Utc::now(),
            },
            merge,
            upload,
            upload_error,
        })
    }

    /// Store the merged asset. Failures are returned as a message, never an error.
    async fn upload(
        &self,
        run_id: &RunId,
        subject: &str,
        merge: &MergeResult,
        root: &ProgressScope,
        logger: &RunLogger,
    ) -> (Option<UploadedAsset>, Option<String>) {
        let uploader = match &self.uploader {
            Some(uploader) if self.config.upload_enabled => Arc::clone(uploader),
            _ => return (None, None),
        };

        let uploading = root.stage(ProgressStage::Uploading, ProgressBand::UPLOAD);
        logger.log_stage("upload", "Uploading merged video");
        uploading.report(0, "Uploading video");

        let metadata = UploadMetadata {
            run_id: run_id.clone(),
            subject_name: subject.to_string(),
            content_type: merge.format.content_type().to_string(),
            file_name: format!("{}.{}", slugify(subject), merge.format.extension()),
        };
        let retry = RetryConfig::new("upload").with_max_retries(self.config.upload_retries);

        let outcome = retry_async(
            &retry,
            |e: &mvid_storage::StorageError| e.is_retryable(),
            || {
                let uploader = Arc::clone(&uploader);
                let bytes = merge.bytes.clone();
                let metadata = &metadata;
                async move { uploader.upload(bytes, metadata, merge.format).await }
            },
        )
        .await
        .into_result();

        match outcome {
            Ok(asset) => {
                metrics::record_upload(true);
                uploading.report(100, "Upload complete");
                (Some(asset), None)
            }
            Err(e) => {
                metrics::record_upload(false);
                let message = PipelineError::UploadFailed(e.to_string()).to_string();
                logger.log_warning(&message);
                uploading.publish(PipelineEvent::warning(message.clone()));
                (None, Some(message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mvid_clip_client::ClientError;
    use mvid_models::{DurationClass, MergeTier, ProgressEvent};
    use mvid_storage::StorageError;

    use super::*;
    use crate::cancel::cancel_pair;
    use crate::collaborators::{MockMergeJobApi, MockUploader};
    use crate::testing::{FakeContent, FakeFetcher, FakeFrames, FakeGenerator, FakeToolchain};

    fn config() -> PipelineConfig {
        PipelineConfig {
            backend_poll_interval: Duration::from_millis(5),
            backend_timeout: Duration::from_millis(100),
            upload_retries: 1,
            ..PipelineConfig::default()
        }
    }

    fn orchestrator(
        content: FakeContent,
        generator: FakeGenerator,
        uploader: Option<MockUploader>,
        config: PipelineConfig,
    ) -> (Orchestrator, Arc<FakeGenerator>) {
        let generator = Arc::new(generator);
        let engine = SegmentEngine::new(generator.clone(), Arc::new(FakeFrames::new()));

        let mut api = MockMergeJobApi::new();
        api.expect_submit()
            .returning(|_| Err(ClientError::ServiceUnavailable("merge backend down".into())));
        let concat = ConcatPipeline::standard(
            Arc::new(api),
            Arc::new(FakeFetcher::new()),
            Arc::new(FakeToolchain::default()),
            &config,
        );

        let uploader = uploader.map(|u| Arc::new(u) as Arc<dyn Uploader>);
        (
            Orchestrator::new(config, Arc::new(content), engine, concat, uploader),
            generator,
        )
    }

    fn working_uploader() -> MockUploader {
        let mut uploader = MockUploader::new();
        uploader
            .expect_upload()
            .withf(|bytes, metadata, format| {
                !bytes.is_empty() && metadata.file_name == "metformin-hcl.mp4" && *format == OutputFormat::Mp4
            })
            .times(1)
            .returning(|_, metadata, _| {
                Ok(UploadedAsset {
                    key: format!("videos/{}/metformin-hcl.mp4", metadata.run_id),
                    url: "https://media.example.com/metformin-hcl.mp4".into(),
                    expiring_url: None,
                })
            });
        uploader
    }

    fn progress(events: &[PipelineEvent]) -> Vec<ProgressEvent> {
        events
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::Progress(p) => Some(p.clone()),
                _ => None,
            })
            .collect()
    }

    fn drain(rx: &mut broadcast::Receiver<PipelineEvent>) -> Vec<PipelineEvent> {
        std::iter::from_fn(|| rx.try_recv().ok()).collect()
    }

    #[tokio::test]
    async fn test_full_run() {
        let (orchestrator, generator) = orchestrator(
            FakeContent::default(),
            FakeGenerator::new(),
            Some(working_uploader()),
            config(),
        );
        let mut rx = orchestrator.subscribe();

        let result = orchestrator
            .run(RunRequest::new("Metformin HCl", VideoOptions::new(DurationClass::Short)), None)
            .await
            .unwrap();

        assert_eq!(result.segments.len(), 4);
        assert_eq!(result.completed_segment_count(), 4);
        assert_eq!(result.merge.tier, MergeTier::Local);
        assert_eq!(result.merge.duration_seconds, 20.0);
        assert_eq!(result.provenance.strategy, GenerationStrategy::Parallel);
        assert_eq!(result.provenance.merge_tier, MergeTier::Local);
        assert!(result.upload.is_some());
        assert!(result.upload_error.is_none());
        assert_eq!(generator.calls().len(), 4);

        let updates = progress(&drain(&mut rx));
        let percents: Vec<u8> = updates.iter().map(|p| p.percent).collect();
        assert!(percents.windows(2).all(|w| w[0] <= w[1]), "{:?}", percents);
        let last = updates.last().unwrap();
        assert_eq!(last.stage, ProgressStage::Complete);
        assert_eq!(last.percent, 100);

        // Stages appear in band order
        let stages: Vec<ProgressStage> = updates.iter().map(|p| p.stage).collect();
        let first = |stage| stages.iter().position(|s| *s == stage).unwrap();
        assert!(first(ProgressStage::Analyzing) < first(ProgressStage::Prompting));
        assert!(first(ProgressStage::Prompting) < first(ProgressStage::GeneratingSegments));
        assert!(first(ProgressStage::GeneratingSegments) < first(ProgressStage::Concatenating));
        assert!(first(ProgressStage::Concatenating) < first(ProgressStage::Uploading));
    }

    #[tokio::test]
    async fn test_analysis_failure_is_fatal() {
        let content = FakeContent {
            summary: None,
            ..FakeContent::default()
        };
        let (orchestrator, generator) = orchestrator(content, FakeGenerator::new(), None, config());
        let mut rx = orchestrator.subscribe();

        let err = orchestrator
            .run(RunRequest::new("metformin", VideoOptions::default()), None)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::AnalysisFailed(_)));
        assert!(generator.calls().is_empty());

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, PipelineEvent::Error { fatal: true, .. })));
        assert_eq!(progress(&events).last().unwrap().stage, ProgressStage::Error);
    }

    #[tokio::test]
    async fn test_prompt_failure_is_fatal() {
        let content = FakeContent {
            prompts: None,
            ..FakeContent::default()
        };
        let (orchestrator, _) = orchestrator(content, FakeGenerator::new(), None, config());
        let mut rx = orchestrator.subscribe();

        let err = orchestrator
            .run(RunRequest::new("metformin", VideoOptions::default()), None)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::PromptsFailed(_)));
        let last = progress(&drain(&mut rx)).pop().unwrap();
        assert_eq!(last.stage, ProgressStage::Error);
        assert_eq!(last.percent, ProgressBand::ANALYSIS.end);
    }

    #[tokio::test]
    async fn test_wrong_prompt_count_is_fatal() {
        let content = FakeContent {
            prompts: Some(vec!["only".into(), "two".into()]),
            ..FakeContent::default()
        };
        let (orchestrator, generator) = orchestrator(content, FakeGenerator::new(), None, config());

        let err = orchestrator
            .run(RunRequest::new("metformin", VideoOptions::default()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidPromptCount(2)));
        assert!(generator.calls().is_empty());
    }

    #[tokio::test]
    async fn test_upload_failure_keeps_result() {
        let mut uploader = MockUploader::new();
        uploader
            .expect_upload()
            .times(2)
            .returning(|_, _, _| Err(StorageError::UploadFailed("bucket unavailable".into())));
        let (orchestrator, _) = orchestrator(
            FakeContent::default(),
            FakeGenerator::new(),
            Some(uploader),
            config(),
        );
        let mut rx = orchestrator.subscribe();

        let result = orchestrator
            .run(RunRequest::new("metformin", VideoOptions::default()), None)
            .await
            .unwrap();

        assert!(result.upload.is_none());
        assert!(result.upload_error.unwrap().contains("bucket unavailable"));
        assert!(!result.merge.bytes.is_empty());

        let events = drain(&mut rx);
        assert!(events
            .iter()
            .any(|e| matches!(e, PipelineEvent::Error { fatal: false, .. })));
        assert_eq!(progress(&events).last().unwrap().stage, ProgressStage::Complete);
    }

    #[tokio::test]
    async fn test_upload_disabled() {
        let mut uploader = MockUploader::new();
        uploader.expect_upload().times(0);
        let config = PipelineConfig {
            upload_enabled: false,
            ..config()
        };
        let (orchestrator, _) = orchestrator(FakeContent::default(), FakeGenerator::new(), Some(uploader), config);

        let result = orchestrator
            .run(RunRequest::new("metformin", VideoOptions::default()), None)
            .await
            .unwrap();
        assert!(result.upload.is_none());
        assert!(result.upload_error.is_none());
    }

    #[tokio::test]
    async fn test_all_segments_failing_ends_run() {
        let generator = ["intro", "mechanism", "effects", "safety"]
            .iter()
            .fold(FakeGenerator::new(), |g, p| g.failing(p));
        let (orchestrator, _) = orchestrator(FakeContent::default(), generator, None, config());

        let err = orchestrator
            .run(RunRequest::new("metformin", VideoOptions::default()), None)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoValidSegments));
    }

    #[tokio::test]
    async fn test_cancelled_run() {
        let (orchestrator, generator) = orchestrator(FakeContent::default(), FakeGenerator::new(), None, config());
        let (tx, rx) = cancel_pair();
        tx.send(true).unwrap();

        let err = orchestrator
            .run(RunRequest::new("metformin", VideoOptions::default()), Some(rx))
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(generator.calls().is_empty());
    }

    #[test]
    fn test_strategy_selection() {
        let config = PipelineConfig {
            hybrid_concurrency: 3,
            ..config()
        };
        let (orchestrator, _) = orchestrator(FakeContent::default(), FakeGenerator::new(), None, config);

        let standard = RunRequest::new("x", VideoOptions::new(DurationClass::Standard));
        assert_eq!(orchestrator.strategy_for(&standard), GenerationStrategy::hybrid(3));

        let continuity = RunRequest::new("x", VideoOptions::new(DurationClass::Short)).with_continuity(true);
        assert_eq!(orchestrator.strategy_for(&continuity), GenerationStrategy::Sequential);

        let fixed = RunRequest::new("x", VideoOptions::new(DurationClass::Extended))
            .with_strategy(GenerationStrategy::Parallel);
        assert_eq!(orchestrator.strategy_for(&fixed), GenerationStrategy::Parallel);
    }
}
