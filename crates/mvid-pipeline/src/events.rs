//! Typed event bus and progress bands.
//!
//! Every component publishes [`PipelineEvent`]s onto one broadcast channel.
//! Progress is reported through a [`ProgressScope`], which maps a stage's
//! local 0-100 range onto its fixed band of the run's 0-100 range.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;
use tracing::trace;

use mvid_models::{PipelineEvent, ProgressEvent, ProgressStage, Segment};

/// A contiguous slice of the run's 0-100 progress range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressBand {
    pub start: u8,
    pub end: u8,
}

impl ProgressBand {
    pub const ANALYSIS: ProgressBand = ProgressBand::new(0, 10);
    pub const PROMPTS: ProgressBand = ProgressBand::new(10, 20);
    pub const SEGMENTS: ProgressBand = ProgressBand::new(20, 70);
    pub const CONCATENATION: ProgressBand = ProgressBand::new(70, 95);
    pub const UPLOAD: ProgressBand = ProgressBand::new(95, 100);
    pub const FULL: ProgressBand = ProgressBand::new(0, 100);

    pub const fn new(start: u8, end: u8) -> Self {
        Self { start, end }
    }

    /// Map a local percentage into this band.
    pub fn map(&self, local_percent: u8) -> u8 {
        let local = local_percent.min(100) as u32;
        let span = self.end.saturating_sub(self.start) as u32;
        self.start + ((span * local) / 100) as u8
    }

    /// A sub-band of this band, both bounds given as local percentages.
    pub fn sub(&self, local_start: u8, local_end: u8) -> ProgressBand {
        ProgressBand::new(self.map(local_start), self.map(local_end))
    }
}

/// Publish/subscribe channel for pipeline events.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<PipelineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PipelineEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn publish(&self, event: PipelineEvent) {
        trace!(event = event.type_name(), "Publishing event");
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

/// Per-run clock and progress high-water mark shared by all scopes of a run.
#[derive(Debug)]
struct RunClock {
    started: Instant,
    high_water: AtomicU8,
}

/// Progress reporter for one stage of a run.
#[derive(Debug, Clone)]
pub struct ProgressScope {
    bus: EventBus,
    stage: ProgressStage,
    band: ProgressBand,
    clock: Arc<RunClock>,
}

impl ProgressScope {
    /// Root scope for a new run, covering the full 0-100 range.
    pub fn root(bus: EventBus) -> Self {
        Self {
            bus,
            stage: ProgressStage::Analyzing,
            band: ProgressBand::FULL,
            clock: Arc::new(RunClock {
                started: Instant::now(),
                high_water: AtomicU8::new(0),
            }),
        }
    }

    /// Scope for a stage of the same run.
    pub fn stage(&self, stage: ProgressStage, band: ProgressBand) -> Self {
        Self {
            bus: self.bus.clone(),
            stage,
            band,
            clock: Arc::clone(&self.clock),
        }
    }

    /// Narrow this scope to a local sub-range, keeping the stage.
    pub fn narrow(&self, local_start: u8, local_end: u8) -> Self {
        Self {
            band: self.band.sub(local_start, local_end),
            ..self.clone()
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn band(&self) -> ProgressBand {
        self.band
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.clock.started.elapsed().as_millis() as u64
    }

    /// Global percentage reported so far.
    pub fn current_percent(&self) -> u8 {
        self.clock.high_water.load(Ordering::SeqCst)
    }

    /// Report local progress within this scope.
    pub fn report(&self, local_percent: u8, message: impl Into<String>) {
        self.emit(local_percent, message.into(), None);
    }

    /// Report local progress together with the segments completed so far.
    pub fn report_segments(&self, local_percent: u8, message: impl Into<String>, segments: Vec<Segment>) {
        self.emit(local_percent, message.into(), Some(segments));
    }

    /// Publish a non-progress event on the run's bus.
    pub fn publish(&self, event: PipelineEvent) {
        self.bus.publish(event);
    }

    /// Final 100% event with the `complete` stage.
    pub fn complete(&self, message: impl Into<String>) {
        self.clock.high_water.store(100, Ordering::SeqCst);
        self.bus.publish(PipelineEvent::Progress(ProgressEvent::new(
            ProgressStage::Complete,
            100,
            message,
            self.elapsed_ms(),
        )));
    }

    /// Terminal failure: a fatal error event plus an `error` stage update.
    pub fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        self.bus.publish(PipelineEvent::fatal(message.clone()));
        self.bus.publish(PipelineEvent::Progress(ProgressEvent::new(
            ProgressStage::Error,
            self.current_percent(),
            message,
            self.elapsed_ms(),
        )));
    }

    fn emit(&self, local_percent: u8, message: String, segments: Option<Vec<Segment>>) {
        // Never let a later fallback drag the overall figure backwards
        let mapped = self.band.map(local_percent);
        let previous = self.clock.high_water.fetch_max(mapped, Ordering::SeqCst);
        let percent = previous.max(mapped);

        let mut event = ProgressEvent::new(self.stage, percent, message, self.elapsed_ms());
        if let Some(segments) = segments {
            event = event.with_segments(segments);
        }
        self.bus.publish(PipelineEvent::Progress(event));
    }
}
