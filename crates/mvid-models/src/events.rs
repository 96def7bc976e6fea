//! Pipeline event types.
//!
//! Events are pushed to subscribers as they happen; nothing here is retained
//! by the pipeline once published.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::segment::Segment;

/// Coarse stage of a run, used to label progress events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStage {
    /// Fetching the mechanism description
    Analyzing,
    /// Building the four segment prompts
    Prompting,
    /// Generating clips
    GeneratingSegments,
    /// Merging clips into one asset
    Concatenating,
    /// Uploading the merged asset
    Uploading,
    /// Run finished
    Complete,
    /// Run failed
    Error,
}

impl ProgressStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressStage::Analyzing => "analyzing",
            ProgressStage::Prompting => "prompting",
            ProgressStage::GeneratingSegments => "generating_segments",
            ProgressStage::Concatenating => "concatenating",
            ProgressStage::Uploading => "uploading",
            ProgressStage::Complete => "complete",
            ProgressStage::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressStage::Complete | ProgressStage::Error)
    }
}

/// Normalized progress update (0-100 across the whole run).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    pub stage: ProgressStage,
    pub percent: u8,
    pub message: String,
    pub time_elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_segments: Option<Vec<Segment>>,
}

impl ProgressEvent {
    pub fn new(
        stage: ProgressStage,
        percent: u8,
        message: impl Into<String>,
        time_elapsed_ms: u64,
    ) -> Self {
        Self {
            stage,
            percent: percent.min(100),
            message: message.into(),
            time_elapsed_ms,
            completed_segments: None,
        }
    }

    pub fn with_segments(mut self, segments: Vec<Segment>) -> Self {
        self.completed_segments = Some(segments);
        self
    }
}

/// Event envelope pushed to subscribers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    /// A segment request is about to be dispatched
    SegmentStarted {
        #[serde(rename = "segmentNumber")]
        segment_number: u32,
        prompt: String,
    },

    /// A segment reached a terminal state (completed or failed)
    SegmentCompleted { segment: Segment },

    /// Every segment of the run has been dispatched
    AllSegmentsStarted {
        #[serde(rename = "segmentCount")]
        segment_count: u32,
    },

    /// Normalized progress update
    Progress(ProgressEvent),

    /// A failure, recoverable unless `fatal`
    Error {
        message: String,
        #[serde(rename = "segmentNumber", skip_serializing_if = "Option::is_none")]
        segment_number: Option<u32>,
        fatal: bool,
        timestamp: DateTime<Utc>,
    },
}

impl PipelineEvent {
    pub fn segment_started(segment_number: u32, prompt: impl Into<String>) -> Self {
        PipelineEvent::SegmentStarted {
            segment_number,
            prompt: prompt.into(),
        }
    }

    pub fn segment_completed(segment: Segment) -> Self {
        PipelineEvent::SegmentCompleted { segment }
    }

    pub fn all_segments_started(segment_count: u32) -> Self {
        PipelineEvent::AllSegmentsStarted { segment_count }
    }

    /// Recoverable failure tied to one segment.
    pub fn segment_error(segment_number: u32, message: impl Into<String>) -> Self {
        PipelineEvent::Error {
            message: message.into(),
            segment_number: Some(segment_number),
            fatal: false,
            timestamp: Utc::now(),
        }
    }

    /// Recoverable failure not tied to a segment.
    pub fn warning(message: impl Into<String>) -> Self {
        PipelineEvent::Error {
            message: message.into(),
            segment_number: None,
            fatal: false,
            timestamp: Utc::now(),
        }
    }

    /// Failure that ends the run.
    pub fn fatal(message: impl Into<String>) -> Self {
        PipelineEvent::Error {
            message: message.into(),
            segment_number: None,
            fatal: true,
            timestamp: Utc::now(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            PipelineEvent::SegmentStarted { .. } => "segment_started",
            PipelineEvent::SegmentCompleted { .. } => "segment_completed",
            PipelineEvent::AllSegmentsStarted { .. } => "all_segments_started",
            PipelineEvent::Progress(_) => "progress",
            PipelineEvent::Error { .. } => "error",
        }
    }
}
