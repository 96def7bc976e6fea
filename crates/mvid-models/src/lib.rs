//! Shared data models for the mechanism video pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Segments and their lifecycle
//! - Video options (duration class, quality, format, framing)
//! - Generation strategies
//! - Encoding quality presets
//! - Merge requests/results and final run results
//! - Pipeline event schemas

pub mod encoding;
pub mod events;
pub mod merge;
pub mod options;
pub mod run;
pub mod segment;
pub mod strategy;

// Re-export common types
pub use encoding::EncodingConfig;
pub use events::{PipelineEvent, ProgressEvent, ProgressStage};
pub use merge::{MergeRequest, MergeResult, MergeTier, SegmentRef, MAX_MERGE_SEGMENTS};
pub use options::{
    AspectRatio, DurationClass, OptionParseError, OutputFormat, Quality, Resolution,
    VideoOptions, SEGMENT_COUNT,
};
pub use run::{slugify, FinalResult, RunId, RunProvenance, UploadMetadata, UploadedAsset};
pub use segment::{Segment, SegmentStatus};
pub use strategy::{GenerationStrategy, DEFAULT_HYBRID_CONCURRENCY};
