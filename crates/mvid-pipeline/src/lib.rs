//! Mechanism video generation pipeline.
//!
//! This crate provides:
//! - Segment generation strategies (parallel, hybrid, sequential with frame chaining)
//! - Tiered concatenation of generated clips
//! - The run orchestrator with normalized progress events
//! - Collaborator adapters over the HTTP clients, FFmpeg and R2

pub mod adapters;
pub mod cancel;
pub mod collaborators;
pub mod concat;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod retry;
pub mod segments;

#[cfg(test)]
mod testing;

pub use cancel::{cancel_pair, CancelSignal};
pub use concat::{ConcatPipeline, MergeSettings, MergeStrategy};
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use events::{EventBus, ProgressBand, ProgressScope};
pub use logging::RunLogger;
pub use orchestrator::{Orchestrator, RunRequest};
pub use segments::SegmentEngine;
