//! Segment generation strategy.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::options::DurationClass;

/// Default batch size for hybrid generation.
pub const DEFAULT_HYBRID_CONCURRENCY: usize = 2;

/// How the four segments of a run are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GenerationStrategy {
    /// All segments at once, text-to-video only
    Parallel,
    /// Batches of `max_concurrency`, one batch at a time, text-to-video only
    Hybrid { max_concurrency: usize },
    /// One at a time, each seeded with the previous segment's last frame
    Sequential,
}

impl GenerationStrategy {
    pub fn hybrid(max_concurrency: usize) -> Self {
        GenerationStrategy::Hybrid {
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationStrategy::Parallel => "parallel",
            GenerationStrategy::Hybrid { .. } => "hybrid",
            GenerationStrategy::Sequential => "sequential",
        }
    }

    /// Whether segments are seeded from the previous segment's last frame.
    pub fn chains_frames(&self) -> bool {
        matches!(self, GenerationStrategy::Sequential)
    }

    /// Pick the strategy for a duration class and continuity preference.
    ///
    /// Rules are checked in order: short without continuity runs parallel,
    /// standard always runs hybrid, extended or a continuity request runs
    /// sequential.
    pub fn optimal(duration: DurationClass, prefer_continuity: bool) -> Self {
        match (duration, prefer_continuity) {
            (DurationClass::Short, false) => GenerationStrategy::Parallel,
            (DurationClass::Standard, _) => GenerationStrategy::hybrid(DEFAULT_HYBRID_CONCURRENCY),
            (DurationClass::Extended, _) | (_, true) => GenerationStrategy::Sequential,
        }
    }
}

impl Default for GenerationStrategy {
    fn default() -> Self {
        GenerationStrategy::hybrid(DEFAULT_HYBRID_CONCURRENCY)
    }
}

impl fmt::Display for GenerationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GenerationStrategy::Hybrid { max_concurrency } => {
                write!(f, "hybrid(max_concurrency={})", max_concurrency)
            }
            other => write!(f, "{}", other.as_str()),
        }
    }
}
