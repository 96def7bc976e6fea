//! Merge requests and results.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::{Validate, ValidationError};

use crate::options::{OutputFormat, Quality};
use crate::segment::Segment;

/// Maximum number of segments a backend merge job accepts.
pub const MAX_MERGE_SEGMENTS: u64 = 20;

/// Which of the ordered merge strategies produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MergeTier {
    /// Server-side merge job
    Backend,
    /// In-process FFmpeg concat
    Local,
    /// First playable segment returned as-is
    Passthrough,
}

impl MergeTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeTier::Backend => "backend",
            MergeTier::Local => "local",
            MergeTier::Passthrough => "passthrough",
        }
    }

    /// Whether the asset actually contains every playable segment.
    pub fn is_full_merge(&self) -> bool {
        !matches!(self, MergeTier::Passthrough)
    }
}

impl fmt::Display for MergeTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Reference to one clip in a merge job submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct SegmentRef {
    #[validate(custom(function = "validate_http_url"))]
    pub url: String,
    pub duration: f64,
    pub segment_number: u32,
    pub format: OutputFormat,
}

impl SegmentRef {
    pub fn from_segment(segment: &Segment) -> Self {
        Self {
            url: segment.media_url.clone(),
            duration: segment.duration_seconds,
            segment_number: segment.segment_number,
            format: OutputFormat::Mp4,
        }
    }
}

/// Merge job submission, as accepted by the backend combine endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct MergeRequest {
    #[validate(length(min = 1, max = 20), nested)]
    pub segments: Vec<SegmentRef>,
    pub output_format: OutputFormat,
    pub quality: Quality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub drug_name: Option<String>,
}

impl MergeRequest {
    /// Build a request from the playable segments of a run.
    pub fn from_segments(
        segments: &[Segment],
        output_format: OutputFormat,
        quality: Quality,
        drug_name: Option<String>,
    ) -> Self {
        Self {
            segments: crate::segment::playable(segments)
                .into_iter()
                .map(SegmentRef::from_segment)
                .collect(),
            output_format,
            quality,
            drug_name,
        }
    }
}

fn validate_http_url(value: &str) -> Result<(), ValidationError> {
    match url::Url::parse(value) {
        Ok(parsed) if parsed.scheme() == "http" || parsed.scheme() == "https" => Ok(()),
        _ => Err(ValidationError::new("http_url")),
    }
}

/// The single merged asset of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MergeResult {
    /// Encoded video bytes
    #[serde(skip)]
    pub bytes: Vec<u8>,
    /// Reported length in seconds
    pub duration_seconds: f64,
    /// Every input segment, failed ones included
    pub segments: Vec<Segment>,
    pub format: OutputFormat,
    pub size_bytes: u64,
    pub quality: Quality,
    /// Strategy that produced the asset
    pub tier: MergeTier,
}

impl MergeResult {
    /// Whether the asset is a single-segment stand-in for the full merge.
    pub fn is_fallback(&self) -> bool {
        !self.tier.is_full_merge()
    }
}
