//! Run identifiers and final results.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::merge::{MergeResult, MergeTier};
use crate::segment::Segment;
use crate::strategy::GenerationStrategy;

/// Unique identifier for a generation run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new random run ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where the merged asset was stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadedAsset {
    /// Object key inside the bucket
    pub key: String,
    /// Permanent URL
    pub url: String,
    /// Time-limited signed URL, when the store issues one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiring_url: Option<String>,
}

/// Upload metadata handed to the object store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadMetadata {
    pub run_id: RunId,
    pub subject_name: String,
    pub content_type: String,
    pub file_name: String,
}

/// Provenance of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunProvenance {
    pub run_id: RunId,
    pub strategy: GenerationStrategy,
    pub merge_tier: MergeTier,
    pub processing_time_ms: u64,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Everything a finished run produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FinalResult {
    pub subject_name: String,
    pub mechanism_summary: String,
    pub segments: Vec<Segment>,
    pub merge: MergeResult,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload: Option<UploadedAsset>,
    /// Set when the upload step failed; the merged bytes remain usable
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upload_error: Option<String>,
    pub provenance: RunProvenance,
}

impl FinalResult {
    pub fn completed_segment_count(&self) -> usize {
        self.segments.iter().filter(|s| s.has_media()).count()
    }

    pub fn failed_segment_count(&self) -> usize {
        self.segments.len() - self.completed_segment_count()
    }
}

/// Lowercase, dash-separated form of a subject name for file names and keys.
pub fn slugify(subject: &str) -> String {
    let mut out = String::with_capacity(subject.len());
    let mut last_dash = true;
    for ch in subject.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            out.push('-');
            last_dash = true;
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    if out.is_empty() {
        "video".to_string()
    } else {
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_id_roundtrip() {
        let id = RunId::from_string("run-123");
        assert_eq!(id.as_str(), "run-123");
        assert_eq!(id.to_string(), "run-123");
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Metformin"), "metformin");
        assert_eq!(slugify("  Acetylsalicylic Acid (Aspirin) "), "acetylsalicylic-acid-aspirin");
        assert_eq!(slugify("***"), "video");
    }
}
