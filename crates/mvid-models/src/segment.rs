//! Generated video segments.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SegmentStatus {
    /// Placeholder, nothing requested yet
    #[default]
    Pending,
    /// Generation request in flight
    Generating,
    /// Clip available at `media_url`
    Completed,
    /// Generation failed, `media_url` is empty
    Failed,
}

impl SegmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentStatus::Pending => "pending",
            SegmentStatus::Generating => "generating",
            SegmentStatus::Completed => "completed",
            SegmentStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SegmentStatus::Completed | SegmentStatus::Failed)
    }
}

impl fmt::Display for SegmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One independently generated clip.
///
/// A failed segment carries an empty `media_url` instead of an error so the
/// rest of the pipeline can degrade around it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    /// 1-based position in the final video
    pub segment_number: u32,
    /// Prompt used to generate the clip
    pub prompt: String,
    /// Hosted clip URL, empty when generation failed
    #[serde(default)]
    pub media_url: String,
    /// Intended clip length in seconds
    pub duration_seconds: f64,
    #[serde(default)]
    pub status: SegmentStatus,
}

impl Segment {
    /// Placeholder for a segment that has not been requested yet.
    pub fn pending(segment_number: u32, prompt: impl Into<String>, duration_seconds: f64) -> Self {
        Self {
            segment_number,
            prompt: prompt.into(),
            media_url: String::new(),
            duration_seconds,
            status: SegmentStatus::Pending,
        }
    }

    /// Same segment, marked as in flight.
    pub fn generating(&self) -> Self {
        Self {
            status: SegmentStatus::Generating,
            ..self.clone()
        }
    }

    /// Same segment, completed with the given clip URL.
    pub fn completed(&self, media_url: impl Into<String>) -> Self {
        let media_url = media_url.into();
        let status = if media_url.trim().is_empty() {
            SegmentStatus::Failed
        } else {
            SegmentStatus::Completed
        };
        Self {
            media_url,
            status,
            ..self.clone()
        }
    }

    /// Same segment, failed.
    pub fn failed(&self) -> Self {
        Self {
            media_url: String::new(),
            status: SegmentStatus::Failed,
            ..self.clone()
        }
    }

    /// Whether the segment has a usable clip.
    pub fn has_media(&self) -> bool {
        !self.media_url.trim().is_empty()
    }

    pub fn is_failed(&self) -> bool {
        !self.has_media() && self.status.is_terminal()
    }
}

/// Sum of the intended durations of all segments, failed ones included.
pub fn total_duration(segments: &[Segment]) -> f64 {
    segments.iter().map(|s| s.duration_seconds).sum()
}

/// Segments with a usable clip, in segment order.
pub fn playable(segments: &[Segment]) -> Vec<&Segment> {
    let mut out: Vec<&Segment> = segments.iter().filter(|s| s.has_media()).collect();
    out.sort_by_key(|s| s.segment_number);
    out
}

/// Insert or overwrite a segment by number, keeping the list sorted.
pub fn upsert(segments: &mut Vec<Segment>, segment: Segment) {
    match segments
        .iter_mut()
        .find(|s| s.segment_number == segment.segment_number)
    {
        Some(existing) => *existing = segment,
        None => {
            segments.push(segment);
            segments.sort_by_key(|s| s.segment_number);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let pending = Segment::pending(2, "mechanism", 5.0);
        assert_eq!(pending.status, SegmentStatus::Pending);
        assert!(!pending.has_media());
        assert!(!pending.is_failed());

        let done = pending.generating().completed("https://cdn.example.com/2.mp4");
        assert_eq!(done.status, SegmentStatus::Completed);
        assert!(done.has_media());
        assert_eq!(done.segment_number, 2);

        let failed = pending.generating().failed();
        assert!(failed.is_failed());
        assert!(failed.media_url.is_empty());
    }

    #[test]
    fn test_completed_with_empty_url_is_failed() {
        let seg = Segment::pending(1, "intro", 5.0).completed("  ");
        assert_eq!(seg.status, SegmentStatus::Failed);
    }

    #[test]
    fn test_upsert_overwrites_by_number() {
        let mut list = vec![
            Segment::pending(1, "a", 5.0).completed("https://x/1.mp4"),
            Segment::pending(2, "b", 5.0).failed(),
        ];
        upsert(&mut list, Segment::pending(2, "b", 5.0).completed("https://x/2.mp4"));
        assert_eq!(list.len(), 2);
        assert!(list[1].has_media());

        upsert(&mut list, Segment::pending(3, "c", 5.0));
        assert_eq!(
            list.iter().map(|s| s.segment_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_total_and_playable() {
        let list = vec![
            Segment::pending(2, "b", 5.0).completed("https://x/2.mp4"),
            Segment::pending(1, "a", 5.0).failed(),
            Segment::pending(3, "c", 4.0).completed("https://x/3.mp4"),
        ];
        assert!((total_duration(&list) - 14.0).abs() < f64::EPSILON);
        let numbers: Vec<u32> = playable(&list).iter().map(|s| s.segment_number).collect();
        assert_eq!(numbers, vec![2, 3]);
    }

    #[test]
    fn test_serde_camel_case() {
        let seg = Segment::pending(1, "intro", 5.0);
        let json = serde_json::to_value(&seg).unwrap();
        assert_eq!(json["segmentNumber"], 1);
        assert_eq!(json["mediaUrl"], "");
        assert_eq!(json["status"], "pending");
    }
}
