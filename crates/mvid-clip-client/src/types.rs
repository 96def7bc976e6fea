//! Request/response types for the remote services.

use serde::{Deserialize, Serialize};

use mvid_models::{AspectRatio, OutputFormat, Quality, Resolution};

/// Text-to-video generation request.
#[derive(Debug, Clone, Serialize)]
pub struct TextToVideoRequest {
    pub prompt: String,
    /// Duration tag, e.g. "5s"
    pub duration: String,
    /// "W:H"
    pub aspect_ratio: String,
    pub resolution: Resolution,
}

impl TextToVideoRequest {
    pub fn new(
        prompt: impl Into<String>,
        duration: impl Into<String>,
        aspect_ratio: AspectRatio,
        resolution: Resolution,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            duration: duration.into(),
            aspect_ratio: aspect_ratio.to_string(),
            resolution,
        }
    }
}

/// Image-to-video (continuation) request.
#[derive(Debug, Clone, Serialize)]
pub struct ImageToVideoRequest {
    #[serde(flatten)]
    pub base: TextToVideoRequest,
    /// Seed image as a base64 data URI
    pub image: String,
}

/// Generation response; providers disagree on the field name.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationResponse {
    #[serde(default, alias = "video_url", alias = "videoUrl")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct MechanismRequest<'a> {
    pub drug_name: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MechanismResponse {
    pub mechanism_summary: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptsRequest<'a> {
    pub drug_name: &'a str,
    pub mechanism_summary: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PromptsResponse {
    pub prompts: Vec<String>,
}

/// State of a backend merge job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// Response to a combine submission.
#[derive(Debug, Clone, Deserialize)]
pub struct CombineResponse {
    pub job_id: String,
    pub status: JobState,
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Progress reported by a running merge job.
#[derive(Debug, Clone, Deserialize)]
pub struct JobProgress {
    pub stage: String,
    /// 0-100
    pub progress: f64,
    #[serde(default)]
    pub message: String,
}

/// Result metadata of a completed merge job.
#[derive(Debug, Clone, Deserialize)]
pub struct JobResult {
    pub duration: f64,
    pub size: u64,
    pub format: OutputFormat,
    pub quality: Quality,
    pub segments_count: u32,
}

/// Merge job status snapshot.
#[derive(Debug, Clone, Deserialize)]
pub struct JobStatus {
    pub job_id: String,
    pub status: JobState,
    #[serde(default)]
    pub progress: Option<JobProgress>,
    #[serde(default)]
    pub result: Option<JobResult>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_request_flattens() {
        let request = ImageToVideoRequest {
            base: TextToVideoRequest::new(
                "receptor binding",
                "10s",
                AspectRatio::LANDSCAPE,
                Resolution::P720,
            ),
            image: "data:image/jpeg;base64,AAAA".into(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["prompt"], "receptor binding");
        assert_eq!(json["duration"], "10s");
        assert_eq!(json["resolution"], "720p");
        assert_eq!(json["aspect_ratio"], "16:9");
        assert!(json["image"].as_str().unwrap().starts_with("data:"));
    }

    #[test]
    fn test_generation_response_aliases() {
        let a: GenerationResponse = serde_json::from_str(r#"{"video_url":"https://x/1.mp4"}"#).unwrap();
        let b: GenerationResponse = serde_json::from_str(r#"{"url":"https://x/2.mp4"}"#).unwrap();
        let c: GenerationResponse = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(a.url.as_deref(), Some("https://x/1.mp4"));
        assert_eq!(b.url.as_deref(), Some("https://x/2.mp4"));
        assert!(c.url.is_none());
    }

    #[test]
    fn test_job_status_parsing() {
        let status: JobStatus = serde_json::from_str(
            r#"{
                "job_id": "j-1",
                "status": "completed",
                "progress": {"stage": "complete", "progress": 100.0, "message": "done"},
                "result": {"duration": 39.9, "size": 1024, "format": "mp4", "quality": "high", "segments_count": 4},
                "created_at": "2025-01-01T00:00:00"
            }"#,
        )
        .unwrap();
        assert_eq!(status.status, JobState::Completed);
        assert!(status.status.is_terminal());
        assert_eq!(status.result.unwrap().segments_count, 4);
    }
}
