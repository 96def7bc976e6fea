//! Video encoding configuration and quality presets.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::options::{OutputFormat, Quality};

/// H.264 video codec for mp4 output
pub const MP4_VIDEO_CODEC: &str = "libx264";
/// AAC audio codec for mp4 output
pub const MP4_AUDIO_CODEC: &str = "aac";
/// VP9 video codec for webm output
pub const WEBM_VIDEO_CODEC: &str = "libvpx-vp9";
/// Opus audio codec for webm output
pub const WEBM_AUDIO_CODEC: &str = "libopus";
/// Default audio bitrate
pub const DEFAULT_AUDIO_BITRATE: &str = "128k";

/// Seek offset from the end of a clip when grabbing its last frame.
pub const LAST_FRAME_SEEK_FROM_END: &str = "-0.25";
/// JPEG quality scale for seed frames (2 = near lossless).
pub const SEED_FRAME_JPEG_QUALITY: u8 = 2;

/// Video encoding configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EncodingConfig {
    /// Video codec (e.g., "libx264", "libvpx-vp9")
    pub codec: String,

    /// Encoder speed preset (x264 only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,

    /// Constant Rate Factor (quality, lower is better)
    pub crf: u8,

    /// Audio codec
    pub audio_codec: String,

    /// Audio bitrate
    #[serde(default = "default_audio_bitrate")]
    pub audio_bitrate: String,

    /// Additional FFmpeg output arguments
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_audio_bitrate() -> String {
    DEFAULT_AUDIO_BITRATE.to_string()
}

impl EncodingConfig {
    /// Fixed preset for a quality tier and container.
    ///
    /// High trades encode time and size for quality, low does the opposite.
    pub fn for_quality(quality: Quality, format: OutputFormat) -> Self {
        match format {
            OutputFormat::Mp4 => Self::mp4(quality),
            OutputFormat::Webm => Self::webm(quality),
        }
    }

    fn mp4(quality: Quality) -> Self {
        let (preset, crf, profile, level) = match quality {
            Quality::High => ("medium", 20, "high", Some("4.0")),
            Quality::Medium => ("fast", 23, "main", None),
            Quality::Low => ("veryfast", 28, "baseline", None),
        };

        let mut extra_args = vec!["-profile:v".to_string(), profile.to_string()];
        if let Some(level) = level {
            extra_args.extend(["-level".to_string(), level.to_string()]);
        }
        extra_args.extend([
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
        ]);

        Self {
            codec: MP4_VIDEO_CODEC.to_string(),
            preset: Some(preset.to_string()),
            crf,
            audio_codec: MP4_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            extra_args,
        }
    }

    fn webm(quality: Quality) -> Self {
        let (deadline, cpu_used, crf, bitrate) = match quality {
            Quality::High => ("good", 2, 20, "2M"),
            Quality::Medium => ("good", 3, 25, "1M"),
            Quality::Low => ("realtime", 4, 30, "500k"),
        };

        Self {
            codec: WEBM_VIDEO_CODEC.to_string(),
            preset: None,
            crf,
            audio_codec: WEBM_AUDIO_CODEC.to_string(),
            audio_bitrate: DEFAULT_AUDIO_BITRATE.to_string(),
            extra_args: vec![
                "-deadline".to_string(),
                deadline.to_string(),
                "-cpu-used".to_string(),
                cpu_used.to_string(),
                "-b:v".to_string(),
                bitrate.to_string(),
            ],
        }
    }

    /// Returns a new config with updated CRF.
    pub fn with_crf(mut self, crf: u8) -> Self {
        self.crf = crf;
        self
    }

    /// Convert to FFmpeg output arguments.
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        let mut args = vec!["-c:v".to_string(), self.codec.clone()];

        if let Some(preset) = &self.preset {
            args.extend_from_slice(&["-preset".to_string(), preset.clone()]);
        }

        args.extend_from_slice(&[
            "-crf".to_string(),
            self.crf.to_string(),
            "-c:a".to_string(),
            self.audio_codec.clone(),
            "-b:a".to_string(),
            self.audio_bitrate.clone(),
        ]);

        args.extend(self.extra_args.clone());

        args
    }
}

impl Default for EncodingConfig {
    fn default() -> Self {
        Self::for_quality(Quality::default(), OutputFormat::default())
    }
}
