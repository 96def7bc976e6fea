//! Caller-supplied video options: duration class, quality, format, framing.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of segments every duration class is split into.
pub const SEGMENT_COUNT: usize = 4;

/// Total-length option selected by the caller.
///
/// Each class maps to a fixed per-segment split. The extended class is
/// deliberately uneven (three long clips and a shorter closing clip).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum DurationClass {
    /// 20 seconds, four 5 second clips
    #[serde(rename = "20s")]
    #[default]
    Short,
    /// 40 seconds, four 10 second clips
    #[serde(rename = "40s")]
    Standard,
    /// 60 seconds, three 16 second clips and one 12 second clip
    #[serde(rename = "60s")]
    Extended,
}

const SHORT_SPLIT: [u32; SEGMENT_COUNT] = [5, 5, 5, 5];
const STANDARD_SPLIT: [u32; SEGMENT_COUNT] = [10, 10, 10, 10];
const EXTENDED_SPLIT: [u32; SEGMENT_COUNT] = [16, 16, 16, 12];

impl DurationClass {
    pub const ALL: [DurationClass; 3] = [
        DurationClass::Short,
        DurationClass::Standard,
        DurationClass::Extended,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DurationClass::Short => "20s",
            DurationClass::Standard => "40s",
            DurationClass::Extended => "60s",
        }
    }

    /// Fixed per-segment durations in seconds, in segment order.
    pub fn segment_durations(&self) -> [u32; SEGMENT_COUNT] {
        match self {
            DurationClass::Short => SHORT_SPLIT,
            DurationClass::Standard => STANDARD_SPLIT,
            DurationClass::Extended => EXTENDED_SPLIT,
        }
    }

    /// Total target length in seconds.
    pub fn total_seconds(&self) -> u32 {
        self.segment_durations().iter().sum()
    }

    /// Number of segments this class produces.
    pub fn segment_count(&self) -> usize {
        SEGMENT_COUNT
    }

    /// Duration tag sent to the clip generator for a 1-based segment number.
    pub fn duration_tag(&self, segment_number: u32) -> Option<String> {
        let index = segment_number.checked_sub(1)? as usize;
        self.segment_durations()
            .get(index)
            .map(|secs| format!("{}s", secs))
    }
}

impl fmt::Display for DurationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for DurationClass {
    type Err = OptionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "20s" | "20" | "short" => Ok(DurationClass::Short),
            "40s" | "40" | "standard" => Ok(DurationClass::Standard),
            "60s" | "60" | "extended" => Ok(DurationClass::Extended),
            _ => Err(OptionParseError::Duration(s.to_string())),
        }
    }
}

/// Output quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    High,
    #[default]
    Medium,
    Low,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::High => "high",
            Quality::Medium => "medium",
            Quality::Low => "low",
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Quality {
    type Err = OptionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Quality::High),
            "medium" => Ok(Quality::Medium),
            "low" => Ok(Quality::Low),
            _ => Err(OptionParseError::Quality(s.to_string())),
        }
    }
}

/// Container format of a merged video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Mp4,
    Webm,
}

impl OutputFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "mp4",
            OutputFormat::Webm => "webm",
        }
    }

    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            OutputFormat::Mp4 => "video/mp4",
            OutputFormat::Webm => "video/webm",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = OptionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_start_matches('.').to_lowercase().as_str() {
            "mp4" => Ok(OutputFormat::Mp4),
            "webm" => Ok(OutputFormat::Webm),
            _ => Err(OptionParseError::Format(s.to_string())),
        }
    }
}

/// Target resolution requested from the clip generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum Resolution {
    #[serde(rename = "540p")]
    P540,
    #[serde(rename = "720p")]
    #[default]
    P720,
    #[serde(rename = "1080p")]
    P1080,
}

impl Resolution {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::P540 => "540p",
            Resolution::P720 => "720p",
            Resolution::P1080 => "1080p",
        }
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = OptionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "540p" | "540" => Ok(Resolution::P540),
            "720p" | "720" => Ok(Resolution::P720),
            "1080p" | "1080" => Ok(Resolution::P1080),
            _ => Err(OptionParseError::Resolution(s.to_string())),
        }
    }
}

/// Aspect ratio specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct AspectRatio {
    pub width: u32,
    pub height: u32,
}

impl AspectRatio {
    /// Widescreen (16:9)
    pub const LANDSCAPE: AspectRatio = AspectRatio {
        width: 16,
        height: 9,
    };

    /// Portrait (9:16)
    pub const PORTRAIT: AspectRatio = AspectRatio {
        width: 9,
        height: 16,
    };

    /// Square (1:1)
    pub const SQUARE: AspectRatio = AspectRatio {
        width: 1,
        height: 1,
    };

    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn as_f64(&self) -> f64 {
        self.width as f64 / self.height as f64
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.width, self.height)
    }
}

impl FromStr for AspectRatio {
    type Err = OptionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .split_once(':')
            .ok_or_else(|| OptionParseError::AspectRatio(s.to_string()))?;

        let width: u32 = w
            .trim()
            .parse()
            .map_err(|_| OptionParseError::AspectRatio(s.to_string()))?;
        let height: u32 = h
            .trim()
            .parse()
            .map_err(|_| OptionParseError::AspectRatio(s.to_string()))?;

        if width == 0 || height == 0 {
            return Err(OptionParseError::AspectRatio(s.to_string()));
        }

        Ok(AspectRatio { width, height })
    }
}

impl Default for AspectRatio {
    fn default() -> Self {
        Self::LANDSCAPE
    }
}

/// Options provided once per run. Read-only through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
pub struct VideoOptions {
    #[serde(default)]
    pub duration: DurationClass,
    #[serde(default)]
    pub quality: Quality,
    #[serde(default)]
    pub aspect_ratio: AspectRatio,
    #[serde(default)]
    pub resolution: Resolution,
}

impl VideoOptions {
    pub fn new(duration: DurationClass) -> Self {
        Self {
            duration,
            ..Default::default()
        }
    }

    pub fn with_quality(mut self, quality: Quality) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: AspectRatio) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionParseError {
    #[error("Unknown duration class: {0}, expected 20s, 40s or 60s")]
    Duration(String),
    #[error("Unknown quality: {0}, expected high, medium or low")]
    Quality(String),
    #[error("Unknown output format: {0}")]
    Format(String),
    #[error("Unknown resolution: {0}")]
    Resolution(String),
    #[error("Invalid aspect ratio: {0}, expected 'W:H'")]
    AspectRatio(String),
}
