//! FFmpeg CLI wrapper for mechanism video processing.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Progress parsing from `-progress pipe:2`
//! - Cancellation and timeout support via tokio
//! - Last-frame extraction, clip concatenation and re-encoding
//! - A shared single-job [`Transcoder`] handle

pub mod command;
pub mod concat;
pub mod error;
pub mod frame;
pub mod probe;
pub mod progress;
pub mod transcoder;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use frame::FrameImage;
pub use probe::{probe_video, VideoInfo};
pub use progress::FfmpegProgress;
pub use transcoder::{ConcatOutput, Toolchain, TranscodeSlot, Transcoder, TranscoderConfig};
