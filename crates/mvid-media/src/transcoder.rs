//! Shared, lazily initialized FFmpeg handle.
//!
//! A [`Transcoder`] resolves the FFmpeg/FFprobe binaries on first use and
//! admits exactly one job at a time. Callers queue on [`Transcoder::acquire`];
//! the convenience operations (`concat`, `transcode`, `last_frame`) take the
//! slot themselves.

use std::path::{Path, PathBuf};
use std::time::Instant;
use tempfile::TempDir;
use tokio::sync::{watch, OnceCell, Semaphore, SemaphorePermit};
use tracing::{debug, info, warn};

use mvid_models::EncodingConfig;

use crate::command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
use crate::concat::{concat_command, transcode_command, write_manifest};
use crate::error::{MediaError, MediaResult};
use crate::frame::{last_frame_command, FrameImage};
use crate::probe::probe_video;

/// Resolved binaries.
#[derive(Debug, Clone)]
pub struct Toolchain {
    pub ffmpeg: PathBuf,
    /// Optional; output durations fall back to caller estimates without it
    pub ffprobe: Option<PathBuf>,
}

impl Toolchain {
    /// Locate the binaries in PATH.
    pub fn discover() -> MediaResult<Self> {
        let ffmpeg = check_ffmpeg()?;
        let ffprobe = match check_ffprobe() {
            Ok(path) => Some(path),
            Err(_) => {
                warn!("ffprobe not found; merged durations will be estimated");
                None
            }
        };
        Ok(Self { ffmpeg, ffprobe })
    }
}

/// Transcoder settings.
#[derive(Debug, Clone, Default)]
pub struct TranscoderConfig {
    /// Parent directory for per-job scratch space (system temp when unset)
    pub work_root: Option<PathBuf>,
    /// Per-job FFmpeg timeout; unset means bounded only by cancellation
    pub job_timeout_secs: Option<u64>,
}

/// Output of a concat job.
#[derive(Debug, Clone)]
pub struct ConcatOutput {
    pub bytes: Vec<u8>,
    /// Probed duration of the output, when ffprobe could measure it
    pub duration_seconds: Option<f64>,
}

/// Exclusive right to run one job on a [`Transcoder`].
#[derive(Debug)]
pub struct TranscodeSlot<'a> {
    _permit: SemaphorePermit<'a>,
    tools: &'a Toolchain,
}

impl<'a> TranscodeSlot<'a> {
    pub fn toolchain(&self) -> &'a Toolchain {
        self.tools
    }
}

/// Single-job FFmpeg handle.
#[derive(Debug)]
pub struct Transcoder {
    config: TranscoderConfig,
    tools: OnceCell<Toolchain>,
    slot: Semaphore,
}

impl Transcoder {
    /// Create a handle; binaries are resolved on first use.
    pub fn new(config: TranscoderConfig) -> Self {
        Self {
            config,
            tools: OnceCell::new(),
            slot: Semaphore::new(1),
        }
    }

    /// Create a handle around already resolved binaries.
    pub fn with_toolchain(config: TranscoderConfig, tools: Toolchain) -> Self {
        Self {
            config,
            tools: OnceCell::new_with(Some(tools)),
            slot: Semaphore::new(1),
        }
    }

    /// Whether the binaries have been resolved.
    pub fn is_initialized(&self) -> bool {
        self.tools.initialized()
    }

    /// Whether a job currently holds the slot.
    pub fn is_busy(&self) -> bool {
        self.slot.available_permits() == 0
    }

    /// Resolve the binaries once; later calls reuse the result.
    pub async fn toolchain(&self) -> MediaResult<&Toolchain> {
        self.tools
            .get_or_try_init(|| async {
                let tools = Toolchain::discover()?;
                info!(ffmpeg = %tools.ffmpeg.display(), "Transcoder initialized");
                Ok(tools)
            })
            .await
    }

    /// Wait for the job slot.
    pub async fn acquire(&self) -> MediaResult<TranscodeSlot<'_>> {
        let tools = self.toolchain().await?;
        let permit = self
            .slot
            .acquire()
            .await
            .map_err(|_| MediaError::internal("transcoder slot closed"))?;
        Ok(TranscodeSlot {
            _permit: permit,
            tools,
        })
    }

    fn scratch_dir(&self, prefix: &str) -> MediaResult<TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(prefix);
        let dir = match &self.config.work_root {
            Some(root) => {
                std::fs::create_dir_all(root)?;
                builder.tempdir_in(root)?
            }
            None => builder.tempdir()?,
        };
        Ok(dir)
    }

    fn runner(&self, tools: &Toolchain, cancel: Option<watch::Receiver<bool>>) -> FfmpegRunner {
        let mut runner = FfmpegRunner::new().with_binary(&tools.ffmpeg);
        if let Some(secs) = self.config.job_timeout_secs {
            runner = runner.with_timeout(secs);
        }
        if let Some(cancel) = cancel {
            runner = runner.with_cancel(cancel);
        }
        runner
    }

    /// Concatenate encoded clips in order, re-encoding with `encoding`.
    ///
    /// `on_progress` receives 0-100 for the encode, measured against
    /// `expected_duration_secs`.
    pub async fn concat<F>(
        &self,
        inputs: &[Vec<u8>],
        encoding: &EncodingConfig,
        extension: &str,
        expected_duration_secs: f64,
        cancel: Option<watch::Receiver<bool>>,
        on_progress: F,
    ) -> MediaResult<ConcatOutput>
    where
        F: Fn(u8) + Send + 'static,
    {
        if inputs.is_empty() {
            return Err(MediaError::NoInputs);
        }

        let slot = self.acquire().await?;
        let tools = slot.toolchain();
        let started = Instant::now();
        let dir = self.scratch_dir("mvid-concat-")?;

        let mut paths = Vec::with_capacity(inputs.len());
        for (index, clip) in inputs.iter().enumerate() {
            let path = dir.path().join(format!("seg_{}.mp4", index + 1));
            tokio::fs::write(&path, clip).await?;
            paths.push(path);
        }

        let manifest = write_manifest(dir.path(), &paths).await?;
        let output = dir.path().join(format!("merged.{}", extension));
        let cmd = concat_command(&manifest, &output, encoding);

        let expected_ms = (expected_duration_secs * 1000.0) as i64;
        self.runner(tools, cancel)
            .run_with_progress(&cmd, move |p| on_progress(p.percentage(expected_ms)))
            .await?;

        let bytes = read_output(&cmd).await?;
        let duration_seconds = match &tools.ffprobe {
            Some(ffprobe) => match probe_video(ffprobe, &output).await {
                Ok(info) => Some(info.duration),
                Err(e) => {
                    warn!(error = %e, "Could not probe merged output");
                    None
                }
            },
            None => None,
        };

        info!(
            clips = inputs.len(),
            size_bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Concatenated clips"
        );

        Ok(ConcatOutput {
            bytes,
            duration_seconds,
        })
    }

    /// Re-encode one clip into `extension` with `encoding`.
    pub async fn transcode(
        &self,
        input: &[u8],
        encoding: &EncodingConfig,
        extension: &str,
        cancel: Option<watch::Receiver<bool>>,
    ) -> MediaResult<Vec<u8>> {
        if input.is_empty() {
            return Err(MediaError::NoInputs);
        }

        let slot = self.acquire().await?;
        let dir = self.scratch_dir("mvid-convert-")?;
        let source = dir.path().join("source.mp4");
        tokio::fs::write(&source, input).await?;

        let cmd = transcode_command(&source, dir.path().join(format!("converted.{}", extension)), encoding);
        self.runner(slot.toolchain(), cancel).run(&cmd).await?;

        read_output(&cmd).await
    }

    /// Grab the last frame of a clip given as a local path or remote URL.
    pub async fn last_frame(&self, source: &str) -> MediaResult<FrameImage> {
        let slot = self.acquire().await?;
        let dir = self.scratch_dir("mvid-frame-")?;
        let cmd = last_frame_command(Path::new(source), dir.path().join("last.jpg"));

        self.runner(slot.toolchain(), None).run(&cmd).await?;

        let bytes = read_output(&cmd).await?;
        debug!(source, size_bytes = bytes.len(), "Extracted last frame");
        FrameImage::from_bytes(bytes)
    }
}

async fn read_output(cmd: &FfmpegCommand) -> MediaResult<Vec<u8>> {
    let path = cmd.output_path();
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }
    let bytes = tokio::fs::read(path).await?;
    if bytes.is_empty() {
        return Err(MediaError::ffmpeg_failed("FFmpeg produced an empty file", None, None));
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    fn fake_toolchain() -> Toolchain {
        Toolchain {
            ffmpeg: PathBuf::from("/nonexistent/ffmpeg"),
            ffprobe: None,
        }
    }

    #[tokio::test]
    async fn test_preset_toolchain_is_initialized() {
        let transcoder = Transcoder::with_toolchain(TranscoderConfig::default(), fake_toolchain());
        assert!(transcoder.is_initialized());
        let tools = transcoder.toolchain().await.unwrap();
        assert_eq!(tools.ffmpeg, PathBuf::from("/nonexistent/ffmpeg"));
    }

    #[tokio::test]
    async fn test_single_job_at_a_time() {
        let transcoder = Arc::new(Transcoder::with_toolchain(
            TranscoderConfig::default(),
            fake_toolchain(),
        ));

        let first = transcoder.acquire().await.unwrap();
        assert!(transcoder.is_busy());

        let contender = {
            let transcoder = Arc::clone(&transcoder);
            tokio::spawn(async move {
                let _slot = transcoder.acquire().await.unwrap();
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!contender.is_finished(), "second job must wait for the slot");

        drop(first);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("second job should run once the slot frees")
            .unwrap();
        assert!(!transcoder.is_busy());
    }

    #[tokio::test]
    async fn test_concat_rejects_empty_input() {
        let transcoder = Transcoder::with_toolchain(TranscoderConfig::default(), fake_toolchain());
        let result = transcoder
            .concat(&[], &EncodingConfig::default(), "mp4", 0.0, None, |_| {})
            .await;
        assert!(matches!(result, Err(MediaError::NoInputs)));
        assert!(!transcoder.is_busy());
    }

    #[tokio::test]
    async fn test_missing_binary_fails_job_and_frees_slot() {
        let work = tempfile::tempdir().unwrap();
        let transcoder = Transcoder::with_toolchain(
            TranscoderConfig {
                work_root: Some(work.path().to_path_buf()),
                job_timeout_secs: Some(5),
            },
            fake_toolchain(),
        );

        let result = transcoder
            .transcode(b"not really a video", &EncodingConfig::default(), "mp4", None)
            .await;
        assert!(result.is_err());
        assert!(!transcoder.is_busy());
    }
}
