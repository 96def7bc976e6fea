//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};

/// Keys FFmpeg writes in `-progress` blocks.
const PROGRESS_KEYS: &[&str] = &[
    "frame",
    "fps",
    "bitrate",
    "total_size",
    "out_time_us",
    "out_time_ms",
    "out_time",
    "dup_frames",
    "drop_frames",
    "speed",
    "progress",
];

/// Progress information from FFmpeg.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Whether a stderr line belongs to a `-progress` block.
    pub fn is_progress_line(&self, line: &str) -> bool {
        line.trim()
            .split_once('=')
            .map(|(key, _)| PROGRESS_KEYS.contains(&key) || key.starts_with("stream_"))
            .unwrap_or(false)
    }

    /// Fold one `key=value` line into the running state.
    ///
    /// Returns a snapshot at the end of every block (`progress=continue|end`).
    pub fn apply_line(&mut self, line: &str) -> Option<FfmpegProgress> {
        let (key, value) = line.trim().split_once('=')?;
        match key {
            "out_time_us" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.out_time_ms = us / 1000;
                }
            }
            // Despite the name, FFmpeg reports microseconds here too
            "out_time_ms" => {
                if let Ok(us) = value.parse::<i64>() {
                    self.out_time_ms = us / 1000;
                }
            }
            "frame" => {
                if let Ok(frame) = value.parse() {
                    self.frame = frame;
                }
            }
            "speed" => {
                if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                    self.speed = speed;
                }
            }
            "progress" => {
                if value == "end" {
                    self.is_complete = true;
                }
                return Some(self.clone());
            }
            _ => {}
        }
        None
    }

    /// Progress as a 0-100 fraction of an expected output duration.
    pub fn percentage(&self, total_duration_ms: i64) -> u8 {
        if self.is_complete {
            return 100;
        }
        if total_duration_ms <= 0 || self.out_time_ms <= 0 {
            return 0;
        }
        let pct = (self.out_time_ms as f64 / total_duration_ms as f64) * 100.0;
        pct.clamp(0.0, 100.0) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_block_parsing() {
        let mut progress = FfmpegProgress::default();

        assert!(progress.apply_line("out_time_us=5000000").is_none());
        assert_eq!(progress.out_time_ms, 5000);

        progress.apply_line("speed=1.5x");
        assert!((progress.speed - 1.5).abs() < 0.01);

        progress.apply_line("speed=N/A");
        assert!((progress.speed - 1.5).abs() < 0.01);

        let snapshot = progress.apply_line("progress=end").unwrap();
        assert!(snapshot.is_complete);
    }

    #[test]
    fn test_progress_line_detection() {
        let progress = FfmpegProgress::default();
        assert!(progress.is_progress_line("frame=120"));
        assert!(progress.is_progress_line("stream_0_0_q=28.0"));
        assert!(!progress.is_progress_line("[concat @ 0x55] Impossible to open 'seg_3.mp4'"));
        assert!(!progress.is_progress_line("Error opening input files: Invalid data"));
    }

    #[test]
    fn test_percentage() {
        let progress = FfmpegProgress {
            out_time_ms: 5000,
            ..Default::default()
        };
        assert_eq!(progress.percentage(10_000), 50);
        assert_eq!(progress.percentage(2_000), 100);
        assert_eq!(progress.percentage(0), 0);
    }
}
