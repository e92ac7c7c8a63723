//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};

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
    /// Calculate progress percentage given total duration in milliseconds.
    ///
    /// A completed run reports 100 regardless of the reported output time.
    pub fn percentage(&self, total_duration_ms: i64) -> f64 {
        if self.is_complete {
            return 100.0;
        }
        if total_duration_ms <= 0 {
            return 0.0;
        }
        ((self.out_time_ms as f64 / total_duration_ms as f64) * 100.0).clamp(0.0, 100.0)
    }
}

/// Callback receiving completion percentage (0-100) of a media operation.
pub type ProgressCallback = Box<dyn Fn(f64) + Send + Sync + 'static>;

/// Parse a line of FFmpeg's `-progress` output into `current`.
///
/// Returns a snapshot at the end of each progress block.
pub(crate) fn parse_progress_line(line: &str, current: &mut FfmpegProgress) -> Option<FfmpegProgress> {
    let (key, value) = line.trim().split_once('=')?;

    match key {
        "out_time_ms" | "out_time_us" => {
            // FFmpeg reports microseconds under both keys
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
        }
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
        }
        "speed" => {
            if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                current.speed = speed;
            }
        }
        "progress" => {
            if value == "end" {
                current.is_complete = true;
            }
            return Some(current.clone());
        }
        _ => {}
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_percentage() {
        let progress = FfmpegProgress {
            out_time_ms: 5000,
            ..Default::default()
        };

        assert!((progress.percentage(10000) - 50.0).abs() < 0.01);
        assert!((progress.percentage(2500) - 100.0).abs() < 0.01);
        assert_eq!(progress.percentage(0), 0.0);
    }

    #[test]
    fn test_progress_block_parsing() {
        let mut progress = FfmpegProgress::default();

        assert!(parse_progress_line("frame=12", &mut progress).is_none());
        parse_progress_line("out_time_ms=5000000", &mut progress);
        parse_progress_line("speed=N/A", &mut progress);
        parse_progress_line("speed=1.5x", &mut progress);
        assert_eq!(progress.out_time_ms, 5000);
        assert!((progress.speed - 1.5).abs() < 0.01);

        let snapshot = parse_progress_line("progress=continue", &mut progress).unwrap();
        assert_eq!(snapshot.frame, 12);
        assert!(!snapshot.is_complete);

        let done = parse_progress_line("progress=end", &mut progress).unwrap();
        assert!(done.is_complete);
        assert_eq!(done.percentage(60_000), 100.0);
    }

    #[test]
    fn test_non_progress_lines_ignored() {
        let mut progress = FfmpegProgress::default();
        assert!(parse_progress_line("[mjpeg @ 0x55] something odd", &mut progress).is_none());
        assert_eq!(progress.out_time_ms, 0);
    }
}
