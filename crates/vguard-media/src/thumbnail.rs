//! Single-frame extraction and thumbnail layout.

use std::path::Path;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;

/// Name of the i-th (0-based) thumbnail.
pub fn thumbnail_file_name(index: usize) -> String {
    format!("thumb_{:03}.jpg", index)
}

/// Evenly spaced timestamps `i * duration / count` for `i` in `0..count`.
pub fn thumbnail_timestamps(duration_secs: f64, count: usize) -> Vec<f64> {
    if count == 0 {
        return Vec::new();
    }
    let interval = duration_secs.max(0.0) / count as f64;
    (0..count).map(|i| i as f64 * interval).collect()
}

/// Write the frame at `timestamp` seconds of `source` to `output` as JPEG.
pub async fn extract_frame(
    runner: &FfmpegRunner,
    source: &Path,
    timestamp: f64,
    output: &Path,
) -> MediaResult<()> {
    if let Some(parent) = output.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let cmd = FfmpegCommand::new(source, output)
        .seek(timestamp)
        .single_frame()
        .quality(2)
        .without_progress();

    runner.run(&cmd).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamps_evenly_spaced() {
        let ts = thumbnail_timestamps(10.0, 10);
        assert_eq!(ts.len(), 10);
        for (i, t) in ts.iter().enumerate() {
            assert!((t - i as f64).abs() < 1e-9);
        }
        assert!(thumbnail_timestamps(10.0, 0).is_empty());
    }

    #[test]
    fn test_thumbnail_names() {
        assert_eq!(thumbnail_file_name(0), "thumb_000.jpg");
        assert_eq!(thumbnail_file_name(9), "thumb_009.jpg");
    }
}
