//! Frame sampling from a video file.

use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::progress::ProgressCallback;

/// File name pattern of sampled frames (1-based, zero padded).
pub const FRAME_PATTERN: &str = "frame_%04d.jpg";

/// Name of the n-th (1-based) sampled frame.
pub fn frame_file_name(n: u32) -> String {
    format!("frame_{:04}.jpg", n)
}

/// Sample `frame_rate` frames per second of `source` into `output_dir`.
///
/// Progress is reported as a percentage of `duration_secs`. Returns the
/// written frames in extraction order.
pub async fn extract_frames(
    runner: &FfmpegRunner,
    source: &Path,
    frame_rate: f64,
    output_dir: &Path,
    duration_secs: f64,
    on_progress: ProgressCallback,
) -> MediaResult<Vec<PathBuf>> {
    tokio::fs::create_dir_all(output_dir).await?;

    let cmd = FfmpegCommand::new(source, output_dir.join(FRAME_PATTERN))
        .video_filter(format!("fps={}", frame_rate))
        .quality(2);

    let total_ms = (duration_secs.max(0.0) * 1000.0) as i64;
    runner
        .run_with_progress(&cmd, move |progress| {
            on_progress(progress.percentage(total_ms));
        })
        .await?;

    let frames = list_frames(output_dir).await?;
    info!(
        source = %source.display(),
        frame_rate,
        frames = frames.len(),
        "Frame extraction completed"
    );
    Ok(frames)
}

/// List sampled frames in a directory, sorted by name.
pub async fn list_frames(dir: &Path) -> MediaResult<Vec<PathBuf>> {
    let mut frames = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_frame = path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|n| n.starts_with("frame_") && n.ends_with(".jpg"))
            .unwrap_or(false);
        if is_frame {
            frames.push(path);
        }
    }

    frames.sort();
    debug!(dir = %dir.display(), count = frames.len(), "Listed frames");
    Ok(frames)
}
