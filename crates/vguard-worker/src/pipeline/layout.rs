//! On-disk layout of per-video artifacts.

use std::path::{Path, PathBuf};
use vguard_models::VideoId;

/// Report file name under the analysis directory.
pub const REPORT_FILE: &str = "threat_analysis.json";

/// Artifact directories of one video: `<output>/<video_id>/{frames,thumbnails,analysis}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(output_dir: &Path, video_id: &VideoId) -> Self {
        Self {
            root: output_dir.join(video_id.as_str()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn frames_dir(&self) -> PathBuf {
        self.root.join("frames")
    }

    pub fn thumbnails_dir(&self) -> PathBuf {
        self.root.join("thumbnails")
    }

    pub fn analysis_dir(&self) -> PathBuf {
        self.root.join("analysis")
    }

    pub fn report_path(&self) -> PathBuf {
        self.analysis_dir().join(REPORT_FILE)
    }

    /// Path of an on-demand frame grab at `timestamp` seconds.
    pub fn snapshot_path(&self, timestamp: f64) -> PathBuf {
        let millis = (timestamp * 1000.0).round() as u64;
        self.thumbnails_dir().join(format!("snapshot_{}ms.jpg", millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_paths() {
        let layout = OutputLayout::new(Path::new("/data"), &VideoId::from("gate-1"));
        assert_eq!(layout.frames_dir(), Path::new("/data/gate-1/frames"));
        assert_eq!(layout.thumbnails_dir(), Path::new("/data/gate-1/thumbnails"));
        assert_eq!(
            layout.report_path(),
            Path::new("/data/gate-1/analysis/threat_analysis.json")
        );
        assert_eq!(
            layout.snapshot_path(2.5),
            Path::new("/data/gate-1/thumbnails/snapshot_2500ms.jpg")
        );
    }
}
