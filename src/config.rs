use std::path::{Path, PathBuf};

use serde_derive::{Deserialize, Serialize};

use crate::annotate::Palette;
use crate::detector::YoloDetectorConfig;
use crate::error::{Error, Result};
use crate::possession::PlayerBallAssigner;
use crate::tracker::TrackerOptions;
use crate::trackers::{TrackerConfig, TrackerKind};

/// Everything a run needs, loadable from JSON. Missing keys take defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Video file, or a directory of frame images.
    pub input: PathBuf,
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    /// Detections dump replayed in place of a live model.
    pub model: PathBuf,
    pub stub: Option<PathBuf>,
    pub read_from_stub: bool,
    /// Asked for on stdin when not set.
    pub tracker: Option<TrackerKind>,
    pub detector: YoloDetectorConfig,
    pub tracking: TrackerOptions,
    pub trackers: TrackerConfig,
    pub possession: PlayerBallAssigner,
    pub palette: Palette,
    /// TrueType font for id labels and the control panel.
    pub font: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input: PathBuf::from("input_videos/15sec_input_720p.mp4"),
            output_dir: PathBuf::from("output_videos"),
            log_dir: PathBuf::from("logs"),
            model: PathBuf::from("models/best.dets"),
            stub: Some(PathBuf::from("stubs/track_stub.bin")),
            read_from_stub: true,
            tracker: None,
            detector: YoloDetectorConfig::default(),
            tracking: TrackerOptions::default(),
            trackers: TrackerConfig::default(),
            possession: PlayerBallAssigner::default(),
            palette: Palette::default(),
            font: None,
        }
    }
}

impl PipelineConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|err| Error::Config(format!("{}: {}", path.as_ref().display(), err)))?;

        config.check()?;
        Ok(config)
    }

    /// Rejects values no stage can work with.
    pub fn check(&self) -> Result<()> {
        if self.tracking.batch_size == 0 {
            return Err(Error::Config("batch_size must be at least 1".into()));
        }

        if !(0.0..=1.0).contains(&self.detector.confidence_threshold) {
            return Err(Error::Config(format!(
                "confidence_threshold {} is outside 0..=1",
                self.detector.confidence_threshold
            )));
        }

        if self.trackers.deepsort.n_init == 0 {
            return Err(Error::Config("deepsort.n_init must be at least 1".into()));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");
        std::fs::write(
            &path,
            r#"{
                "tracker": "deepsort",
                "read_from_stub": false,
                "trackers": { "deepsort": { "max_age": 30 } },
                "tracking": { "goalkeeper_as_player": true, "corrupt_stub_policy": "fail" }
            }"#,
        )
        .unwrap();

        let config = PipelineConfig::load(&path).unwrap();
        assert_eq!(config.tracker, Some(TrackerKind::DeepSort));
        assert!(!config.read_from_stub);
        assert_eq!(config.trackers.deepsort.max_age, 30);
        assert_eq!(config.trackers.deepsort.n_init, 3);
        assert!(config.tracking.goalkeeper_as_player);
        assert_eq!(config.tracking.batch_size, 20);
        assert_eq!(config.detector.confidence_threshold, 0.6);
    }

    #[test]
    fn rejects_bad_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.json");

        std::fs::write(&path, r#"{ "tracking": { "batch_size": 0 } }"#).unwrap();
        assert!(matches!(PipelineConfig::load(&path), Err(Error::Config(_))));

        std::fs::write(&path, "{ nope").unwrap();
        assert!(matches!(PipelineConfig::load(&path), Err(Error::Config(_))));
    }
}
