use serde_derive::{Deserialize, Serialize};

use super::bytetrack::{ByteCore, ReidParams};
use super::{Association, ByteTrackConfig, MultiObjectTracker};
use crate::detection::Detection;
use crate::error::Result;
use crate::frame::Frame;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BotSortConfig {
    pub track_high_thresh: f32,
    pub track_low_thresh: f32,
    pub track_buffer: u32,
    pub match_thresh: f32,
    pub frame_rate: u32,
    /// IoU distance above which appearance is not trusted.
    pub proximity_thresh: f32,
    /// Halved cosine distance above which two crops are different objects.
    pub appearance_thresh: f32,
    /// Weight of the previous feature in the running appearance average.
    pub feature_momentum: f32,
}

impl Default for BotSortConfig {
    fn default() -> Self {
        Self {
            track_high_thresh: 0.25,
            track_low_thresh: 0.1,
            track_buffer: 30,
            match_thresh: 0.8,
            frame_rate: 30,
            proximity_thresh: 0.5,
            appearance_thresh: 0.25,
            feature_momentum: 0.9,
        }
    }
}

/// BoT-SORT: ByteTrack association where the confident stage also compares kits.
#[derive(Debug, Clone)]
pub struct BotSortTracker {
    core: ByteCore,
}

impl BotSortTracker {
    pub fn new(config: BotSortConfig) -> Self {
        let byte = ByteTrackConfig {
            track_activation_threshold: config.track_high_thresh,
            low_confidence_threshold: config.track_low_thresh,
            lost_track_buffer: config.track_buffer,
            minimum_matching_threshold: config.match_thresh,
            frame_rate: config.frame_rate,
        };

        let reid = ReidParams {
            proximity_thresh: config.proximity_thresh,
            appearance_thresh: config.appearance_thresh,
            feature_momentum: config.feature_momentum,
        };

        Self {
            core: ByteCore::new(byte, Some(reid)),
        }
    }
}

impl Default for BotSortTracker {
    fn default() -> Self {
        Self::new(BotSortConfig::default())
    }
}

impl MultiObjectTracker for BotSortTracker {
    fn name(&self) -> &'static str {
        "BoT-SORT"
    }

    fn update(&mut self, frame: &Frame, detections: &[Detection]) -> Result<Vec<Association>> {
        self.core.update(frame, detections)
    }

    fn reset(&mut self) {
        self.core.reset()
    }
}
