//! Multi-object tracker backends behind one update contract.
//!
//! - [`ByteTracker`]: two-stage IoU association over high and low confidence detections
//! - [`DeepSortTracker`]: appearance cascade with Mahalanobis gating, IoU fallback
//! - [`BotSortTracker`]: ByteTrack association fused with appearance distance
//!
//! Each backend keeps its own native track records; [`MultiObjectTracker::update`]
//! reduces them to [`Association`]s so callers never see which one is running.

use std::fmt;
use std::str::FromStr;

use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};
use crate::detection::Detection;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::track::TrackId;

mod botsort;
mod bytetrack;
mod deepsort;

pub use botsort::{BotSortConfig, BotSortTracker};
pub use bytetrack::{ByteTrackConfig, ByteTracker};
pub use deepsort::{DeepSortConfig, DeepSortTracker};

/// One tracked object in the current frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Association {
    pub bbox: BBox<Ltrb>,
    pub class: i32,
    pub track_id: TrackId,
}

pub trait MultiObjectTracker {
    fn name(&self) -> &'static str;

    /// Feeds one frame's detections, returns the identities confirmed in this frame.
    fn update(&mut self, frame: &Frame, detections: &[Detection]) -> Result<Vec<Association>>;

    /// Drops every track and restarts id numbering.
    fn reset(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackerKind {
    ByteTrack,
    DeepSort,
    BotSort,
}

impl TrackerKind {
    pub const ALL: [TrackerKind; 3] = [TrackerKind::ByteTrack, TrackerKind::DeepSort, TrackerKind::BotSort];

    pub fn build(self, config: &TrackerConfig) -> Box<dyn MultiObjectTracker> {
        match self {
            TrackerKind::ByteTrack => Box::new(ByteTracker::new(config.bytetrack.clone())),
            TrackerKind::DeepSort => Box::new(DeepSortTracker::new(config.deepsort.clone())),
            TrackerKind::BotSort => Box::new(BotSortTracker::new(config.botsort.clone())),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            TrackerKind::ByteTrack => "ByteTrack",
            TrackerKind::DeepSort => "DeepSORT",
            TrackerKind::BotSort => "BoT-SORT",
        }
    }
}

impl fmt::Display for TrackerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TrackerKind {
    type Err = Error;

    /// Accepts the menu numbers `1`-`3` or the tracker names.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "bytetrack" | "byte-track" => Ok(TrackerKind::ByteTrack),
            "2" | "deepsort" | "deep-sort" => Ok(TrackerKind::DeepSort),
            "3" | "botsort" | "bot-sort" => Ok(TrackerKind::BotSort),
            _ => Err(Error::InvalidTrackerSelection(s.trim().to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    pub bytetrack: ByteTrackConfig,
    pub deepsort: DeepSortConfig,
    pub botsort: BotSortConfig,
}
