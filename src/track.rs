//! The tracks collection shared by every pipeline stage.
//!
//! Each category holds one [`FrameTracks`] per video frame, so all three
//! sequences always have the frame count as their length. A frame's map only
//! contains the ids seen in that frame.

use std::collections::BTreeMap;
use std::fmt;

use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};
use crate::detection::ObjectKind;
use crate::error::{Error, Result};

pub type TrackId = u32;

/// Anchor point in pixel coordinates.
pub type Point = (f32, f32);

/// The ball is a single object and is always stored under this id.
pub const BALL_ID: TrackId = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Team {
    One,
    Two,
}

impl Team {
    #[inline]
    pub fn number(self) -> u8 {
        match self {
            Team::One => 1,
            Team::Two => 2,
        }
    }

    /// Team from a zero-based cluster index.
    #[inline]
    pub fn from_cluster(index: usize) -> Self {
        if index == 0 {
            Team::One
        } else {
            Team::Two
        }
    }

    #[inline]
    pub fn cluster(self) -> usize {
        self.number() as usize - 1
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub bbox: BBox<Ltrb>,
    #[serde(default)]
    pub position: Option<Point>,
    #[serde(default)]
    pub team: Option<Team>,
    /// RGB, `0.0..=255.0`.
    #[serde(default)]
    pub team_color: Option<[f32; 3]>,
    #[serde(default)]
    pub has_ball: bool,
}

impl TrackInfo {
    pub fn new(bbox: BBox<Ltrb>) -> Self {
        Self {
            bbox,
            position: None,
            team: None,
            team_color: None,
            has_ball: false,
        }
    }
}

pub type FrameTracks = BTreeMap<TrackId, TrackInfo>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Players,
    Referees,
    Ball,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Players, Category::Referees, Category::Ball];

    /// Category a detected object is filed under; `None` for classes the pipeline ignores.
    pub fn of(kind: ObjectKind, goalkeeper_as_player: bool) -> Option<Self> {
        match kind {
            ObjectKind::Player => Some(Category::Players),
            ObjectKind::Goalkeeper if goalkeeper_as_player => Some(Category::Players),
            ObjectKind::Referee => Some(Category::Referees),
            ObjectKind::Ball => Some(Category::Ball),
            ObjectKind::Goalkeeper | ObjectKind::Other => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tracks {
    pub players: Vec<FrameTracks>,
    pub referees: Vec<FrameTracks>,
    pub ball: Vec<FrameTracks>,
}

impl Tracks {
    /// Empty per-frame maps for `frame_count` frames in every category.
    pub fn with_frames(frame_count: usize) -> Self {
        Self {
            players: vec![FrameTracks::new(); frame_count],
            referees: vec![FrameTracks::new(); frame_count],
            ball: vec![FrameTracks::new(); frame_count],
        }
    }

    /// Number of frames covered, taken from the player sequence.
    #[inline]
    pub fn len(&self) -> usize {
        self.players.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn category(&self, category: Category) -> &[FrameTracks] {
        match category {
            Category::Players => &self.players,
            Category::Referees => &self.referees,
            Category::Ball => &self.ball,
        }
    }

    pub fn category_mut(&mut self, category: Category) -> &mut Vec<FrameTracks> {
        match category {
            Category::Players => &mut self.players,
            Category::Referees => &mut self.referees,
            Category::Ball => &mut self.ball,
        }
    }

    /// Ball box in frame `index`, if one is stored.
    #[inline]
    pub fn ball_bbox(&self, index: usize) -> Option<BBox<Ltrb>> {
        self.ball.get(index)?.get(&BALL_ID).map(|t| t.bbox)
    }

    /// Checks that every category has exactly one entry per frame.
    pub fn validate(&self, frame_count: usize) -> Result<()> {
        for category in Category::ALL {
            let actual = self.category(category).len();
            if actual != frame_count {
                return Err(Error::FrameCountMismatch {
                    expected: frame_count,
                    actual,
                });
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_checks_every_category() {
        let mut tracks = Tracks::with_frames(3);
        assert!(tracks.validate(3).is_ok());

        tracks.ball.pop();
        assert!(matches!(
            tracks.validate(3),
            Err(Error::FrameCountMismatch { expected: 3, actual: 2 })
        ));
    }

    #[test]
    fn goalkeepers_are_opt_in() {
        assert_eq!(Category::of(ObjectKind::Goalkeeper, false), None);
        assert_eq!(Category::of(ObjectKind::Goalkeeper, true), Some(Category::Players));
        assert_eq!(Category::of(ObjectKind::Ball, false), Some(Category::Ball));
    }

    #[test]
    fn team_numbers() {
        assert_eq!(Team::from_cluster(0).number(), 1);
        assert_eq!(Team::from_cluster(1), Team::Two);
        assert_eq!(Team::Two.cluster(), 1);
    }
}
