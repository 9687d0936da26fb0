use serde_derive::{Deserialize, Serialize};
use tracing::trace;

use super::{Association, MultiObjectTracker};
use crate::appearance::{self, Feature};
use crate::assignment::{assign, Matches};
use crate::bbox::{BBox, Ltrb, Xyah};
use crate::circular_queue::CircularQueue;
use crate::detection::Detection;
use crate::error::Result;
use crate::frame::Frame;
use crate::kalman::{KalmanFilter, KalmanState, CHI2INV95_4};
use crate::track::TrackId;

/// Cost for pairs ruled out by gating.
const INFTY_COST: f32 = 1e5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeepSortConfig {
    /// Frames a track may go unmatched before it is deleted.
    pub max_age: u32,
    /// Consecutive hits before a tentative track is confirmed.
    pub n_init: u32,
    pub max_cosine_distance: f32,
    pub max_iou_distance: f32,
    /// Appearance samples kept per track.
    pub nn_budget: usize,
}

impl Default for DeepSortConfig {
    fn default() -> Self {
        Self {
            max_age: 60,
            n_init: 3,
            max_cosine_distance: 0.2,
            max_iou_distance: 0.7,
            nn_budget: 100,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackState {
    Tentative,
    Confirmed,
    Deleted,
}

#[derive(Debug, Clone)]
struct Track {
    id: TrackId,
    state: TrackState,
    kalman: KalmanState,
    class: i32,
    hits: u32,
    time_since_update: u32,
    features: CircularQueue<Feature>,
}

impl Track {
    #[inline]
    fn predicted(&self) -> BBox<Ltrb> {
        self.kalman.bbox().as_ltrb()
    }

    /// Smallest cosine distance between the detection and any stored sample.
    fn appearance_cost(&self, feature: Option<&Feature>) -> f32 {
        let Some(feature) = feature else {
            return INFTY_COST;
        };

        self.features
            .iter()
            .map(|f| appearance::cosine_distance(f, feature))
            .fold(INFTY_COST, f32::min)
    }
}

/// DeepSORT with a colour-histogram embedder standing in for the CNN.
#[derive(Debug, Clone)]
pub struct DeepSortTracker {
    config: DeepSortConfig,
    kf: KalmanFilter,
    tracks: Vec<Track>,
    next_id: TrackId,
}

impl DeepSortTracker {
    pub fn new(config: DeepSortConfig) -> Self {
        Self {
            config,
            kf: KalmanFilter::new(),
            tracks: Vec::new(),
            next_id: 1,
        }
    }

    /// Appearance matching, most recently updated tracks first.
    fn matching_cascade(
        &self,
        detections: &[Detection],
        measurements: &[BBox<Xyah>],
        features: &[Option<Feature>],
        confirmed: &[usize],
    ) -> Result<Matches> {
        let mut unmatched_cols: Vec<usize> = (0..detections.len()).collect();
        let mut matched = Vec::new();

        for level in 0..self.config.max_age {
            if unmatched_cols.is_empty() {
                break;
            }

            let rows: Vec<usize> = confirmed
                .iter()
                .copied()
                .filter(|&r| self.tracks[r].time_since_update == level + 1)
                .collect();

            if rows.is_empty() {
                continue;
            }

            let gates: Vec<Vec<f32>> = rows
                .iter()
                .map(|&r| self.kf.gating_distance(&self.tracks[r].kalman, measurements))
                .collect();

            let m = assign(&rows, &unmatched_cols, self.config.max_cosine_distance, |r, c| {
                let gate_row = rows.iter().position(|&x| x == r).unwrap_or(0);
                if gates[gate_row][c] > CHI2INV95_4 {
                    INFTY_COST
                } else {
                    self.tracks[r].appearance_cost(features[c].as_ref())
                }
            })?;

            matched.extend(m.matched);
            unmatched_cols = m.unmatched_cols;
        }

        let unmatched_rows = confirmed
            .iter()
            .copied()
            .filter(|r| !matched.iter().any(|(mr, _)| mr == r))
            .collect();

        Ok(Matches {
            matched,
            unmatched_rows,
            unmatched_cols,
        })
    }

    fn initiate(&mut self, det: &Detection, feature: Option<Feature>) {
        let mut features = CircularQueue::with_capacity(self.config.nn_budget);
        if let Some(f) = feature {
            features.push(f);
        }

        self.tracks.push(Track {
            id: self.next_id,
            state: TrackState::Tentative,
            kalman: self.kf.initiate(&det.bbox.as_xyah()),
            class: det.class,
            hits: 1,
            time_since_update: 0,
            features,
        });
        self.next_id += 1;
    }
}

impl Default for DeepSortTracker {
    fn default() -> Self {
        Self::new(DeepSortConfig::default())
    }
}

impl MultiObjectTracker for DeepSortTracker {
    fn name(&self) -> &'static str {
        "DeepSORT"
    }

    fn update(&mut self, frame: &Frame, detections: &[Detection]) -> Result<Vec<Association>> {
        for t in self.tracks.iter_mut() {
            self.kf.predict(&mut t.kalman);
            t.time_since_update += 1;
        }

        let measurements: Vec<BBox<Xyah>> = detections.iter().map(|d| d.bbox.as_xyah()).collect();
        let features: Vec<Option<Feature>> = detections
            .iter()
            .map(|d| appearance::embed(frame, &d.bbox))
            .collect();

        let (confirmed, unconfirmed): (Vec<usize>, Vec<usize>) =
            (0..self.tracks.len()).partition(|&i| self.tracks[i].state == TrackState::Confirmed);

        let cascade = self.matching_cascade(detections, &measurements, &features, &confirmed)?;

        // Young and just-missed tracks fall back to box overlap.
        let (iou_rows, stale): (Vec<usize>, Vec<usize>) = unconfirmed
            .iter()
            .copied()
            .chain(cascade.unmatched_rows.iter().copied())
            .partition(|&r| {
                self.tracks[r].state != TrackState::Confirmed || self.tracks[r].time_since_update == 1
            });

        let by_iou = assign(
            &iou_rows,
            &cascade.unmatched_cols,
            self.config.max_iou_distance,
            |r, c| 1.0 - self.tracks[r].predicted().iou(&detections[c].bbox),
        )?;

        for &(r, c) in cascade.matched.iter().chain(by_iou.matched.iter()) {
            let n_init = self.config.n_init;
            let track = &mut self.tracks[r];

            self.kf.update(&mut track.kalman, &measurements[c])?;
            track.class = detections[c].class;
            track.hits += 1;
            track.time_since_update = 0;
            if let Some(f) = &features[c] {
                track.features.push(f.clone());
            }
            if track.state == TrackState::Tentative && track.hits >= n_init {
                track.state = TrackState::Confirmed;
            }
        }

        for &r in by_iou.unmatched_rows.iter().chain(stale.iter()) {
            let track = &mut self.tracks[r];
            if track.state == TrackState::Tentative || track.time_since_update > self.config.max_age {
                track.state = TrackState::Deleted;
            }
        }

        for &c in &by_iou.unmatched_cols {
            self.initiate(&detections[c], features[c].clone());
        }

        self.tracks.retain(|t| t.state != TrackState::Deleted);

        let out: Vec<Association> = self
            .tracks
            .iter()
            .filter(|t| t.state == TrackState::Confirmed && t.time_since_update == 0)
            .map(|t| Association {
                bbox: t.predicted(),
                class: t.class,
                track_id: t.id,
            })
            .collect();

        trace!(tracks = self.tracks.len(), reported = out.len(), "deepsort step");

        Ok(out)
    }

    fn reset(&mut self) {
        self.tracks.clear();
        self.next_id = 1;
    }
}
