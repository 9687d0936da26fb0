use serde_derive::{Deserialize, Serialize};
use tracing::trace;

use super::{Association, MultiObjectTracker};
use crate::appearance::{self, Feature};
use crate::assignment::{assign, fuse_score};
use crate::bbox::{BBox, Ltrb};
use crate::detection::Detection;
use crate::error::Result;
use crate::frame::Frame;
use crate::kalman::{KalmanFilter, KalmanState};
use crate::track::TrackId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ByteTrackConfig {
    /// Detections above this confidence take part in the first association.
    pub track_activation_threshold: f32,
    /// Detections at or below this confidence are ignored.
    pub low_confidence_threshold: f32,
    /// Frames a lost track is kept for re-association, at 30 fps.
    pub lost_track_buffer: u32,
    /// Maximum fused IoU cost of a first-stage match.
    pub minimum_matching_threshold: f32,
    pub frame_rate: u32,
}

impl Default for ByteTrackConfig {
    fn default() -> Self {
        Self {
            track_activation_threshold: 0.25,
            low_confidence_threshold: 0.1,
            lost_track_buffer: 30,
            minimum_matching_threshold: 0.8,
            frame_rate: 30,
        }
    }
}

impl ByteTrackConfig {
    #[inline]
    fn max_time_lost(&self) -> u32 {
        (self.frame_rate as f32 / 30.0 * self.lost_track_buffer as f32) as u32
    }

    /// New tracks need a little more confidence than association does.
    #[inline]
    fn new_track_threshold(&self) -> f32 {
        self.track_activation_threshold + 0.1
    }
}

/// Appearance term mixed into the first association stage.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ReidParams {
    pub proximity_thresh: f32,
    pub appearance_thresh: f32,
    pub feature_momentum: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TrackState {
    Tracked,
    Lost,
}

#[derive(Debug, Clone)]
struct STrack {
    /// Zero until the track is activated.
    id: TrackId,
    state: TrackState,
    activated: bool,
    kalman: KalmanState,
    bbox: BBox<Ltrb>,
    class: i32,
    score: f32,
    tracklet_len: u32,
    start_frame: u32,
    frame_id: u32,
    feature: Option<Feature>,
}

impl STrack {
    #[inline]
    fn predicted(&self) -> BBox<Ltrb> {
        self.kalman.bbox().as_ltrb()
    }

    #[inline]
    fn age(&self, frame_id: u32) -> u32 {
        frame_id - self.start_frame
    }
}

/// ByteTrack state machine; BoT-SORT reuses it with appearance enabled.
#[derive(Debug, Clone)]
pub(crate) struct ByteCore {
    config: ByteTrackConfig,
    reid: Option<ReidParams>,
    kf: KalmanFilter,
    tracked: Vec<STrack>,
    lost: Vec<STrack>,
    frame_id: u32,
    next_id: TrackId,
}

impl ByteCore {
    pub(crate) fn new(config: ByteTrackConfig, reid: Option<ReidParams>) -> Self {
        Self {
            config,
            reid,
            kf: KalmanFilter::new(),
            tracked: Vec::new(),
            lost: Vec::new(),
            frame_id: 0,
            next_id: 1,
        }
    }

    pub(crate) fn reset(&mut self) {
        self.tracked.clear();
        self.lost.clear();
        self.frame_id = 0;
        self.next_id = 1;
    }

    #[inline]
    fn iou_cost(track: &STrack, det: &Detection) -> f32 {
        1.0 - track.predicted().iou(&det.bbox)
    }

    /// Cost used when matching confident detections: IoU fused with score, and
    /// with appearance when re-identification is on.
    fn first_stage_cost(&self, track: &STrack, det: &Detection, feature: Option<&Feature>) -> f32 {
        let iou = Self::iou_cost(track, det);
        let fused = fuse_score(iou, det.confidence);

        let Some(reid) = &self.reid else {
            return fused;
        };

        let emb = match (track.feature.as_ref(), feature) {
            (Some(a), Some(b)) => appearance::cosine_distance(a, b) / 2.0,
            _ => 1.0,
        };

        let emb = if emb > reid.appearance_thresh || iou > reid.proximity_thresh {
            1.0
        } else {
            emb
        };

        fused.min(emb)
    }

    fn apply(&self, track: &mut STrack, det: &Detection, feature: Option<&Feature>) -> Result<()> {
        self.kf.update(&mut track.kalman, &det.bbox.as_xyah())?;

        track.bbox = det.bbox;
        track.class = det.class;
        track.score = det.confidence;
        track.frame_id = self.frame_id;
        track.tracklet_len += 1;
        track.state = TrackState::Tracked;

        if let (Some(reid), Some(f)) = (&self.reid, feature) {
            match track.feature.as_mut() {
                Some(prev) => appearance::smooth(prev, f, reid.feature_momentum),
                None => track.feature = Some(f.clone()),
            }
        }

        Ok(())
    }

    fn activate(&mut self, track: &mut STrack) {
        track.activated = true;
        if track.id == 0 {
            track.id = self.next_id;
            self.next_id += 1;
        }
    }

    pub(crate) fn update(&mut self, frame: &Frame, detections: &[Detection]) -> Result<Vec<Association>> {
        self.frame_id += 1;
        let cfg = self.config.clone();

        let mut high = Vec::new();
        let mut low = Vec::new();
        for (idx, det) in detections.iter().enumerate() {
            if det.confidence > cfg.track_activation_threshold {
                high.push(idx);
            } else if det.confidence > cfg.low_confidence_threshold {
                low.push(idx);
            }
        }

        let features: Vec<Option<Feature>> = detections
            .iter()
            .map(|d| {
                self.reid
                    .as_ref()
                    .and_then(|_| appearance::embed(frame, &d.bbox))
            })
            .collect();

        let (mut pool, mut unconfirmed): (Vec<STrack>, Vec<STrack>) =
            std::mem::take(&mut self.tracked)
                .into_iter()
                .partition(|t| t.activated);
        pool.append(&mut self.lost);

        for t in pool.iter_mut() {
            if t.state != TrackState::Tracked {
                t.kalman.mean[7] = 0.0;
            }
            self.kf.predict(&mut t.kalman);
        }

        // First association: confident detections against every known track.
        let rows: Vec<usize> = (0..pool.len()).collect();
        let first = assign(&rows, &high, cfg.minimum_matching_threshold, |r, c| {
            self.first_stage_cost(&pool[r], &detections[c], features[c].as_ref())
        })?;

        for &(r, c) in &first.matched {
            self.apply(&mut pool[r], &detections[c], features[c].as_ref())?;
        }

        // Second association: leftover weak detections keep tracked objects alive.
        let still_tracked: Vec<usize> = first
            .unmatched_rows
            .iter()
            .copied()
            .filter(|&r| pool[r].state == TrackState::Tracked)
            .collect();

        let second = assign(&still_tracked, &low, 0.5, |r, c| Self::iou_cost(&pool[r], &detections[c]))?;

        for &(r, c) in &second.matched {
            self.apply(&mut pool[r], &detections[c], features[c].as_ref())?;
        }

        for &r in &second.unmatched_rows {
            pool[r].state = TrackState::Lost;
        }

        // Tracks seen only once get one more chance with the remaining confident detections.
        let rows: Vec<usize> = (0..unconfirmed.len()).collect();
        let third = assign(&rows, &first.unmatched_cols, 0.7, |r, c| {
            self.first_stage_cost(&unconfirmed[r], &detections[c], features[c].as_ref())
        })?;

        let mut confirmed = Vec::with_capacity(third.matched.len());
        for &(r, c) in &third.matched {
            let mut track = unconfirmed[r].clone();
            self.apply(&mut track, &detections[c], features[c].as_ref())?;
            self.activate(&mut track);
            confirmed.push(track);
        }
        unconfirmed.clear();

        let new_threshold = cfg.new_track_threshold();
        let mut fresh = Vec::new();
        for &c in &third.unmatched_cols {
            let det = &detections[c];
            if det.confidence < new_threshold {
                continue;
            }

            let mut track = STrack {
                id: 0,
                state: TrackState::Tracked,
                activated: false,
                kalman: self.kf.initiate(&det.bbox.as_xyah()),
                bbox: det.bbox,
                class: det.class,
                score: det.confidence,
                tracklet_len: 0,
                start_frame: self.frame_id,
                frame_id: self.frame_id,
                feature: features[c].clone(),
            };

            if self.frame_id == 1 {
                self.activate(&mut track);
            }
            fresh.push(track);
        }

        let max_time_lost = cfg.max_time_lost();
        let frame_id = self.frame_id;

        let (tracked, lost): (Vec<STrack>, Vec<STrack>) = pool
            .into_iter()
            .partition(|t| t.state == TrackState::Tracked);

        self.tracked = tracked;
        self.tracked.extend(confirmed);
        self.tracked.extend(fresh);
        self.lost = lost
            .into_iter()
            .filter(|t| frame_id - t.frame_id <= max_time_lost)
            .collect();

        self.remove_duplicates();

        let out: Vec<Association> = self
            .tracked
            .iter()
            .filter(|t| t.activated && t.frame_id == frame_id)
            .map(|t| Association {
                bbox: t.bbox,
                class: t.class,
                track_id: t.id,
            })
            .collect();

        trace!(
            frame = frame_id,
            tracked = self.tracked.len(),
            lost = self.lost.len(),
            reported = out.len(),
            "bytetrack step"
        );

        Ok(out)
    }

    /// A lost track that overlaps a tracked one almost entirely is the same object; keep the older.
    fn remove_duplicates(&mut self) {
        let frame_id = self.frame_id;
        let mut drop_tracked = vec![false; self.tracked.len()];
        let mut drop_lost = vec![false; self.lost.len()];

        for (i, t) in self.tracked.iter().enumerate() {
            for (j, l) in self.lost.iter().enumerate() {
                if 1.0 - t.predicted().iou(&l.predicted()) < 0.15 {
                    if t.age(frame_id) > l.age(frame_id) {
                        drop_lost[j] = true;
                    } else {
                        drop_tracked[i] = true;
                    }
                }
            }
        }

        let mut keep = drop_tracked.into_iter().map(|d| !d);
        self.tracked.retain(|_| keep.next().unwrap_or(true));
        let mut keep = drop_lost.into_iter().map(|d| !d);
        self.lost.retain(|_| keep.next().unwrap_or(true));
    }
}

/// ByteTrack: boxes only, no appearance.
#[derive(Debug, Clone)]
pub struct ByteTracker {
    core: ByteCore,
}

impl ByteTracker {
    pub fn new(config: ByteTrackConfig) -> Self {
        Self {
            core: ByteCore::new(config, None),
        }
    }
}

impl Default for ByteTracker {
    fn default() -> Self {
        Self::new(ByteTrackConfig::default())
    }
}

impl MultiObjectTracker for ByteTracker {
    fn name(&self) -> &'static str {
        "ByteTrack"
    }

    fn update(&mut self, frame: &Frame, detections: &[Detection]) -> Result<Vec<Association>> {
        self.core.update(frame, detections)
    }

    fn reset(&mut self) {
        self.core.reset()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trackers::tests::pitch;

    fn det(x: f32, conf: f32) -> Detection {
        Detection::new(BBox::ltrb(x, 100.0, x + 30.0, 180.0), conf, 2)
    }

    #[test]
    fn low_confidence_keeps_track_alive() {
        let frame = pitch(640, 360);
        let mut tracker = ByteTracker::default();

        let first = tracker.update(&frame, &[det(100.0, 0.9)]).unwrap();
        assert_eq!(first.len(), 1);
        let id = first[0].track_id;

        // occluded: detector is unsure, but the box still lines up
        let weak = tracker.update(&frame, &[det(102.0, 0.2)]).unwrap();
        assert_eq!(weak.len(), 1);
        assert_eq!(weak[0].track_id, id);

        let back = tracker.update(&frame, &[det(104.0, 0.9)]).unwrap();
        assert_eq!(back[0].track_id, id);
    }

    #[test]
    fn lost_track_is_recovered_within_buffer() {
        let frame = pitch(640, 360);
        let mut tracker = ByteTracker::default();

        let id = tracker.update(&frame, &[det(100.0, 0.9)]).unwrap()[0].track_id;
        tracker.update(&frame, &[det(100.0, 0.9)]).unwrap();

        for _ in 0..5 {
            assert!(tracker.update(&frame, &[]).unwrap().is_empty());
        }

        let back = tracker.update(&frame, &[det(100.0, 0.9)]).unwrap();
        assert_eq!(back.len(), 1);
        assert_eq!(back[0].track_id, id);
    }

    #[test]
    fn late_objects_need_a_second_sighting() {
        let frame = pitch(640, 360);
        let mut tracker = ByteTracker::default();

        tracker.update(&frame, &[det(100.0, 0.9)]).unwrap();

        let out = tracker.update(&frame, &[det(100.0, 0.9), det(400.0, 0.9)]).unwrap();
        assert_eq!(out.len(), 1);

        let out = tracker.update(&frame, &[det(100.0, 0.9), det(401.0, 0.9)]).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out.iter().map(|a| a.track_id).max(), Some(2));
    }
}
