use serde_derive::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::detection::{Detection, ObjectKind};
use crate::detector::{self, ObjectDetector, DEFAULT_BATCH_SIZE};
use crate::error::Result;
use crate::frame::Frame;
use crate::stub::{CorruptStubPolicy, StubLookup, StubStore};
use crate::track::{Category, TrackInfo, Tracks, BALL_ID};
use crate::trackers::MultiObjectTracker;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerOptions {
    pub batch_size: usize,
    /// Track goalkeepers as regular players.
    pub goalkeeper_as_player: bool,
    pub corrupt_stub_policy: CorruptStubPolicy,
}

impl Default for TrackerOptions {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            goalkeeper_as_player: false,
            corrupt_stub_policy: CorruptStubPolicy::default(),
        }
    }
}

/// Turns detector output into per-frame identities through one tracker backend.
pub struct Tracker<D> {
    detector: D,
    backend: Box<dyn MultiObjectTracker>,
    options: TrackerOptions,
}

impl<D: ObjectDetector> Tracker<D> {
    pub fn new(detector: D, backend: Box<dyn MultiObjectTracker>, options: TrackerOptions) -> Self {
        Self {
            detector,
            backend,
            options,
        }
    }

    #[inline]
    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn detect_frames(&mut self, frames: &[Frame]) -> Result<Vec<Vec<Detection>>> {
        detector::detect_frames(&mut self.detector, frames, self.options.batch_size)
    }

    /// Detects and tracks every frame from scratch.
    ///
    /// Players and referees come from the tracker's associations. The ball is
    /// taken from the raw detections under [`BALL_ID`]; frames without a ball
    /// get no entry.
    pub fn build_tracks(&mut self, frames: &[Frame]) -> Result<Tracks> {
        let detections = self.detect_frames(frames)?;
        let names = self.detector.class_names().clone();
        let player_class = names.find_kind(ObjectKind::Player);

        self.backend.reset();
        let mut tracks = Tracks::with_frames(frames.len());

        for (idx, (frame, mut dets)) in frames.iter().zip(detections).enumerate() {
            let before = dets.len();
            dets.retain(|d| d.bbox.is_valid());
            if dets.len() < before {
                debug!(frame = frame.index, dropped = before - dets.len(), "degenerate detections dropped");
            }

            if self.options.goalkeeper_as_player {
                if let Some(player) = player_class {
                    dets.iter_mut()
                        .filter(|d| names.kind(d.class) == ObjectKind::Goalkeeper)
                        .for_each(|d| d.class = player);
                }
            }

            for assoc in self.backend.update(frame, &dets)? {
                let category = Category::of(names.kind(assoc.class), self.options.goalkeeper_as_player);

                if let Some(category @ (Category::Players | Category::Referees)) = category {
                    tracks.category_mut(category)[idx].insert(assoc.track_id, TrackInfo::new(assoc.bbox));
                }
            }

            // the last ball detection of the frame wins
            for det in dets.iter().filter(|d| names.kind(d.class) == ObjectKind::Ball) {
                tracks.ball[idx].insert(BALL_ID, TrackInfo::new(det.bbox));
            }

            debug!(
                frame = frame.index,
                players = tracks.players[idx].len(),
                referees = tracks.referees[idx].len(),
                ball = !tracks.ball[idx].is_empty(),
                "tracked frame"
            );
        }

        Ok(tracks)
    }

    /// Tracks for `frames`, served from `stub` when allowed and usable.
    ///
    /// A snapshot computed over a different frame count is ignored. A corrupt
    /// snapshot is handled per [`TrackerOptions::corrupt_stub_policy`]. Fresh
    /// results are written back to `stub`; a failed write is logged and the
    /// in-memory tracks are still returned.
    pub fn object_tracks(
        &mut self,
        frames: &[Frame],
        stub: Option<&StubStore>,
        read_from_stub: bool,
    ) -> Result<Tracks> {
        if let (true, Some(store)) = (read_from_stub, stub) {
            match store.load() {
                Ok(StubLookup::Hit(snapshot)) if snapshot.matches(frames.len()) => {
                    info!(path = %store.path().display(), "tracks loaded from stub");
                    return Ok(snapshot.tracks);
                }
                Ok(StubLookup::Hit(snapshot)) => warn!(
                    path = %store.path().display(),
                    stub_frames = snapshot.frame_count,
                    frames = frames.len(),
                    "stub is stale, recomputing"
                ),
                Ok(StubLookup::Miss) => debug!(path = %store.path().display(), "no stub"),
                Err(err) => match self.options.corrupt_stub_policy {
                    CorruptStubPolicy::Recompute => {
                        warn!(path = %store.path().display(), %err, "stub unreadable, recomputing")
                    }
                    CorruptStubPolicy::Fail => return Err(err),
                },
            }
        }

        let tracks = self.build_tracks(frames)?;

        if let Some(store) = stub {
            if let Err(err) = store.save(&tracks) {
                warn!(path = %store.path().display(), %err, "failed to save stub");
            }
        }

        Ok(tracks)
    }
}
