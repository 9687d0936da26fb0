//! Stage-by-stage analysis of one frame sequence.
//!
//! Every stage takes the previous stage's [`Tracks`] by value and returns the
//! enriched collection:
//!
//! 1. object tracks, served from the stub when possible
//! 2. ball gap filling
//! 3. anchor positions
//! 4. team assignment
//! 5. ball possession
//! 6. annotation

use std::time::Instant;

use tracing::info;

use crate::annotate::Annotator;
use crate::config::PipelineConfig;
use crate::detector::ObjectDetector;
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::interpolate::{add_position_to_tracks, interpolate_ball_positions};
use crate::possession::PlayerBallAssigner;
use crate::stub::StubStore;
use crate::team::{assign_teams, TeamAssigner};
use crate::track::{Team, Tracks};
use crate::tracker::Tracker;
use crate::trackers::TrackerKind;

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub tracks: Tracks,
    /// Team in control of the ball per frame, carried over while nobody holds it.
    pub team_ball_control: Vec<Option<Team>>,
    /// Annotated copies of the input frames.
    pub frames: Vec<Frame>,
}

pub struct Pipeline<D> {
    tracker: Tracker<D>,
    stub: Option<StubStore>,
    read_from_stub: bool,
    possession: PlayerBallAssigner,
    annotator: Annotator,
}

impl<D: ObjectDetector> Pipeline<D> {
    pub fn new(tracker: Tracker<D>, annotator: Annotator) -> Self {
        Self {
            tracker,
            stub: None,
            read_from_stub: false,
            possession: PlayerBallAssigner::default(),
            annotator,
        }
    }

    /// Wires a detector and the selected backend according to `config`.
    pub fn from_config(detector: D, kind: TrackerKind, config: &PipelineConfig) -> Result<Self> {
        let backend = kind.build(&config.trackers);
        let tracker = Tracker::new(detector, backend, config.tracking.clone());

        let mut annotator = Annotator::new(config.palette.clone());
        if let Some(font) = &config.font {
            annotator = annotator.with_font_file(font)?;
        }

        let mut pipeline = Self::new(tracker, annotator).with_possession(config.possession.clone());
        if let Some(stub) = &config.stub {
            pipeline = pipeline.with_stub(StubStore::new(stub), config.read_from_stub);
        }

        Ok(pipeline)
    }

    pub fn with_stub(mut self, stub: StubStore, read_from_stub: bool) -> Self {
        self.stub = Some(stub);
        self.read_from_stub = read_from_stub;
        self
    }

    pub fn with_possession(mut self, possession: PlayerBallAssigner) -> Self {
        self.possession = possession;
        self
    }

    #[inline]
    pub fn tracker_name(&self) -> &'static str {
        self.tracker.backend_name()
    }

    pub fn run(&mut self, frames: &[Frame]) -> Result<PipelineOutput> {
        if frames.is_empty() {
            return Err(Error::NoFrames);
        }

        let started = Instant::now();
        let tracks = self
            .tracker
            .object_tracks(frames, self.stub.as_ref(), self.read_from_stub)?;
        tracks.validate(frames.len())?;
        info!(frames = frames.len(), tracker = self.tracker_name(), "object tracks ready");

        let tracks = Tracks {
            ball: interpolate_ball_positions(&tracks.ball),
            ..tracks
        };
        let tracks = add_position_to_tracks(tracks);

        // team decisions are scoped to one run
        let mut assigner = TeamAssigner::new();
        let tracks = assign_teams(tracks, frames, &mut assigner);
        info!(fitted = assigner.is_fitted(), "teams assigned");

        let (tracks, team_ball_control) = self.possession.assign_possession(tracks);

        let annotated = self
            .annotator
            .draw_annotations(frames, &tracks, Some(&team_ball_control))?;

        info!(elapsed_ms = started.elapsed().as_millis() as u64, "pipeline finished");

        Ok(PipelineOutput {
            tracks,
            team_ball_control,
            frames: annotated,
        })
    }
}
