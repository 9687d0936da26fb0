pub mod annotate;
pub mod appearance;
pub mod assignment;
pub mod bbox;
pub mod circular_queue;
pub mod config;
pub mod detection;
pub mod detector;
pub mod error;
pub mod frame;
pub mod interpolate;
pub mod kalman;
pub mod kmeans;
pub mod pipeline;
pub mod possession;
pub mod replay;
pub mod run_log;
pub mod stub;
pub mod team;
pub mod track;
pub mod tracker;
pub mod trackers;
pub mod video;

pub use annotate::{Annotator, Palette};
pub use bbox::{BBox, Ltrb, Xyah};
pub use config::PipelineConfig;
pub use detection::{ClassNames, Detection, ObjectKind};
pub use detector::{detect_frames, InferenceModel, ObjectDetector, YoloDetector, YoloDetectorConfig};
pub use error::{Error, Result};
pub use frame::Frame;
pub use pipeline::{Pipeline, PipelineOutput};
pub use replay::ReplayDetector;
pub use stub::{CorruptStubPolicy, StubLookup, StubSnapshot, StubStore};
pub use team::TeamAssigner;
pub use track::{FrameTracks, Team, TrackId, TrackInfo, Tracks, BALL_ID};
pub use tracker::{Tracker, TrackerOptions};
pub use trackers::{MultiObjectTracker, TrackerConfig, TrackerKind};
