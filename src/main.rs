use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use pitchtrack::run_log::{self, RunLog};
use pitchtrack::{video, Frame, Pipeline, PipelineConfig, ReplayDetector, TrackerKind};

/// Player, referee and ball tracking for match footage.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Video file, or a directory of frame images
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Where the annotated output goes
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Detections dump (`names:` line, then `<frame>:<json>` lines)
    #[arg(short, long)]
    model: Option<PathBuf>,

    /// Track stub used as a cache between runs
    #[arg(long)]
    stub: Option<PathBuf>,

    /// Recompute tracks even when a stub exists
    #[arg(long)]
    no_stub: bool,

    /// 1|2|3 or bytetrack|deepsort|botsort; asked for when omitted
    #[arg(short, long)]
    tracker: Option<String>,

    /// JSON run configuration
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn prompt_tracker() -> anyhow::Result<TrackerKind> {
    let mut out = io::stdout();
    writeln!(out, "Choose one\n1-ByteTrack, 2-DeepSORT, 3-BotSORT")?;
    out.flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;

    Ok(line.parse()?)
}

fn save_output(frames: &[Frame], config: &PipelineConfig, name: &str) -> anyhow::Result<PathBuf> {
    #[cfg(feature = "opencv")]
    {
        if config.input.is_file() {
            let path = config.output_dir.join(format!("{}.mp4", name));
            video::save_video(frames, &path, Some(config.input.as_path()))?;
            return Ok(path);
        }
    }

    let path = config.output_dir.join(name);
    video::write_frames_dir(frames, &path)?;
    Ok(path)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pitchtrack=info")))
        .init();

    let args = Args::parse();
    let started_at = chrono::Local::now();
    let started = Instant::now();

    let mut config = match &args.config {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };

    if let Some(input) = args.input {
        config.input = input;
    }
    if let Some(dir) = args.output_dir {
        config.output_dir = dir;
    }
    if let Some(model) = args.model {
        config.model = model;
    }
    if let Some(stub) = args.stub {
        config.stub = Some(stub);
    }
    if args.no_stub {
        config.read_from_stub = false;
    }
    config.check()?;

    let stub_dir = config.stub.as_deref().and_then(Path::parent).unwrap_or(Path::new("stubs"));
    run_log::ensure_dirs(&[config.output_dir.as_path(), config.log_dir.as_path(), stub_dir])?;

    let kind = match args.tracker.as_deref().map(str::parse::<TrackerKind>).transpose()? {
        Some(kind) => kind,
        None => match config.tracker {
            Some(kind) => kind,
            None => prompt_tracker()?,
        },
    };

    let frames = video::read_frames(&config.input)
        .with_context(|| format!("reading {}", config.input.display()))?;

    let detector = ReplayDetector::open(&config.model)
        .with_context(|| format!("loading detections {}", config.model.display()))?
        .with_confidence_threshold(config.detector.confidence_threshold);

    let mut pipeline = Pipeline::from_config(detector, kind, &config)?;
    let output = pipeline.run(&frames)?;

    let saved = save_output(&output.frames, &config, &run_log::output_stem(&started_at))?;
    info!(path = %saved.display(), "output saved");

    let log = RunLog::new(started_at, kind.label(), started.elapsed()).write_to(&config.log_dir)?;
    info!(path = %log.display(), tracker = %kind, "done");

    Ok(())
}
