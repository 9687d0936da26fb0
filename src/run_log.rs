//! Timestamped output names and the per-run execution log.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Local};
use tracing::info;

use crate::error::Result;

const STAMP: &str = "%Y-%m-%d__%H-%M";

/// `output_video_<stamp>` for a run started at `at`.
pub fn output_stem(at: &DateTime<Local>) -> String {
    format!("output_video_{}", at.format(STAMP))
}

/// Creates each directory and its parents when missing.
pub fn ensure_dirs<P: AsRef<Path>>(dirs: &[P]) -> Result<()> {
    for dir in dirs {
        fs::create_dir_all(dir.as_ref())?;
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub struct RunLog {
    pub started: DateTime<Local>,
    pub tracker: String,
    pub elapsed: Duration,
}

impl RunLog {
    pub fn new<S: Into<String>>(started: DateTime<Local>, tracker: S, elapsed: Duration) -> Self {
        Self {
            started,
            tracker: tracker.into(),
            elapsed,
        }
    }

    pub fn file_name(&self) -> String {
        format!("run_{}.log", self.started.format("%Y-%m-%d__%H-%M-%S"))
    }

    pub fn render(&self) -> String {
        format!(
            "started: {}\ntracker: {}\nelapsed: {:.3} s\n",
            self.started.to_rfc3339(),
            self.tracker,
            self.elapsed.as_secs_f64()
        )
    }

    /// Writes one log file for a run that used `tracker` and took `elapsed`.
    pub fn write<P: AsRef<Path>>(dir: P, tracker: &str, elapsed: Duration) -> Result<PathBuf> {
        let log = Self::new(Local::now(), tracker, elapsed);
        log.write_to(dir)
    }

    pub fn write_to<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        fs::create_dir_all(dir.as_ref())?;
        let path = dir.as_ref().join(self.file_name());
        fs::write(&path, self.render())?;

        info!(path = %path.display(), tracker = %self.tracker, "run log written");
        Ok(path)
    }
}
