//! Detection dumps: one `<frame>:<json array>` line per frame, preceded by a
//! `names:<json array>` line with the detector's class table.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::detection::{ClassNames, Detection};
use crate::detector::ObjectDetector;
use crate::error::{Error, Result};
use crate::frame::Frame;

const NAMES_KEY: &str = "names";

/// Replays previously dumped detections instead of running a model.
pub struct ReplayDetector {
    names: ClassNames,
    detections: HashMap<usize, Vec<Detection>>,
    confidence_threshold: f32,
}

impl ReplayDetector {
    pub fn new(names: ClassNames, detections: HashMap<usize, Vec<Detection>>) -> Self {
        Self {
            names,
            detections,
            confidence_threshold: 0.0,
        }
    }

    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let reader = BufReader::new(File::open(path)?);
        let mut names = None;
        let mut detections = HashMap::new();

        let malformed =
            |lineno: usize, what: String| Error::Detector(format!("{}:{}: {}", path.display(), lineno + 1, what));

        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            let (key, vector) = line
                .split_once(':')
                .ok_or_else(|| malformed(lineno, "expected `<frame>:<json>`".into()))?;

            if key.trim() == NAMES_KEY {
                let list: Vec<String> =
                    serde_json::from_str(vector).map_err(|err| malformed(lineno, format!("class names: {}", err)))?;
                names = Some(ClassNames::new(list));
                continue;
            }

            let idx: usize = key
                .trim()
                .parse()
                .map_err(|_| malformed(lineno, format!("bad frame index `{}`", key.trim())))?;
            let dets: Vec<Detection> =
                serde_json::from_str(vector).map_err(|err| malformed(lineno, format!("frame {}: {}", idx, err)))?;

            if detections.insert(idx, dets).is_some() {
                return Err(malformed(lineno, format!("frame {} listed twice", idx)));
            }
        }

        let names = names.ok_or_else(|| {
            Error::Detector(format!(
                "detections dump {} has no `{}:` line",
                path.display(),
                NAMES_KEY
            ))
        })?;

        Ok(Self::new(names, detections))
    }
}

impl ObjectDetector for ReplayDetector {
    fn class_names(&self) -> &ClassNames {
        &self.names
    }

    fn detect(&mut self, frames: &[Frame]) -> Result<Vec<Vec<Detection>>> {
        Ok(frames
            .iter()
            .map(|f| {
                self.detections
                    .get(&f.index)
                    .map(|dets| {
                        dets.iter()
                            .filter(|d| d.confidence >= self.confidence_threshold)
                            .copied()
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect())
    }
}

/// Writes a dump readable by [`ReplayDetector::open`].
pub fn dump_detections<P: AsRef<Path>>(
    path: P,
    names: &ClassNames,
    detections: &[Vec<Detection>],
) -> Result<()> {
    let mut out = BufWriter::new(File::create(path)?);

    let list: Vec<&str> = (0..names.len() as i32).filter_map(|i| names.name(i)).collect();
    writeln!(out, "{}:{}", NAMES_KEY, serde_json::to_string(&list)?)?;

    for (idx, dets) in detections.iter().enumerate() {
        writeln!(out, "{}:{}", idx, serde_json::to_string(dets)?)?;
    }

    out.flush()?;
    Ok(())
}
