//! On-disk cache of computed tracks.
//!
//! A snapshot is a small header followed by the bincode-encoded [`Tracks`]:
//!
//! ```text
//! b"PTRK" | version: u16 LE | frame_count: u64 LE | payload
//! ```
//!
//! The store never decides whether a snapshot is still valid for the current
//! video. [`StubSnapshot::matches`] is exposed so the caller can.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_derive::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::track::Tracks;

const MAGIC: &[u8; 4] = b"PTRK";
const VERSION: u16 = 1;
const HEADER_LEN: usize = 4 + 2 + 8;

/// What to do when a snapshot exists but cannot be decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorruptStubPolicy {
    /// Log the failure and compute tracks from scratch.
    #[default]
    Recompute,
    /// Abort the run with the decoding error.
    Fail,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StubSnapshot {
    pub frame_count: usize,
    pub tracks: Tracks,
}

impl StubSnapshot {
    /// `true` when the snapshot was computed over `frame_count` frames.
    #[inline]
    pub fn matches(&self, frame_count: usize) -> bool {
        self.frame_count == frame_count && self.tracks.validate(frame_count).is_ok()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StubLookup {
    Hit(StubSnapshot),
    Miss,
}

#[derive(Debug, Clone)]
pub struct StubStore {
    path: PathBuf,
}

impl StubStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Reads the snapshot. A missing file is a [`StubLookup::Miss`], an
    /// unreadable one is [`Error::StubCorrupt`].
    pub fn load(&self) -> Result<StubLookup> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(StubLookup::Miss),
            Err(source) => {
                return Err(Error::StubIo {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let snapshot = self.decode(&bytes)?;
        debug!(path = %self.path.display(), frames = snapshot.frame_count, "loaded stub");

        Ok(StubLookup::Hit(snapshot))
    }

    /// Writes `tracks` to a sibling temp file and renames it over the stub,
    /// so an interrupted write never leaves a truncated snapshot behind.
    pub fn save(&self, tracks: &Tracks) -> Result<()> {
        let payload = bincode::serialize(tracks)?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&VERSION.to_le_bytes());
        bytes.extend_from_slice(&(tracks.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&payload);

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| self.io_error(source))?;
        }

        let temp = self.temp_path();
        let written = fs::File::create(&temp).and_then(|mut file| {
            file.write_all(&bytes)?;
            file.sync_all()
        });

        if let Err(source) = written.and_then(|_| fs::rename(&temp, &self.path)) {
            let _ = fs::remove_file(&temp);
            return Err(self.io_error(source));
        }

        debug!(path = %self.path.display(), bytes = bytes.len(), "saved stub");
        Ok(())
    }

    fn decode(&self, bytes: &[u8]) -> Result<StubSnapshot> {
        if bytes.len() < HEADER_LEN {
            return Err(self.corrupt("truncated header"));
        }

        let (header, payload) = bytes.split_at(HEADER_LEN);
        if &header[..4] != MAGIC {
            return Err(self.corrupt("bad magic"));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(self.corrupt(format!("unsupported version {}", version)));
        }

        let mut count = [0u8; 8];
        count.copy_from_slice(&header[6..]);
        let frame_count = u64::from_le_bytes(count) as usize;

        let tracks: Tracks =
            bincode::deserialize(payload).map_err(|err| self.corrupt(err.to_string()))?;

        Ok(StubSnapshot { frame_count, tracks })
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn corrupt<S: Into<String>>(&self, reason: S) -> Error {
        Error::StubCorrupt {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }

    fn io_error(&self, source: std::io::Error) -> Error {
        Error::StubIo {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::BBox;
    use crate::track::{Team, TrackInfo, BALL_ID};

    fn sample() -> Tracks {
        let mut tracks = Tracks::with_frames(2);
        let mut player = TrackInfo::new(BBox::ltrb(10.5, 20.25, 30.0, 80.125));
        player.team = Some(Team::Two);
        player.team_color = Some([12.0, 200.5, 3.0]);
        tracks.players[0].insert(7, player);
        tracks.ball[1].insert(BALL_ID, TrackInfo::new(BBox::ltrb(1.0, 2.0, 3.0, 4.0)));
        tracks
    }

    #[test]
    fn round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = StubStore::new(dir.path().join("stubs").join("tracks.bin"));
        let tracks = sample();

        store.save(&tracks).unwrap();
        assert!(!store.temp_path().exists());

        match store.load().unwrap() {
            StubLookup::Hit(snapshot) => {
                assert!(snapshot.matches(2));
                assert!(!snapshot.matches(3));
                assert_eq!(snapshot.tracks, tracks);
            }
            StubLookup::Miss => panic!("expected a hit"),
        }
    }

    #[test]
    fn missing_file_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let store = StubStore::new(dir.path().join("nope.bin"));
        assert_eq!(store.load().unwrap(), StubLookup::Miss);
    }

    #[test]
    fn garbage_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracks.bin");
        let store = StubStore::new(&path);

        fs::write(&path, b"not a stub at all").unwrap();
        assert!(matches!(store.load(), Err(Error::StubCorrupt { .. })));

        store.save(&sample()).unwrap();
        let mut bytes = fs::read(&path).unwrap();
        bytes.truncate(bytes.len() - 5);
        fs::write(&path, bytes).unwrap();
        assert!(matches!(store.load(), Err(Error::StubCorrupt { .. })));
    }
}
