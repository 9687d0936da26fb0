//! Frame sources and sinks.
//!
//! The default build reads and writes numbered image sequences. With the
//! `opencv` feature, video containers are supported through `videoio`.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::Result;
use crate::frame::Frame;

const SEQUENCE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

pub const DEFAULT_FPS: f64 = 30.0;

/// Reads every image in `dir`, ordered by file name.
pub fn read_frames_dir<P: AsRef<Path>>(dir: P) -> Result<Vec<Frame>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(dir.as_ref())?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension()
                .and_then(|e| e.to_str())
                .map(|e| SEQUENCE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
                .unwrap_or(false)
        })
        .collect();
    paths.sort();

    let frames = paths
        .iter()
        .enumerate()
        .map(|(index, path)| Ok(Frame::new(index, image::open(path)?.to_rgb8())))
        .collect::<Result<Vec<_>>>()?;

    info!(dir = %dir.as_ref().display(), frames = frames.len(), "read frames");
    Ok(frames)
}

/// Writes `frames` as `frame_00000.png`, ... into `dir`, creating it if needed.
///
/// An empty sequence writes nothing and is not an error.
pub fn write_frames_dir<P: AsRef<Path>>(frames: &[Frame], dir: P) -> Result<()> {
    let dir = dir.as_ref();
    if frames.is_empty() {
        warn!(dir = %dir.display(), "no frames to save");
        return Ok(());
    }

    fs::create_dir_all(dir)?;
    for (i, frame) in frames.iter().enumerate() {
        frame.image.save(dir.join(format!("frame_{:05}.png", i)))?;
    }

    info!(dir = %dir.display(), frames = frames.len(), "frames saved");
    Ok(())
}

/// Reads frames from `path`: a directory of images, or a video file when
/// built with `opencv`.
pub fn read_frames<P: AsRef<Path>>(path: P) -> Result<Vec<Frame>> {
    let path = path.as_ref();
    if path.is_dir() {
        return read_frames_dir(path);
    }

    #[cfg(feature = "opencv")]
    {
        read_video(path)
    }

    #[cfg(not(feature = "opencv"))]
    {
        Err(crate::error::Error::Config(format!(
            "{} is not a frame directory; video files need the `opencv` feature",
            path.display()
        )))
    }
}

#[cfg(feature = "opencv")]
pub use self::cv::{read_video, save_video, VideoWriter};

#[cfg(feature = "opencv")]
mod cv {
    use std::path::Path;

    use image::RgbImage;
    use opencv::{core, imgproc, prelude::*, videoio};
    use tracing::{error, info, warn};

    use super::DEFAULT_FPS;
    use crate::error::{Error, Result};
    use crate::frame::Frame;

    pub fn read_video<P: AsRef<Path>>(path: P) -> Result<Vec<Frame>> {
        let name = path.as_ref().to_string_lossy();
        let mut cap = videoio::VideoCapture::from_file(&name, videoio::CAP_ANY)?;
        if !cap.is_opened()? {
            return Err(Error::Config(format!("unable to open video {}", name)));
        }

        let mut frames = Vec::new();
        let mut bgr = core::Mat::default();

        while cap.read(&mut bgr)? && !bgr.empty() {
            frames.push(Frame::new(frames.len(), mat_to_image(&bgr)?));
        }
        cap.release()?;

        info!(path = %name, frames = frames.len(), "read video");
        Ok(frames)
    }

    /// `mp4v` writer released when dropped.
    pub struct VideoWriter {
        writer: Option<videoio::VideoWriter>,
    }

    impl VideoWriter {
        pub fn new(path: &str, fps: f64, size: (u32, u32)) -> Result<Self> {
            let writer = videoio::VideoWriter::new(
                path,
                videoio::VideoWriter::fourcc(b'm' as _, b'p' as _, b'4' as _, b'v' as _)?,
                fps,
                core::Size::new(size.0 as i32, size.1 as i32),
                true,
            )?;

            Ok(Self { writer: Some(writer) })
        }

        pub fn feed(&mut self, frame: &Frame) -> Result<()> {
            let mat = image_to_mat(&frame.image)?;
            if let Some(w) = self.writer.as_mut() {
                w.write(&mat)?;
            }
            Ok(())
        }

        pub fn release(&mut self) -> Result<()> {
            if let Some(mut w) = self.writer.take() {
                w.release()?;
            }
            Ok(())
        }
    }

    impl Drop for VideoWriter {
        fn drop(&mut self) {
            if let Err(err) = self.release() {
                error!(%err, "failed to release video writer");
            }
        }
    }

    /// Encodes `frames` into `path`. The frame rate comes from `reference`
    /// when given, 30 otherwise. An empty sequence is logged and skipped.
    pub fn save_video<P: AsRef<Path>>(frames: &[Frame], path: P, reference: Option<&Path>) -> Result<()> {
        let name = path.as_ref().to_string_lossy();
        let Some(first) = frames.first() else {
            warn!(path = %name, "no frames to save");
            return Ok(());
        };

        let fps = match reference {
            Some(r) => {
                let mut cap = videoio::VideoCapture::from_file(&r.to_string_lossy(), videoio::CAP_ANY)?;
                let fps = cap.get(videoio::CAP_PROP_FPS)?;
                cap.release()?;
                if fps > 0.0 {
                    fps
                } else {
                    DEFAULT_FPS
                }
            }
            None => DEFAULT_FPS,
        };

        let mut writer = VideoWriter::new(&name, fps, first.dims())?;
        let written = frames.iter().try_for_each(|f| writer.feed(f));
        writer.release()?;

        if let Err(err) = &written {
            error!(path = %name, %err, "error writing video");
        }
        written?;

        info!(path = %name, fps, frames = frames.len(), "video saved");
        Ok(())
    }

    fn mat_to_image(bgr: &core::Mat) -> Result<RgbImage> {
        let mut rgb = core::Mat::default();
        imgproc::cvt_color(bgr, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

        let (w, h) = (rgb.cols() as u32, rgb.rows() as u32);
        RgbImage::from_raw(w, h, rgb.data_bytes()?.to_vec())
            .ok_or_else(|| Error::Render(format!("frame buffer does not fit {}x{}", w, h)))
    }

    fn image_to_mat(img: &RgbImage) -> Result<core::Mat> {
        let flat = core::Mat::from_slice(img.as_raw())?;
        let rgb = flat.reshape(3, img.height() as i32)?;

        let mut bgr = core::Mat::default();
        imgproc::cvt_color(&rgb.try_clone()?, &mut bgr, imgproc::COLOR_RGB2BGR, 0)?;
        Ok(bgr)
    }
}
