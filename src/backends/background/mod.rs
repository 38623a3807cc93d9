// SPDX-License-Identifier: GPL-3.0-only

//! Background frame sources
//!
//! A [`FrameSource`] hands out the next background frame each tick. Two
//! variants exist: a still image that returns the same decoded buffer every
//! call, and a looping video that advances one frame per call and rewinds at
//! end of stream.
//!
//! Returned frames are borrowed from the source and only valid until the next
//! call to [`FrameSource::next_frame`].

pub mod video_file;

pub use video_file::GstVideoReader;

use crate::constants::background::FILL_LABEL;
use crate::constants::file_formats;
use crate::errors::{SourceError, SourceResult};
use crate::frame::{self, Frame};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Sequential frame reader backing a looping video
pub trait VideoReader: Send {
    /// Decode the next frame into `buffer`
    ///
    /// Returns [`SourceError::Exhausted`] at end of stream.
    fn read_into(&mut self, buffer: &mut Frame) -> SourceResult<()>;

    /// Seek back to the first frame
    fn rewind(&mut self) -> SourceResult<()>;
}

/// A decoded still image
#[derive(Debug, Clone)]
pub struct StillImage {
    path: PathBuf,
    frame: Frame,
}

impl StillImage {
    /// Decode an image file into RGB
    pub fn load(path: &Path) -> SourceResult<Self> {
        info!(path = %path.display(), "Loading background image");

        let img = image::open(path).map_err(|e| SourceError::OpenFailed {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Self::from_frame(path, img.to_rgb8())
    }

    /// Wrap an already decoded frame
    pub fn from_frame(path: &Path, frame: Frame) -> SourceResult<Self> {
        if frame::is_empty(&frame) {
            return Err(SourceError::OpenFailed {
                path: path.to_path_buf(),
                reason: "image has no pixels".into(),
            });
        }
        info!(width = frame.width(), height = frame.height(), "Background image loaded");
        Ok(Self {
            path: path.to_path_buf(),
            frame,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }
}

/// A video that restarts from its first frame at end of stream
pub struct LoopingVideo {
    path: PathBuf,
    reader: Box<dyn VideoReader>,
    buffer: Frame,
    loops: u64,
}

impl LoopingVideo {
    /// Open a video file with the GStreamer decoder
    pub fn open(path: &Path) -> SourceResult<Self> {
        let reader = GstVideoReader::open(path)?;
        Ok(Self::with_reader(path, Box::new(reader)))
    }

    /// Loop over an arbitrary reader
    pub fn with_reader(path: &Path, reader: Box<dyn VideoReader>) -> Self {
        Self {
            path: path.to_path_buf(),
            reader,
            buffer: Frame::new(0, 0),
            loops: 0,
        }
    }

    /// Advance one frame, rewinding once at end of stream
    pub fn next_frame(&mut self) -> Option<&Frame> {
        match self.reader.read_into(&mut self.buffer) {
            Ok(()) if !frame::is_empty(&self.buffer) => return Some(&self.buffer),
            Ok(()) => debug!(path = %self.path.display(), "Background video returned an empty frame"),
            Err(SourceError::Exhausted) => {
                debug!(path = %self.path.display(), loops = self.loops, "Background video ended, rewinding")
            }
            Err(e) => debug!(path = %self.path.display(), error = %e, "Background video read failed"),
        }

        if let Err(e) = self.reader.rewind() {
            warn!(path = %self.path.display(), error = %e, "Failed to rewind background video");
            return None;
        }
        self.loops += 1;

        match self.reader.read_into(&mut self.buffer) {
            Ok(()) if !frame::is_empty(&self.buffer) => Some(&self.buffer),
            Ok(()) => None,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Background video unreadable after rewind");
                None
            }
        }
    }

    /// Number of times the video has wrapped to its first frame
    pub fn loops(&self) -> u64 {
        self.loops
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Source of background frames
pub enum FrameSource {
    Image(StillImage),
    LoopingVideo(LoopingVideo),
}

impl FrameSource {
    /// Open a background file, choosing the variant from its extension
    pub fn open(path: &Path) -> SourceResult<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();

        if file_formats::is_image_extension(&extension) {
            StillImage::load(path).map(FrameSource::Image)
        } else if file_formats::is_video_extension(&extension) {
            LoopingVideo::open(path).map(FrameSource::LoopingVideo)
        } else {
            Err(SourceError::UnsupportedFormat(extension))
        }
    }

    /// Single-color background at the given size
    pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> SourceResult<Self> {
        StillImage::from_frame(Path::new(FILL_LABEL), frame::solid(width, height, rgb))
            .map(FrameSource::Image)
    }

    /// Next background frame, or `None` to skip this tick
    ///
    /// Never returns an empty frame.
    pub fn next_frame(&mut self) -> Option<&Frame> {
        match self {
            FrameSource::Image(image) => Some(image.frame()),
            FrameSource::LoopingVideo(video) => video.next_frame(),
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            FrameSource::Image(image) => image.path(),
            FrameSource::LoopingVideo(video) => video.path(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FrameSource::Image(_) => "image",
            FrameSource::LoopingVideo(_) => "video",
        }
    }
}

impl std::fmt::Debug for FrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameSource")
            .field("kind", &self.kind())
            .field("path", &self.path())
            .finish()
    }
}
