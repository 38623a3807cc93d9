// SPDX-License-Identifier: GPL-3.0-only

//! Recording pipeline
//!
//! A recording session writes three outputs side by side:
//!
//! ```text
//! <session>/stream_raw_output.<ext>        raw camera frames
//! <session>/stream_fx_output.<ext>         composited frames
//! <session>/image_sequence/output_image_N.png   raw frame + coverage alpha
//! ```
//!
//! [`WriterPipeline`] owns the session state machine. The actual encoding is
//! behind [`SinkFactory`] so the state machine can run without GStreamer.

pub mod policy;
pub mod recorder;
pub mod writer;

pub use policy::{PolicyVerdict, WriteFailurePolicy};
pub use recorder::{GstSinkFactory, GstVideoSink};
pub use writer::{FrameWriteReport, SessionSummary, SinkKind, WriterPipeline, WriterState};

use crate::backends::camera::NegotiatedFormat;
use crate::errors::WriterResult;
use crate::frame::{AlphaStill, Frame};
use std::path::{Path, PathBuf};

/// Creates the sinks a recording session writes to
pub trait SinkFactory: Send {
    /// File extension of the video container produced by `open_video`
    fn container_extension(&self) -> &str;

    /// Open a video file sized and timed for `format`
    fn open_video(&self, path: &Path, format: &NegotiatedFormat)
    -> WriterResult<Box<dyn VideoSink>>;

    /// Write one still image
    fn write_still(&self, path: &Path, still: &AlphaStill) -> WriterResult<()>;
}

/// An open video file accepting frames in presentation order
pub trait VideoSink: Send {
    /// Append one frame
    fn write(&mut self, frame: &Frame) -> WriterResult<()>;

    /// Flush and finalize the container
    fn finish(self: Box<Self>) -> WriterResult<PathBuf>;

    /// Frames accepted so far
    fn frames_written(&self) -> u64;
}
