// SPDX-License-Identifier: GPL-3.0-only

//! Sequential video decoding for looping backgrounds
//!
//! Pipeline: `filesrc ! decodebin ! videoconvert ! RGB ! appsink`. The appsink
//! is unsynchronized and never drops, so every call pulls the next decoded
//! frame in file order regardless of wall-clock time. Pacing comes from the
//! capture scheduler.

use super::VideoReader;
use crate::constants::pipeline::{PREROLL_TIMEOUT, RAW_FORMAT, VIDEO_PULL_TIMEOUT};
use crate::errors::{SourceError, SourceResult};
use crate::frame::Frame;
use crate::media::gst as gst_util;
use gstreamer as gst;
use gstreamer::prelude::*;
use std::path::Path;
use tracing::{debug, info};

/// GStreamer-backed [`VideoReader`]
pub struct GstVideoReader {
    pipeline: gst::Pipeline,
    appsink: gstreamer_app::AppSink,
    frames_read: u64,
}

impl GstVideoReader {
    pub fn open(path: &Path) -> SourceResult<Self> {
        info!(path = %path.display(), "Opening background video");

        let open_failed = |reason: String| SourceError::OpenFailed {
            path: path.to_path_buf(),
            reason,
        };

        if !path.is_file() {
            return Err(open_failed("file not found".into()));
        }

        let description = format!(
            "filesrc location=\"{}\" ! decodebin ! videoconvert ! video/x-raw,format={} ! \
             appsink name=sink max-buffers=2 drop=false sync=false",
            path.to_string_lossy(),
            RAW_FORMAT
        );

        let pipeline = gst_util::launch(&description).map_err(open_failed)?;
        let appsink = gst_util::appsink(&pipeline, "sink").map_err(open_failed)?;
        gst_util::play_and_preroll(&pipeline, PREROLL_TIMEOUT).map_err(open_failed)?;

        if let Some(info) = gst_util::negotiated_info(&appsink) {
            info!(
                width = info.width(),
                height = info.height(),
                "Background video decoder ready"
            );
        }

        Ok(Self {
            pipeline,
            appsink,
            frames_read: 0,
        })
    }
}

impl VideoReader for GstVideoReader {
    fn read_into(&mut self, buffer: &mut Frame) -> SourceResult<()> {
        if let Some(err) = gst_util::pending_error(&self.pipeline) {
            return Err(SourceError::Decode(err));
        }
        if self.appsink.is_eos() {
            return Err(SourceError::Exhausted);
        }

        match self
            .appsink
            .try_pull_sample(gst_util::clock_time(VIDEO_PULL_TIMEOUT))
        {
            Some(sample) => {
                gst_util::copy_sample_into(&sample, buffer).map_err(SourceError::Decode)?;
                self.frames_read += 1;
                Ok(())
            }
            None if self.appsink.is_eos() => Err(SourceError::Exhausted),
            None => Err(SourceError::Decode("Timed out waiting for video frame".into())),
        }
    }

    fn rewind(&mut self) -> SourceResult<()> {
        debug!(frames = self.frames_read, "Restarting background video");
        self.pipeline
            .seek_simple(
                gst::SeekFlags::FLUSH | gst::SeekFlags::KEY_UNIT,
                gst::ClockTime::ZERO,
            )
            .map_err(|e| SourceError::Decode(format!("Seek failed: {}", e)))?;
        self.frames_read = 0;
        Ok(())
    }
}

impl Drop for GstVideoReader {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}
