// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer recording sinks
//!
//! Each video sink is its own pipeline:
//!
//! ```text
//! appsrc (RGB, timed) → videoconvert → encoder → [parser] → muxer → filesink
//! ```
//!
//! Frames are timestamped from their index and the negotiated frame rate, so
//! the file plays back at capture speed regardless of scheduler jitter.
//! Closing sends EOS and waits for the muxer to finish writing the container.

use super::{SinkFactory, VideoSink};
use crate::backends::camera::NegotiatedFormat;
use crate::constants::pipeline::{EOS_TIMEOUT, START_CHECK_TIMEOUT};
use crate::constants::scheduler::FRAME_LOG_INTERVAL;
use crate::errors::{WriterError, WriterResult};
use crate::frame::{AlphaStill, Frame};
use crate::media::encoders::{ContainerFormat, select_video_encoder};
use crate::media::gst as gst_util;
use gstreamer as gst;
use gstreamer::prelude::*;
use gstreamer_app as gst_app;
use gstreamer_video as gst_video;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Opens GStreamer video sinks and writes PNG stills
#[derive(Debug, Clone, Copy)]
pub struct GstSinkFactory {
    container: ContainerFormat,
}

impl GstSinkFactory {
    pub fn new(container: ContainerFormat) -> Self {
        Self { container }
    }

    /// Factory for a container extension such as `mp4`
    pub fn for_extension(extension: &str) -> WriterResult<Self> {
        ContainerFormat::from_extension(extension)
            .map(Self::new)
            .ok_or_else(|| {
                WriterError::UnsupportedContainer(extension.to_string())
            })
    }
}

impl Default for GstSinkFactory {
    fn default() -> Self {
        Self::new(ContainerFormat::MP4)
    }
}

impl SinkFactory for GstSinkFactory {
    fn container_extension(&self) -> &str {
        self.container.extension()
    }

    fn open_video(
        &self,
        path: &Path,
        format: &NegotiatedFormat,
    ) -> WriterResult<Box<dyn VideoSink>> {
        let sink = GstVideoSink::open(path, format, self.container).map_err(|reason| {
            WriterError::SinkOpenFailed {
                path: path.to_path_buf(),
                reason,
            }
        })?;
        Ok(Box::new(sink))
    }

    fn write_still(&self, path: &Path, still: &AlphaStill) -> WriterResult<()> {
        still
            .save_with_format(path, image::ImageFormat::Png)
            .map_err(|e| WriterError::StillWriteFailed {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }
}

/// One encoded video file being written
pub struct GstVideoSink {
    pipeline: gst::Pipeline,
    appsrc: gst_app::AppSrc,
    info: gst_video::VideoInfo,
    format: NegotiatedFormat,
    file_path: PathBuf,
    frames_written: u64,
}

impl GstVideoSink {
    /// Build and start the pipeline writing to `path`
    pub fn open(
        path: &Path,
        format: &NegotiatedFormat,
        container: ContainerFormat,
    ) -> Result<Self, String> {
        info!(
            output = %path.display(),
            format = %format,
            container = container.extension(),
            "Creating video sink"
        );

        gst_util::init()?;

        if format.width == 0 || format.height == 0 || !format.framerate.is_known() {
            return Err(format!("Cannot record with format {}", format));
        }

        let fps = gst::Fraction::new(format.framerate.num as i32, format.framerate.denom as i32);
        let info = gst_video::VideoInfo::builder(gst_video::VideoFormat::Rgb, format.width, format.height)
            .fps(fps)
            .build()
            .map_err(|e| format!("Invalid video info: {}", e))?;
        let caps = info
            .to_caps()
            .map_err(|e| format!("Failed to build caps: {}", e))?;

        let encoders = select_video_encoder(container, format.width, format.height)?;

        let pipeline = gst::Pipeline::new();

        let appsrc = gst::ElementFactory::make("appsrc")
            .name("src")
            .build()
            .map_err(|e| format!("Failed to create appsrc: {}", e))?
            .downcast::<gst_app::AppSrc>()
            .map_err(|_| "Failed to downcast to AppSrc".to_string())?;
        appsrc.set_caps(Some(&caps));
        appsrc.set_format(gst::Format::Time);
        appsrc.set_is_live(false);

        let videoconvert = gst::ElementFactory::make("videoconvert")
            .build()
            .map_err(|e| format!("Failed to create videoconvert: {}", e))?;
        let filesink = gst::ElementFactory::make("filesink")
            .property("location", path.to_string_lossy().to_string())
            .build()
            .map_err(|e| format!("Failed to create filesink: {}", e))?;

        let mut chain: Vec<&gst::Element> = vec![appsrc.upcast_ref(), &videoconvert, &encoders.encoder];
        if let Some(parser) = &encoders.parser {
            chain.push(parser);
        }
        chain.push(&encoders.muxer);
        chain.push(&filesink);

        pipeline
            .add_many(chain.iter().copied())
            .map_err(|e| format!("Failed to add elements: {}", e))?;
        gst::Element::link_many(chain.iter().copied())
            .map_err(|e| format!("Failed to link recording chain: {}", e))?;

        pipeline
            .set_state(gst::State::Playing)
            .map_err(|e| format!("Failed to start recording: {}", e))?;

        // Catch immediate failures such as an unwritable location
        if let Some(bus) = pipeline.bus()
            && let Some(msg) = bus.timed_pop_filtered(
                gst_util::clock_time(START_CHECK_TIMEOUT),
                &[gst::MessageType::Error],
            )
            && let gst::MessageView::Error(err) = msg.view()
        {
            error!(
                error = %err.error(),
                debug = ?err.debug(),
                source = ?err.src().map(|s| s.name()),
                "GStreamer error during start"
            );
            let _ = pipeline.set_state(gst::State::Null);
            return Err(format!("Recording start error: {}", err.error()));
        }

        Ok(Self {
            pipeline,
            appsrc,
            info,
            format: *format,
            file_path: path.to_path_buf(),
            frames_written: 0,
        })
    }

    /// Presentation timestamp of frame `index`
    fn timestamp(&self, index: u64) -> gst::ClockTime {
        let rate = self.format.framerate;
        let nanos = index as u128 * 1_000_000_000 * rate.denom as u128 / rate.num.max(1) as u128;
        gst::ClockTime::from_nseconds(nanos as u64)
    }
}

impl VideoSink for GstVideoSink {
    fn write(&mut self, frame: &Frame) -> WriterResult<()> {
        if frame.dimensions() != (self.format.width, self.format.height) {
            return Err(WriterError::InvalidFrame(format!(
                "Frame size {}x{} doesn't match sink {}x{}",
                frame.width(),
                frame.height(),
                self.format.width,
                self.format.height
            )));
        }

        let row_bytes = self.format.width as usize * 3;
        let stride = self.info.stride()[0] as usize;

        let mut buffer = gst::Buffer::with_size(self.info.size())
            .map_err(|e| WriterError::FrameWriteFailed(format!("Failed to create buffer: {}", e)))?;
        {
            let buffer_ref = buffer.get_mut().ok_or_else(|| {
                WriterError::FrameWriteFailed("Failed to get mutable buffer reference".into())
            })?;

            let pts = self.timestamp(self.frames_written);
            let next = self.timestamp(self.frames_written + 1);
            buffer_ref.set_pts(pts);
            buffer_ref.set_duration(next - pts);

            let mut map = buffer_ref
                .map_writable()
                .map_err(|e| WriterError::FrameWriteFailed(format!("Failed to map buffer: {}", e)))?;

            for (row, src) in frame.as_raw().chunks_exact(row_bytes).enumerate() {
                let start = row * stride;
                map[start..start + row_bytes].copy_from_slice(src);
            }
        }

        match self.appsrc.push_buffer(buffer) {
            Ok(_) => {
                self.frames_written += 1;
                if self.frames_written % FRAME_LOG_INTERVAL == 0 {
                    debug!(
                        frame = self.frames_written,
                        path = %self.file_path.display(),
                        "Frames pushed to video sink"
                    );
                }
                Ok(())
            }
            Err(e) => {
                warn!(?e, path = %self.file_path.display(), "Failed to push frame");
                Err(WriterError::FrameWriteFailed(format!(
                    "Failed to push frame: {:?}",
                    e
                )))
            }
        }
    }

    fn finish(self: Box<Self>) -> WriterResult<PathBuf> {
        info!(
            path = %self.file_path.display(),
            frames = self.frames_written,
            "Finalizing video file"
        );

        if let Err(e) = self.appsrc.end_of_stream() {
            warn!(?e, "Failed to send EOS to appsrc");
        }

        let outcome = match self.pipeline.bus() {
            Some(bus) => match bus.timed_pop_filtered(
                gst_util::clock_time(EOS_TIMEOUT),
                &[gst::MessageType::Eos, gst::MessageType::Error],
            ) {
                Some(msg) => match msg.view() {
                    gst::MessageView::Eos(_) => Ok(()),
                    gst::MessageView::Error(err) => Err(format!("{}", err.error())),
                    _ => Ok(()),
                },
                None => Err("Timed out waiting for EOS".to_string()),
            },
            None => Err("No bus available".to_string()),
        };

        let _ = self.pipeline.set_state(gst::State::Null);

        match outcome {
            Ok(()) => {
                info!(path = %self.file_path.display(), "Recording saved");
                Ok(self.file_path.clone())
            }
            Err(reason) => {
                error!(path = %self.file_path.display(), %reason, "Video file may be incomplete");
                Err(WriterError::FinalizeFailed(reason))
            }
        }
    }

    fn frames_written(&self) -> u64 {
        self.frames_written
    }
}

impl Drop for GstVideoSink {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}
