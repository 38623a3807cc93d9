// SPDX-License-Identifier: GPL-3.0-only

//! V4L2 capture through GStreamer
//!
//! Pipeline: `v4l2src ! [requested caps] ! videoconvert ! RGB ! appsink`.
//! The appsink keeps a single buffer and drops stale ones so a slow consumer
//! always reads the newest frame.

use super::{CaptureBackend, CaptureRequest, CaptureStream, DeviceSelector, Framerate, NegotiatedFormat};
use crate::constants::pipeline::{CAPTURE_PULL_TIMEOUT, PREROLL_TIMEOUT, RAW_FORMAT};
use crate::errors::{DeviceError, DeviceResult};
use crate::frame::Frame;
use crate::media::gst as gst_util;
use gstreamer as gst;
use gstreamer::prelude::*;
use tracing::{debug, info, warn};

/// Capture backend built on `v4l2src`
#[derive(Debug, Default, Clone, Copy)]
pub struct GstCaptureBackend;

impl GstCaptureBackend {
    pub fn new() -> Self {
        Self
    }

    fn pipeline_description(device_path: &str, request: Option<&CaptureRequest>) -> String {
        let constraint = match request {
            Some(req) => {
                let rate = Framerate::from_f64(req.framerate);
                let mut caps = format!("video/x-raw,width={},height={}", req.width, req.height);
                if rate.is_known() {
                    caps.push_str(&format!(",framerate={}/{}", rate.num, rate.denom));
                }
                format!("{} ! ", caps)
            }
            None => String::new(),
        };

        format!(
            "v4l2src device=\"{}\" ! {}videoconvert ! video/x-raw,format={} ! \
             appsink name=sink max-buffers=1 drop=true sync=false",
            device_path, constraint, RAW_FORMAT
        )
    }

    fn try_open(
        device_path: &str,
        request: Option<&CaptureRequest>,
    ) -> Result<GstCaptureStream, String> {
        let pipeline = gst_util::launch(&Self::pipeline_description(device_path, request))?;
        let appsink = gst_util::appsink(&pipeline, "sink")?;

        gst_util::play_and_preroll(&pipeline, PREROLL_TIMEOUT)?;

        let Some(info) = gst_util::negotiated_info(&appsink) else {
            let _ = pipeline.set_state(gst::State::Null);
            return Err("Capture pipeline negotiated no caps".to_string());
        };

        let fps = info.fps();
        let format = NegotiatedFormat {
            width: info.width(),
            height: info.height(),
            framerate: Framerate::new(fps.numer().max(0) as u32, fps.denom().max(0) as u32),
        };

        Ok(GstCaptureStream {
            pipeline,
            appsink,
            format,
        })
    }
}

impl CaptureBackend for GstCaptureBackend {
    fn open(
        &self,
        selector: &DeviceSelector,
        request: &CaptureRequest,
    ) -> DeviceResult<Box<dyn CaptureStream>> {
        let device_path = selector.device_path();

        // Devices that can't do the requested mode still get opened at whatever
        // they offer; the negotiated format is what downstream sizes against.
        let stream = match Self::try_open(&device_path, Some(request)) {
            Ok(stream) => stream,
            Err(e) => {
                warn!(
                    device = %device_path,
                    error = %e,
                    "Requested capture mode unavailable, retrying unconstrained"
                );
                Self::try_open(&device_path, None)
                    .map_err(|e| DeviceError::OpenFailed(format!("{}: {}", device_path, e)))?
            }
        };

        info!(device = %device_path, format = %stream.format, "Capture pipeline running");
        Ok(Box::new(stream))
    }
}

/// An open `v4l2src` pipeline
pub struct GstCaptureStream {
    pipeline: gst::Pipeline,
    appsink: gstreamer_app::AppSink,
    format: NegotiatedFormat,
}

impl CaptureStream for GstCaptureStream {
    fn format(&self) -> NegotiatedFormat {
        self.format
    }

    fn read_into(&mut self, buffer: &mut Frame) -> DeviceResult<()> {
        if let Some(err) = gst_util::pending_error(&self.pipeline) {
            return Err(DeviceError::ReadFailed(err));
        }

        match self
            .appsink
            .try_pull_sample(gst_util::clock_time(CAPTURE_PULL_TIMEOUT))
        {
            Some(sample) => gst_util::copy_sample_into(&sample, buffer).map_err(DeviceError::ReadFailed),
            None if self.appsink.is_eos() => Err(DeviceError::Closed),
            None => Err(DeviceError::ReadFailed("Timed out waiting for frame".into())),
        }
    }

    fn close(&mut self) {
        debug!("Stopping capture pipeline");
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}

impl Drop for GstCaptureStream {
    fn drop(&mut self) {
        let _ = self.pipeline.set_state(gst::State::Null);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constrained_pipeline_description() {
        let desc = GstCaptureBackend::pipeline_description(
            "/dev/video0",
            Some(&CaptureRequest {
                width: 864,
                height: 480,
                framerate: 24.0,
            }),
        );
        assert!(desc.starts_with("v4l2src device=\"/dev/video0\""));
        assert!(desc.contains("width=864,height=480,framerate=24/1"));
        assert!(desc.contains("format=RGB"));
    }

    #[test]
    fn test_unconstrained_pipeline_description() {
        let desc = GstCaptureBackend::pipeline_description("/dev/video2", None);
        assert!(!desc.contains("width="));
        assert!(desc.contains("appsink name=sink"));
    }
}
