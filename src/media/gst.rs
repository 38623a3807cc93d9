// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer plumbing shared by the capture, background and recording pipelines
//!
//! Everything here reports failures as plain strings; callers wrap them into
//! their own error domain.

use crate::frame::Frame;
use gstreamer as gst;
use gstreamer::prelude::*;
use std::time::Duration;
use tracing::{debug, warn};

/// Initialize GStreamer (idempotent)
pub fn init() -> Result<(), String> {
    gst::init().map_err(|e| format!("GStreamer init failed: {}", e))
}

/// Convert a std duration to a GStreamer clock time
pub fn clock_time(duration: Duration) -> gst::ClockTime {
    gst::ClockTime::from_mseconds(duration.as_millis() as u64)
}

/// Build a pipeline from a launch description
pub fn launch(description: &str) -> Result<gst::Pipeline, String> {
    init()?;
    debug!(pipeline = %description, "Launching pipeline");

    gst::parse::launch(description)
        .map_err(|e| format!("Failed to create pipeline: {}", e))?
        .downcast::<gst::Pipeline>()
        .map_err(|_| "Failed to downcast to Pipeline".to_string())
}

/// Look up an appsink by element name
pub fn appsink(pipeline: &gst::Pipeline, name: &str) -> Result<gstreamer_app::AppSink, String> {
    pipeline
        .by_name(name)
        .ok_or_else(|| format!("Failed to find appsink '{}'", name))?
        .downcast::<gstreamer_app::AppSink>()
        .map_err(|_| "Failed to downcast to AppSink".to_string())
}

/// Start a pipeline and wait until it has prerolled
///
/// On failure the pipeline is set back to Null before returning.
pub fn play_and_preroll(pipeline: &gst::Pipeline, timeout: Duration) -> Result<(), String> {
    if let Err(e) = pipeline.set_state(gst::State::Playing) {
        let _ = pipeline.set_state(gst::State::Null);
        return Err(format!("Failed to start pipeline: {:?}", e));
    }

    let Some(bus) = pipeline.bus() else {
        let _ = pipeline.set_state(gst::State::Null);
        return Err("No bus on pipeline".to_string());
    };

    let msg = bus.timed_pop_filtered(
        clock_time(timeout),
        &[gst::MessageType::AsyncDone, gst::MessageType::Error],
    );

    match msg.as_ref().map(|m| m.view()) {
        Some(gst::MessageView::AsyncDone(_)) => Ok(()),
        Some(gst::MessageView::Error(err)) => {
            let _ = pipeline.set_state(gst::State::Null);
            Err(format!("Pipeline error: {}", err.error()))
        }
        _ => {
            let _ = pipeline.set_state(gst::State::Null);
            Err("Timed out waiting for pipeline to preroll".to_string())
        }
    }
}

/// Pop any error already posted on the bus without blocking
pub fn pending_error(pipeline: &gst::Pipeline) -> Option<String> {
    let bus = pipeline.bus()?;
    while let Some(msg) = bus.pop_filtered(&[gst::MessageType::Error, gst::MessageType::Warning]) {
        match msg.view() {
            gst::MessageView::Error(err) => {
                return Some(format!("{} ({:?})", err.error(), err.debug()));
            }
            gst::MessageView::Warning(w) => {
                warn!(warning = %w.error(), "Pipeline warning");
            }
            _ => {}
        }
    }
    None
}

/// Read the negotiated video info off an appsink's sink pad
pub fn negotiated_info(appsink: &gstreamer_app::AppSink) -> Option<gstreamer_video::VideoInfo> {
    let caps = appsink.static_pad("sink")?.current_caps()?;
    gstreamer_video::VideoInfo::from_caps(&caps).ok()
}

/// Copy a packed RGB sample into `frame`, respecting the row stride
///
/// `frame` is reallocated only when the sample geometry differs from it.
pub fn copy_sample_into(sample: &gst::Sample, frame: &mut Frame) -> Result<(), String> {
    let caps = sample.caps().ok_or("No caps on sample")?;
    let info = gstreamer_video::VideoInfo::from_caps(caps)
        .map_err(|e| format!("Invalid caps on sample: {}", e))?;
    let buffer = sample.buffer().ok_or("No buffer in sample")?;
    let map = buffer
        .map_readable()
        .map_err(|_| "Failed to map buffer".to_string())?;

    let (width, height) = (info.width(), info.height());
    let row_bytes = width as usize * 3;
    let stride = info.stride()[0] as usize;
    let src = map.as_slice();

    if width == 0 || height == 0 {
        return Err("Sample has no pixels".to_string());
    }
    if stride < row_bytes || src.len() < stride * (height as usize - 1) + row_bytes {
        return Err(format!(
            "Buffer too small for {}x{} (stride {}, {} bytes)",
            width,
            height,
            stride,
            src.len()
        ));
    }

    if frame.dimensions() != (width, height) {
        *frame = Frame::new(width, height);
    }

    let dst: &mut [u8] = &mut **frame;
    for (row, out) in dst.chunks_exact_mut(row_bytes).enumerate() {
        let start = row * stride;
        out.copy_from_slice(&src[start..start + row_bytes]);
    }

    Ok(())
}

/// Check whether a GStreamer element factory is installed
pub fn is_element_available(element_name: &str) -> bool {
    if init().is_err() {
        return false;
    }
    gst::ElementFactory::find(element_name).is_some()
}
