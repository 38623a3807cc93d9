// SPDX-License-Identifier: GPL-3.0-only

//! GStreamer media helpers
//!
//! - [`gst`]: pipeline launch, appsink/appsrc lookup, preroll and frame copy
//! - [`encoders`]: video encoder and container selection for recording

pub mod encoders;
pub mod gst;

pub use encoders::{ContainerFormat, VideoCodec, select_video_encoder};
