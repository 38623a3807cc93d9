// SPDX-License-Identifier: GPL-3.0-only

//! Video encoder selection for the recording sinks
//!
//! Encoders are tried in priority order (hardware first) and the first one
//! installed wins. The container decides which codecs are acceptable.

use super::gst::is_element_available;
use gstreamer as gst;
use gstreamer::prelude::*;
use tracing::{debug, info, warn};

/// Video codec families the recorder can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoCodec {
    H264,
    VP8,
}

impl VideoCodec {
    /// Parser placed between encoder and muxer, if the codec needs one
    pub fn parser_name(&self) -> Option<&'static str> {
        match self {
            VideoCodec::H264 => Some("h264parse"),
            VideoCodec::VP8 => None,
        }
    }
}

/// Container formats for recorded streams
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    MP4,
    Matroska,
    WebM,
}

impl ContainerFormat {
    /// Parse a file extension (case-insensitive, leading dot optional)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.trim_start_matches('.').to_lowercase().as_str() {
            "mp4" | "m4v" => Some(ContainerFormat::MP4),
            "mkv" => Some(ContainerFormat::Matroska),
            "webm" => Some(ContainerFormat::WebM),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ContainerFormat::MP4 => "mp4",
            ContainerFormat::Matroska => "mkv",
            ContainerFormat::WebM => "webm",
        }
    }

    pub fn muxer_name(&self) -> &'static str {
        match self {
            ContainerFormat::MP4 => "mp4mux",
            ContainerFormat::Matroska => "matroskamux",
            ContainerFormat::WebM => "webmmux",
        }
    }

    /// Whether the container can carry `codec`
    pub fn accepts(&self, codec: VideoCodec) -> bool {
        match self {
            ContainerFormat::MP4 => codec == VideoCodec::H264,
            ContainerFormat::Matroska => true,
            ContainerFormat::WebM => codec == VideoCodec::VP8,
        }
    }
}

/// A known encoder element
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSpec {
    pub element_name: &'static str,
    pub codec: VideoCodec,
    pub is_hardware: bool,
    /// Lower is preferred
    pub priority: u32,
}

const ENCODER_SPECS: &[EncoderSpec] = &[
    EncoderSpec { element_name: "vah264enc", codec: VideoCodec::H264, is_hardware: true, priority: 10 },
    EncoderSpec { element_name: "vaapih264enc", codec: VideoCodec::H264, is_hardware: true, priority: 11 },
    EncoderSpec { element_name: "nvh264enc", codec: VideoCodec::H264, is_hardware: true, priority: 12 },
    EncoderSpec { element_name: "x264enc", codec: VideoCodec::H264, is_hardware: false, priority: 20 },
    EncoderSpec { element_name: "openh264enc", codec: VideoCodec::H264, is_hardware: false, priority: 21 },
    EncoderSpec { element_name: "vp8enc", codec: VideoCodec::VP8, is_hardware: false, priority: 30 },
];

/// Encoders usable with `container`, best first, whether or not installed
pub fn candidates_for(container: ContainerFormat) -> Vec<EncoderSpec> {
    let mut specs: Vec<EncoderSpec> = ENCODER_SPECS
        .iter()
        .copied()
        .filter(|spec| container.accepts(spec.codec))
        .collect();
    specs.sort_by_key(|spec| spec.priority);
    specs
}

/// Target bitrate for a stream of the given size
///
/// Roughly 6 bits per pixel per second, clamped to 500 kbps..50 Mbps.
pub fn bitrate_kbps(width: u32, height: u32) -> u32 {
    let pixels = width as u64 * height as u64;
    ((pixels * 6 / 1000) as u32).clamp(500, 50_000)
}

/// Elements chosen for one recording sink
pub struct SelectedVideoEncoder {
    pub encoder: gst::Element,
    pub parser: Option<gst::Element>,
    pub muxer: gst::Element,
    pub spec: EncoderSpec,
    pub container: ContainerFormat,
}

/// Build the best available encoder chain for `container`
pub fn select_video_encoder(
    container: ContainerFormat,
    width: u32,
    height: u32,
) -> Result<SelectedVideoEncoder, String> {
    let spec = candidates_for(container)
        .into_iter()
        .find(|spec| is_element_available(spec.element_name))
        .ok_or_else(|| format!("No video encoder available for {:?}", container))?;

    let encoder = gst::ElementFactory::make(spec.element_name)
        .build()
        .map_err(|e| format!("Failed to create encoder {}: {}", spec.element_name, e))?;
    configure_video_encoder(&encoder, spec.element_name, bitrate_kbps(width, height));

    let parser = match spec.codec.parser_name() {
        Some(parser_name) => match gst::ElementFactory::make(parser_name).build() {
            Ok(p) => Some(p),
            Err(e) => {
                warn!(parser = parser_name, error = %e, "Parser unavailable, linking encoder to muxer directly");
                None
            }
        },
        None => None,
    };

    let muxer = gst::ElementFactory::make(container.muxer_name())
        .build()
        .map_err(|e| format!("Failed to create muxer {}: {}", container.muxer_name(), e))?;

    info!(
        encoder = spec.element_name,
        hardware = spec.is_hardware,
        muxer = container.muxer_name(),
        "Selected video encoder"
    );

    Ok(SelectedVideoEncoder {
        encoder,
        parser,
        muxer,
        spec,
        container,
    })
}

fn set_if_present(element: &gst::Element, property: &str, value: &str) {
    if element.find_property(property).is_some() {
        element.set_property_from_str(property, value);
    }
}

fn configure_video_encoder(encoder: &gst::Element, encoder_name: &str, bitrate: u32) {
    match encoder_name {
        "x264enc" => {
            set_if_present(encoder, "speed-preset", "veryfast");
            set_if_present(encoder, "tune", "zerolatency");
            set_if_present(encoder, "bitrate", &bitrate.to_string());
        }
        "openh264enc" => {
            // bits per second
            set_if_present(encoder, "bitrate", &(bitrate * 1000).to_string());
        }
        "vp8enc" => {
            set_if_present(encoder, "deadline", "1");
            set_if_present(encoder, "target-bitrate", &(bitrate * 1000).to_string());
        }
        _ => {
            set_if_present(encoder, "bitrate", &bitrate.to_string());
        }
    }
    debug!(encoder = encoder_name, bitrate, "Configured video encoder");
}
