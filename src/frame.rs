// SPDX-License-Identifier: GPL-3.0-only

//! Frame buffers and the pixel arithmetic shared by the pipeline
//!
//! Frames are packed 8-bit RGB. Masks are single-channel 8-bit and binary
//! (0 or 255) once produced by the compositor.

use crate::constants::chroma_key::HUE_MAX;
use image::imageops::{self, FilterType};
use serde::{Deserialize, Serialize};

/// A packed 8-bit RGB frame
pub type Frame = image::RgbImage;

/// A single-channel 8-bit mask
pub type Mask = image::GrayImage;

/// A packed 8-bit RGBA still (frame plus mask alpha)
pub type AlphaStill = image::RgbaImage;

/// An 8-bit HSV triple in OpenCV convention (hue 0-180, saturation/value 0-255)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Hsv {
    pub h: u8,
    pub s: u8,
    pub v: u8,
}

impl Hsv {
    pub const fn new(h: u8, s: u8, v: u8) -> Self {
        Self { h, s, v }
    }

    pub const fn from_array(hsv: [u8; 3]) -> Self {
        Self::new(hsv[0], hsv[1], hsv[2])
    }

    /// Convert one RGB pixel
    ///
    /// Matches OpenCV's 8-bit `BGR2HSV`: `V = max`, `S = 255 * (max - min) / max`,
    /// hue in degrees halved so it fits a byte.
    pub fn from_rgb(r: u8, g: u8, b: u8) -> Self {
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let diff = (max - min) as f32;

        let s = if max == 0 {
            0
        } else {
            (255.0 * diff / max as f32).round() as u8
        };

        let h = if diff == 0.0 {
            0
        } else {
            let (r, g, b) = (r as f32, g as f32, b as f32);
            let mut degrees = if max as f32 == r {
                60.0 * (g - b) / diff
            } else if max as f32 == g {
                120.0 + 60.0 * (b - r) / diff
            } else {
                240.0 + 60.0 * (r - g) / diff
            };
            if degrees < 0.0 {
                degrees += 360.0;
            }
            let half = (degrees / 2.0).round() as u16;
            if half >= HUE_MAX as u16 {
                (half - HUE_MAX as u16) as u8
            } else {
                half as u8
            }
        };

        Self { h, s, v: max }
    }
}

/// Check whether two frames share pixel dimensions
pub fn same_dimensions(a: &Frame, b: &Frame) -> bool {
    a.dimensions() == b.dimensions()
}

/// Resize a frame into a new buffer of the given size
///
/// Always allocates; the source is never modified. Bilinear filtering.
pub fn resize_to(frame: &Frame, width: u32, height: u32) -> Frame {
    imageops::resize(frame, width, height, FilterType::Triangle)
}

/// Build a solid frame, used for placeholders and tests
pub fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
    Frame::from_pixel(width, height, image::Rgb(rgb))
}

/// Frame is unusable as a pipeline input
pub fn is_empty(frame: &Frame) -> bool {
    frame.width() == 0 || frame.height() == 0
}
