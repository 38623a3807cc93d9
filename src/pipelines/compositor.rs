// SPDX-License-Identifier: GPL-3.0-only

//! Chroma key compositing
//!
//! The foreground is converted to HSV and thresholded against an inclusive
//! range. Pixels inside the range take the background, pixels outside keep
//! the foreground. The two masks are complementary and binary, so the result
//! is a pixel-disjoint composite with no blending at mask edges.

use crate::constants::chroma_key::{LOWER_GREEN, MASK_THRESHOLD, UPPER_GREEN};
use crate::errors::CompositeError;
use crate::frame::{AlphaStill, Frame, Hsv, Mask};
use serde::{Deserialize, Serialize};

/// Inclusive HSV range treated as transparent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChromaKeyRange {
    pub lower: Hsv,
    pub upper: Hsv,
}

impl Default for ChromaKeyRange {
    fn default() -> Self {
        Self {
            lower: Hsv::from_array(LOWER_GREEN),
            upper: Hsv::from_array(UPPER_GREEN),
        }
    }
}

impl ChromaKeyRange {
    pub fn new(lower: Hsv, upper: Hsv) -> Self {
        Self { lower, upper }
    }

    /// Inclusive per-channel range test
    pub fn contains(&self, hsv: Hsv) -> bool {
        (self.lower.h..=self.upper.h).contains(&hsv.h)
            && (self.lower.s..=self.upper.s).contains(&hsv.s)
            && (self.lower.v..=self.upper.v).contains(&hsv.v)
    }

    /// Every lower bound is at or below its upper bound
    pub fn is_valid(&self) -> bool {
        self.lower.h <= self.upper.h && self.lower.s <= self.upper.s && self.lower.v <= self.upper.v
    }
}

/// Output of one compositing pass
#[derive(Debug, Clone)]
pub struct Composite {
    /// Foreground with keyed pixels replaced by the background
    pub frame: Frame,
    /// Foreground coverage: 255 where the subject shows, 0 where the key was detected
    pub mask: Mask,
}

/// Threshold the foreground into a key mask (255 = key colour detected)
pub fn key_mask(foreground: &Frame, range: &ChromaKeyRange) -> Mask {
    Mask::from_fn(foreground.width(), foreground.height(), |x, y| {
        let [r, g, b] = foreground.get_pixel(x, y).0;
        if range.contains(Hsv::from_rgb(r, g, b)) {
            image::Luma([u8::MAX])
        } else {
            image::Luma([0])
        }
    })
}

/// Replace the keyed region of `foreground` with `background`
///
/// Both frames must share dimensions; callers resize the background first.
pub fn composite(
    foreground: &Frame,
    background: &Frame,
    range: &ChromaKeyRange,
) -> Result<Composite, CompositeError> {
    if foreground.dimensions() != background.dimensions() {
        return Err(CompositeError::DimensionMismatch {
            foreground: foreground.dimensions(),
            background: background.dimensions(),
        });
    }

    let mut mask = key_mask(foreground, range);
    let mut frame = Frame::new(foreground.width(), foreground.height());

    for ((out, (fg, bg)), m) in frame
        .pixels_mut()
        .zip(foreground.pixels().zip(background.pixels()))
        .zip(mask.pixels_mut())
    {
        let key = m.0[0];
        let inverted = !key;
        for c in 0..3 {
            let fg_masked = fg.0[c] & inverted;
            let bg_masked = bg.0[c] & key;
            out.0[c] = fg_masked.saturating_add(bg_masked);
        }
        // Hand back foreground coverage
        m.0[0] = inverted;
    }

    Ok(Composite { frame, mask })
}

/// Attach a coverage mask to a frame as its alpha channel
///
/// The mask is re-thresholded so alpha is strictly 0 or 255.
pub fn alpha_still(source: &Frame, mask: &Mask) -> Option<AlphaStill> {
    if source.dimensions() != mask.dimensions() {
        return None;
    }

    Some(AlphaStill::from_fn(source.width(), source.height(), |x, y| {
        let [r, g, b] = source.get_pixel(x, y).0;
        let alpha = if mask.get_pixel(x, y).0[0] >= MASK_THRESHOLD {
            u8::MAX
        } else {
            0
        };
        image::Rgba([r, g, b, alpha])
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::solid;

    const GREEN: [u8; 3] = [0, 255, 0];
    const BLUE: [u8; 3] = [0, 0, 255];
    const RED: [u8; 3] = [255, 0, 0];

    #[test]
    fn test_green_foreground_shows_background() {
        let fg = solid(10, 10, GREEN);
        let bg = solid(10, 10, BLUE);

        let out = composite(&fg, &bg, &ChromaKeyRange::default()).unwrap();

        assert_eq!(out.frame.dimensions(), (10, 10));
        assert!(out.frame.pixels().all(|p| p.0 == BLUE));
        assert!(out.mask.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn test_red_foreground_is_retained() {
        let fg = solid(10, 10, RED);
        let bg = solid(10, 10, BLUE);

        let out = composite(&fg, &bg, &ChromaKeyRange::default()).unwrap();

        assert!(out.frame.pixels().all(|p| p.0 == RED));
        assert!(out.mask.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn test_mixed_frame_is_pixel_disjoint() {
        let fg = Frame::from_fn(16, 16, |x, y| {
            image::Rgb([(x * 16) as u8, ((x + y) * 8) as u8, (y * 16) as u8])
        });
        let bg = Frame::from_fn(16, 16, |x, y| image::Rgb([(y * 3) as u8, 7, (x * 5) as u8]));

        let out = composite(&fg, &bg, &ChromaKeyRange::default()).unwrap();

        for (x, y, p) in out.frame.enumerate_pixels() {
            let f = fg.get_pixel(x, y);
            let b = bg.get_pixel(x, y);
            assert!(p == f || p == b, "pixel ({}, {}) was blended", x, y);
            let covered = out.mask.get_pixel(x, y).0[0] == 255;
            assert_eq!(p == f, covered || f == b);
        }
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let fg = solid(10, 10, GREEN);
        let bg = solid(5, 10, BLUE);

        let err = composite(&fg, &bg, &ChromaKeyRange::default()).unwrap_err();
        assert_eq!(
            err,
            CompositeError::DimensionMismatch {
                foreground: (10, 10),
                background: (5, 10)
            }
        );
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let range = ChromaKeyRange::new(Hsv::new(60, 255, 255), Hsv::new(60, 255, 255));
        assert!(range.contains(Hsv::new(60, 255, 255)));
        assert!(!range.contains(Hsv::new(61, 255, 255)));
    }

    #[test]
    fn test_alpha_still_uses_mask_as_alpha() {
        let src = solid(2, 1, RED);
        let mask = Mask::from_raw(2, 1, vec![200, 10]).unwrap();

        let still = alpha_still(&src, &mask).unwrap();
        assert_eq!(still.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(still.get_pixel(1, 0).0, [255, 0, 0, 0]);
    }

    #[test]
    fn test_alpha_still_rejects_mismatched_mask() {
        let src = solid(2, 2, RED);
        let mask = Mask::new(1, 1);
        assert!(alpha_still(&src, &mask).is_none());
    }
}
