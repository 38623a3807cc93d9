// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for constants module

use greenscreen::constants::{capture, chroma_key, file_formats, output};
use greenscreen::media::encoders::bitrate_kbps;
use greenscreen::session::period_for_fps;
use std::time::Duration;

#[test]
fn test_key_range_is_ordered() {
    for c in 0..3 {
        assert!(chroma_key::LOWER_GREEN[c] <= chroma_key::UPPER_GREEN[c]);
    }
    assert!(chroma_key::UPPER_GREEN[0] <= chroma_key::HUE_MAX);
}

#[test]
fn test_target_capture_mode() {
    assert_eq!((capture::TARGET_WIDTH, capture::TARGET_HEIGHT), (864, 480));
    assert_eq!(period_for_fps(capture::TARGET_FRAMERATE), Duration::from_millis(41));
    assert_eq!(capture::MAX_PROBED_DEVICES, 10);
}

#[test]
fn test_output_names() {
    assert_eq!(output::RAW_STREAM_STEM, "stream_raw_output");
    assert_eq!(output::FX_STREAM_STEM, "stream_fx_output");
    assert_eq!(output::IMAGE_SEQUENCE_DIR, "image_sequence");
    assert_eq!(output::STILL_PREFIX, "output_image_");
}

#[test]
fn test_file_format_detection() {
    assert!(file_formats::is_image_extension("PNG"));
    assert!(file_formats::is_video_extension("mkv"));
    assert!(!file_formats::is_image_extension("mp4"));
    assert!(!file_formats::is_video_extension("txt"));
}

#[test]
fn test_bitrate_scales_with_resolution() {
    let sd = bitrate_kbps(640, 480);
    let hd = bitrate_kbps(1280, 720);
    let fhd = bitrate_kbps(1920, 1080);

    assert!(sd < hd);
    assert!(hd < fhd);
}
