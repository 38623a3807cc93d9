// SPDX-License-Identifier: GPL-3.0-only

//! Application-wide constants

use std::time::Duration;

/// Chroma key defaults
///
/// Bounds are in OpenCV's 8-bit HSV convention: hue 0-180, saturation and
/// value 0-255. The defaults bracket studio green.
pub mod chroma_key {
    /// Lower inclusive bound (hue, saturation, value)
    pub const LOWER_GREEN: [u8; 3] = [22, 6, 35];

    /// Upper inclusive bound (hue, saturation, value)
    pub const UPPER_GREEN: [u8; 3] = [85, 255, 255];

    /// Largest representable hue value
    pub const HUE_MAX: u8 = 180;

    /// Mask values at or above this are treated as foreground when building alpha stills
    pub const MASK_THRESHOLD: u8 = 128;
}

/// Capture request defaults (a request, not a guarantee)
pub mod capture {
    /// Requested frame width
    pub const TARGET_WIDTH: u32 = 864;

    /// Requested frame height
    pub const TARGET_HEIGHT: u32 = 480;

    /// Requested frame rate
    pub const TARGET_FRAMERATE: f64 = 24.0;

    /// Device indices probed during enumeration (0..MAX_PROBED_DEVICES)
    pub const MAX_PROBED_DEVICES: usize = 10;

    /// Device path prefix for numeric selectors
    pub const V4L2_DEVICE_PREFIX: &str = "/dev/video";
}

/// Output layout produced by a recording session
pub mod output {
    /// Folder created under the user's video directory
    pub const DEFAULT_FOLDER: &str = "Greenscreen";

    /// Fallback output root when no video directory is known
    pub const FALLBACK_ROOT: &str = "./output";

    /// Raw camera stream file stem
    pub const RAW_STREAM_STEM: &str = "stream_raw_output";

    /// Composited stream file stem
    pub const FX_STREAM_STEM: &str = "stream_fx_output";

    /// Still sequence subdirectory
    pub const IMAGE_SEQUENCE_DIR: &str = "image_sequence";

    /// Still sequence file prefix (`output_image_<N>.png`)
    pub const STILL_PREFIX: &str = "output_image_";

    /// Probe file used to test write permission
    pub const PROBE_FILE: &str = "dummyfile.tmp";

    /// Session directory timestamp format
    pub const SESSION_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H-%M-%S";

    /// Default video container extension
    pub const DEFAULT_CONTAINER: &str = "mp4";

    /// Log file written in terminal mode
    pub const LOG_FILE: &str = "greenscreen.log";
}

/// GStreamer pipeline constants
pub mod pipeline {
    use super::Duration;

    /// Pixel format exchanged with appsink/appsrc
    pub const RAW_FORMAT: &str = "RGB";

    /// Longest a single camera pull may block before the tick is abandoned
    pub const CAPTURE_PULL_TIMEOUT: Duration = Duration::from_millis(100);

    /// Longest a background video pull may block
    pub const VIDEO_PULL_TIMEOUT: Duration = Duration::from_secs(2);

    /// Time allowed for a pipeline to preroll after starting
    pub const PREROLL_TIMEOUT: Duration = Duration::from_secs(5);

    /// Time allowed for EOS to propagate to the muxer on close
    pub const EOS_TIMEOUT: Duration = Duration::from_secs(5);

    /// Time spent checking the bus for immediate errors after start
    pub const START_CHECK_TIMEOUT: Duration = Duration::from_millis(200);
}

/// Scheduler constants
pub mod scheduler {
    use super::Duration;

    /// Pending UI commands buffered for the scheduler
    pub const COMMAND_CAPACITY: usize = 8;

    /// Status events buffered for the UI
    pub const EVENT_CAPACITY: usize = 64;

    /// Shortest tick period
    pub const MIN_PERIOD: Duration = Duration::from_millis(1);

    /// Frame counter modulo for periodic logging
    pub const FRAME_LOG_INTERVAL: u64 = 100;
}

/// Background source constants
pub mod background {
    /// Fill color used when no background file is configured
    pub const FILL_RGB: [u8; 3] = [0, 0, 255];

    /// Name reported for the solid fill source
    pub const FILL_LABEL: &str = "solid-fill";
}

/// Supported file formats for the background source
pub mod file_formats {
    /// Supported image file extensions
    pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

    /// Supported video file extensions
    pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "avi", "mov"];

    /// Check if a file extension is a supported image format
    pub fn is_image_extension(ext: &str) -> bool {
        IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }

    /// Check if a file extension is a supported video format
    pub fn is_video_extension(ext: &str) -> bool {
        VIDEO_EXTENSIONS.contains(&ext.to_lowercase().as_str())
    }
}
