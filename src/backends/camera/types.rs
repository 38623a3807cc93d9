// SPDX-License-Identifier: GPL-3.0-only

//! Shared types for capture backends

use crate::constants::capture::{
    TARGET_FRAMERATE, TARGET_HEIGHT, TARGET_WIDTH, V4L2_DEVICE_PREFIX,
};
use crate::errors::DeviceError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Names the hardware path to open
///
/// Serialized as a bare number or string (`0`, `"/dev/video2"`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DeviceSelector {
    /// Numeric index, resolved to `/dev/video<N>`
    Index(u32),
    /// Explicit device path or symbolic id
    Path(String),
}

impl DeviceSelector {
    /// Device node path handed to the capture pipeline
    pub fn device_path(&self) -> String {
        match self {
            DeviceSelector::Index(index) => format!("{}{}", V4L2_DEVICE_PREFIX, index),
            DeviceSelector::Path(path) => path.clone(),
        }
    }
}

impl FromStr for DeviceSelector {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(DeviceError::InvalidSelector(s.to_string()));
        }
        match trimmed.parse::<u32>() {
            Ok(index) => Ok(DeviceSelector::Index(index)),
            Err(_) => Ok(DeviceSelector::Path(trimmed.to_string())),
        }
    }
}

impl std::fmt::Display for DeviceSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceSelector::Index(index) => write!(f, "{}", index),
            DeviceSelector::Path(path) => write!(f, "{}", path),
        }
    }
}

impl Default for DeviceSelector {
    fn default() -> Self {
        DeviceSelector::Index(0)
    }
}

/// Framerate as a fraction (numerator/denominator)
///
/// Stores the exact rate so NTSC rates like 29.97fps (30000/1001) survive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Framerate {
    pub num: u32,
    pub denom: u32,
}

impl Framerate {
    /// Create a new framerate from numerator and denominator
    pub fn new(num: u32, denom: u32) -> Self {
        Self {
            num,
            denom: if denom == 0 { 1 } else { denom },
        }
    }

    /// Approximate a floating point rate with millihertz precision
    pub fn from_f64(fps: f64) -> Self {
        if !fps.is_finite() || fps <= 0.0 {
            return Self::new(0, 1);
        }
        if fps.fract() == 0.0 {
            Self::new(fps as u32, 1)
        } else {
            Self::new((fps * 1000.0).round() as u32, 1000)
        }
    }

    /// Get the framerate as a floating point value
    pub fn as_f64(&self) -> f64 {
        self.num as f64 / self.denom as f64
    }

    /// Variable-rate sources report 0/1
    pub fn is_known(&self) -> bool {
        self.num > 0
    }
}

impl std::fmt::Display for Framerate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.denom != 1 {
            write!(f, "{:.2}", self.as_f64())
        } else {
            write!(f, "{}", self.num)
        }
    }
}

impl Default for Framerate {
    fn default() -> Self {
        Self::from_f64(TARGET_FRAMERATE)
    }
}

/// Requested capture settings (best effort)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureRequest {
    pub width: u32,
    pub height: u32,
    pub framerate: f64,
}

impl Default for CaptureRequest {
    fn default() -> Self {
        Self {
            width: TARGET_WIDTH,
            height: TARGET_HEIGHT,
            framerate: TARGET_FRAMERATE,
        }
    }
}

/// Settings the hardware actually delivered after opening
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegotiatedFormat {
    pub width: u32,
    pub height: u32,
    pub framerate: Framerate,
}

impl NegotiatedFormat {
    pub fn fps(&self) -> f64 {
        self.framerate.as_f64()
    }
}

impl std::fmt::Display for NegotiatedFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{} @ {}fps", self.width, self.height, self.framerate)
    }
}

/// A capture device that answered the enumeration probe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Probe index
    pub index: u32,
    /// Device node path (e.g. /dev/video0)
    pub path: String,
    /// V4L2 card name
    pub card: String,
    /// V4L2 driver name
    pub driver: String,
}

impl DeviceInfo {
    pub fn selector(&self) -> DeviceSelector {
        DeviceSelector::Index(self.index)
    }
}
