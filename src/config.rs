// SPDX-License-Identifier: GPL-3.0-only

//! User configuration
//!
//! Stored as JSON at `<config dir>/greenscreen/config.json`. Every field has a
//! default, so a partial file only overrides what it names. Command-line flags
//! are applied on top of the loaded values by the binary.

use crate::backends::camera::{CaptureRequest, DeviceSelector};
use crate::errors::ConfigError;
use crate::media::encoders::ContainerFormat;
use crate::pipelines::compositor::ChromaKeyRange;
use crate::pipelines::video::WriteFailurePolicy;
use crate::storage::default_output_root;
use crate::constants::output::DEFAULT_CONTAINER;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const CONFIG_DIR: &str = "greenscreen";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HSV range replaced by the background
    pub chroma_key: ChromaKeyRange,
    /// Root under which session directories are created
    pub output_root: PathBuf,
    /// Background image or video; kind is inferred from the extension
    pub background: Option<PathBuf>,
    /// Requested capture mode (the device may negotiate something else)
    pub capture: CaptureRequest,
    /// Capture device to open at startup
    pub device: DeviceSelector,
    /// Reaction to repeated write failures while recording
    pub write_failure_policy: WriteFailurePolicy,
    /// Container extension for the recorded streams
    pub video_container: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            chroma_key: ChromaKeyRange::default(),
            output_root: default_output_root(),
            background: None,
            capture: CaptureRequest::default(),
            device: DeviceSelector::default(),
            write_failure_policy: WriteFailurePolicy::default(),
            video_container: DEFAULT_CONTAINER.to_string(),
        }
    }
}

impl Config {
    /// Location of the user's config file
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR).join(CONFIG_FILE))
    }

    /// Load from an explicit path; a missing file yields defaults
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Read(format!("{}: {}", path.display(), e))),
        };

        let config: Self =
            serde_json::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;

        info!(path = %path.display(), "Loaded config");
        Ok(config)
    }

    /// Write the config as pretty-printed JSON, creating parent directories
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::Write(format!("{}: {}", parent.display(), e)))?;
        }
        let json =
            serde_json::to_string_pretty(self).map_err(|e| ConfigError::Write(e.to_string()))?;
        std::fs::write(path, json)
            .map_err(|e| ConfigError::Write(format!("{}: {}", path.display(), e)))
    }

    /// Reject values no session could run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.chroma_key.is_valid() {
            return Err(ConfigError::Invalid(
                "chroma_key lower bound exceeds upper bound".into(),
            ));
        }
        if !(self.capture.framerate.is_finite() && self.capture.framerate > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "capture.framerate must be positive, got {}",
                self.capture.framerate
            )));
        }
        if self.capture.width == 0 || self.capture.height == 0 {
            return Err(ConfigError::Invalid("capture size must be non-zero".into()));
        }
        if self.container().is_none() {
            return Err(ConfigError::Invalid(format!(
                "unsupported video_container '{}'",
                self.video_container
            )));
        }
        Ok(())
    }

    /// Parsed `video_container`
    pub fn container(&self) -> Option<ContainerFormat> {
        ContainerFormat::from_extension(&self.video_container)
    }
}
