// SPDX-License-Identifier: GPL-3.0-only

//! Live green-screen compositing for V4L2 cameras
//!
//! A capture scheduler pulls a camera frame and a background frame every
//! tick, replaces the keyed color range of the camera frame with the
//! background, and publishes the result for preview. While a recording
//! session is open the raw and composited streams are encoded to video files
//! and each frame is also saved as an RGBA still with the keyed area
//! transparent.
//!
//! # Architecture
//!
//! - **Backends** ([`backends`]): capture devices and background sources
//! - **Pipelines** ([`pipelines`]): chroma key compositor and recording sinks
//! - **Session** ([`session`]): scheduler thread and UI-facing controller
//! - **Terminal** ([`terminal`]): half-block preview and keyboard control
//!
//! # Modules
//!
//! - [`config`]: User configuration
//! - [`constants`]: Defaults and tuning values
//! - [`errors`]: Error types
//! - [`frame`]: Frame, mask and HSV helpers
//! - [`media`]: GStreamer helpers and encoder selection
//! - [`storage`]: Output directory management

pub mod backends;
pub mod config;
pub mod constants;
pub mod errors;
pub mod frame;
pub mod media;
pub mod pipelines;
pub mod session;
pub mod storage;
pub mod terminal;

pub use config::Config;
pub use errors::{AppError, AppResult};
pub use session::{SessionController, SessionEvent};
