// SPDX-License-Identifier: GPL-3.0-only

//! Frame producers
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │             Capture Scheduler                │
//! └──────────┬───────────────────────┬──────────┘
//!            │ foreground            │ background
//! ┌──────────┴──────────┐ ┌──────────┴──────────┐
//! │   CaptureDevice     │ │    FrameSource      │
//! │  (V4L2/GStreamer)   │ │ (image or looping   │
//! │                     │ │  video)             │
//! └─────────────────────┘ └─────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`camera`]: Capture devices, enumeration and the GStreamer backend
//! - [`background`]: Still image and looping video backgrounds

pub mod background;
pub mod camera;
