// SPDX-License-Identifier: GPL-3.0-only

//! Frame processing pipelines
//!
//! ```text
//! ┌──────────────┐     ┌───────────────────┐     ┌──────────────────┐
//! │ Camera Frame │ ──▶ │    Compositor     │ ──▶ │  Preview (watch) │
//! │ Background   │     │  - HSV key mask   │     └──────────────────┘
//! └──────────────┘     │  - mask select    │     ┌──────────────────┐
//!                      └─────────┬─────────┘ ──▶ │  WriterPipeline  │
//!                                │               │  - raw stream    │
//!                                └─────────────▶ │  - fx stream     │
//!                                                │  - RGBA stills   │
//!                                                └──────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`compositor`]: Chroma keying and alpha still generation
//! - [`video`]: Recording sessions and GStreamer video sinks

pub mod compositor;
pub mod video;
