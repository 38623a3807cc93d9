// SPDX-License-Identifier: GPL-3.0-only

//! Camera capture
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────┐
//! │   CaptureScheduler  │
//! └──────────┬──────────┘
//!            │ next_frame()
//!            ▼
//! ┌─────────────────────┐
//! │    CaptureDevice    │  ← Connection state, owned frame buffer
//! └──────────┬──────────┘
//!            │
//!            ▼
//! ┌─────────────────────┐
//! │ CaptureBackend Trait│  ← Opens a CaptureStream for a selector
//! └──────────┬──────────┘
//!            │
//!            ▼
//!     ┌──────────────┐
//!     │ GStreamer    │  ← v4l2src → videoconvert → appsink
//!     └──────────────┘
//! ```

pub mod device;
pub mod enumeration;
pub mod gstreamer;
pub mod types;

pub use device::CaptureDevice;
pub use enumeration::enumerate_capture_devices;
pub use gstreamer::GstCaptureBackend;
pub use types::*;

use crate::errors::DeviceResult;
use crate::frame::Frame;

/// Opens capture streams for device selectors
///
/// Implementations must be cheap to share; the session keeps one backend and
/// opens a new stream on every device switch.
pub trait CaptureBackend: Send + Sync {
    /// Open the hardware path named by `selector`
    ///
    /// `request` is a hint. The returned stream reports what was actually
    /// negotiated.
    fn open(
        &self,
        selector: &DeviceSelector,
        request: &CaptureRequest,
    ) -> DeviceResult<Box<dyn CaptureStream>>;
}

/// An open camera stream
pub trait CaptureStream: Send {
    /// Settings the hardware delivered
    fn format(&self) -> NegotiatedFormat;

    /// Read the next frame into `buffer`, reallocating it only when the
    /// geometry changes
    ///
    /// Must return promptly: a stalled device yields `ReadFailed`, not a hang.
    fn read_into(&mut self, buffer: &mut Frame) -> DeviceResult<()>;

    /// Release the hardware
    fn close(&mut self);
}
