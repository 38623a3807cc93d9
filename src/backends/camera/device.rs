// SPDX-License-Identifier: GPL-3.0-only

//! Capture device lifecycle
//!
//! A [`CaptureDevice`] is constructed disconnected. `connect` opens the
//! hardware, records the negotiated settings and allocates the frame buffer.
//! The buffer is overwritten in place on every successful `next_frame`, so
//! borrows of it never outlive a tick.

use super::{CaptureBackend, CaptureStream, DeviceSelector, NegotiatedFormat};
use super::types::CaptureRequest;
use crate::errors::{DeviceError, DeviceResult};
use crate::frame::{self, Frame};
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct CaptureDevice {
    backend: Arc<dyn CaptureBackend>,
    request: CaptureRequest,
    selector: Option<DeviceSelector>,
    stream: Option<Box<dyn CaptureStream>>,
    format: Option<NegotiatedFormat>,
    buffer: Option<Frame>,
    frames_read: u64,
}

impl CaptureDevice {
    /// Create a disconnected device
    pub fn new(backend: Arc<dyn CaptureBackend>, request: CaptureRequest) -> Self {
        Self {
            backend,
            request,
            selector: None,
            stream: None,
            format: None,
            buffer: None,
            frames_read: 0,
        }
    }

    /// Open the hardware named by `selector`
    ///
    /// On failure the device is left exactly as it was. Connecting an already
    /// connected device releases the old stream first.
    pub fn connect(&mut self, selector: &DeviceSelector) -> DeviceResult<NegotiatedFormat> {
        info!(device = %selector, "Mounting capture device");

        let stream = self.backend.open(selector, &self.request)?;
        let mut format = stream.format();

        if !format.framerate.is_known() {
            warn!(
                device = %selector,
                requested = self.request.framerate,
                "Device did not report a frame rate, assuming the requested rate"
            );
            format.framerate = super::Framerate::from_f64(self.request.framerate);
        }

        self.disconnect();

        info!(device = %selector, format = %format, "Capture device connected");
        self.buffer = Some(Frame::new(format.width, format.height));
        self.stream = Some(stream);
        self.format = Some(format);
        self.selector = Some(selector.clone());
        self.frames_read = 0;

        Ok(format)
    }

    /// Release the hardware; no-op when already disconnected
    pub fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            debug!(device = ?self.selector, frames = self.frames_read, "Closing capture device");
            stream.close();
        }
        self.buffer = None;
        self.format = None;
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some() && self.buffer.is_some()
    }

    /// Pull the next frame into the internal buffer
    ///
    /// Returns false when disconnected, when the stream is closed, or when the
    /// read produced an empty buffer.
    pub fn next_frame(&mut self) -> bool {
        match self.try_next_frame() {
            Ok(_) => true,
            Err(e) => {
                debug!(device = ?self.selector, error = %e, "Frame pull failed");
                false
            }
        }
    }

    /// Pull the next frame, reporting why it failed
    pub fn try_next_frame(&mut self) -> DeviceResult<&Frame> {
        let (Some(stream), Some(buffer)) = (self.stream.as_mut(), self.buffer.as_mut()) else {
            return Err(DeviceError::NotConnected);
        };

        stream.read_into(buffer)?;
        if frame::is_empty(buffer) {
            return Err(DeviceError::EmptyFrame);
        }

        self.frames_read += 1;
        Ok(buffer)
    }

    /// The most recently pulled frame
    pub fn frame(&self) -> Option<&Frame> {
        self.buffer.as_ref()
    }

    /// Negotiated settings, present while connected
    pub fn format(&self) -> Option<NegotiatedFormat> {
        self.format
    }

    pub fn selector(&self) -> Option<&DeviceSelector> {
        self.selector.as_ref()
    }

    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }
}

impl Drop for CaptureDevice {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for CaptureDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureDevice")
            .field("selector", &self.selector)
            .field("connected", &self.is_connected())
            .field("format", &self.format)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::camera::Framerate;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct ScriptedStream {
        format: NegotiatedFormat,
        reads: Vec<DeviceResult<Frame>>,
        closed: Arc<AtomicUsize>,
    }

    impl CaptureStream for ScriptedStream {
        fn format(&self) -> NegotiatedFormat {
            self.format
        }

        fn read_into(&mut self, buffer: &mut Frame) -> DeviceResult<()> {
            if self.reads.is_empty() {
                return Err(DeviceError::Closed);
            }
            let frame = self.reads.remove(0)?;
            *buffer = frame;
            Ok(())
        }

        fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct ScriptedBackend {
        fail: bool,
        framerate: Framerate,
        reads: Mutex<Vec<DeviceResult<Frame>>>,
        closed: Arc<AtomicUsize>,
    }

    impl ScriptedBackend {
        fn new(reads: Vec<DeviceResult<Frame>>) -> Self {
            Self {
                fail: false,
                framerate: Framerate::new(30, 1),
                reads: Mutex::new(reads),
                closed: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl CaptureBackend for ScriptedBackend {
        fn open(
            &self,
            selector: &DeviceSelector,
            _request: &CaptureRequest,
        ) -> DeviceResult<Box<dyn CaptureStream>> {
            if self.fail {
                return Err(DeviceError::OpenFailed(selector.device_path()));
            }
            let reads = std::mem::take(&mut *self.reads.lock().unwrap());
            Ok(Box::new(ScriptedStream {
                format: NegotiatedFormat {
                    width: 4,
                    height: 2,
                    framerate: self.framerate,
                },
                reads,
                closed: Arc::clone(&self.closed),
            }))
        }
    }

    fn device(backend: ScriptedBackend) -> CaptureDevice {
        CaptureDevice::new(Arc::new(backend), CaptureRequest::default())
    }

    #[test]
    fn test_next_frame_before_connect() {
        let mut dev = device(ScriptedBackend::new(vec![]));
        assert!(!dev.next_frame());
        assert!(!dev.is_connected());
        assert_eq!(dev.try_next_frame().unwrap_err(), DeviceError::NotConnected);
    }

    #[test]
    fn test_connect_reports_actual_format() {
        let mut dev = device(ScriptedBackend::new(vec![]));
        let format = dev.connect(&DeviceSelector::Index(0)).unwrap();
        assert_eq!((format.width, format.height), (4, 2));
        assert!(dev.is_connected());
        assert_eq!(dev.frame().unwrap().dimensions(), (4, 2));
    }

    #[test]
    fn test_failed_connect_leaves_state_unchanged() {
        let mut backend = ScriptedBackend::new(vec![]);
        backend.fail = true;
        let mut dev = device(backend);

        let err = dev.connect(&DeviceSelector::Index(9)).unwrap_err();
        assert!(matches!(err, DeviceError::OpenFailed(_)));
        assert!(!dev.is_connected());
        assert!(dev.format().is_none());
    }

    #[test]
    fn test_unknown_framerate_falls_back_to_request() {
        let mut backend = ScriptedBackend::new(vec![]);
        backend.framerate = Framerate::new(0, 1);
        let mut dev = device(backend);

        let format = dev.connect(&DeviceSelector::Index(0)).unwrap();
        assert_eq!(format.fps(), CaptureRequest::default().framerate);
    }

    #[test]
    fn test_read_outcomes() {
        let frame = crate::frame::solid(4, 2, [1, 2, 3]);
        let mut dev = device(ScriptedBackend::new(vec![
            Ok(frame.clone()),
            Ok(Frame::new(0, 0)),
            Err(DeviceError::ReadFailed("timeout".into())),
        ]));
        dev.connect(&DeviceSelector::Index(0)).unwrap();

        assert!(dev.next_frame());
        assert_eq!(dev.frame().unwrap(), &frame);
        assert_eq!(dev.try_next_frame().unwrap_err(), DeviceError::EmptyFrame);
        assert!(!dev.next_frame());
        assert_eq!(dev.try_next_frame().unwrap_err(), DeviceError::Closed);
        assert_eq!(dev.frames_read(), 1);
        assert!(dev.is_connected());
    }

    #[test]
    fn test_disconnect_is_idempotent() {
        let backend = ScriptedBackend::new(vec![]);
        let closed = Arc::clone(&backend.closed);
        let mut dev = device(backend);
        dev.connect(&DeviceSelector::Index(0)).unwrap();

        dev.disconnect();
        dev.disconnect();

        assert!(!dev.is_connected());
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert!(!dev.next_frame());
    }
}
