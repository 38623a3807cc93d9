// SPDX-License-Identifier: GPL-3.0-only

//! UI-facing session control
//!
//! The controller turns the four presentation intents (select device, start
//! recording, stop recording, shut down) into scheduler lifecycle changes.
//! Switching devices always quiesces the running scheduler first, so no tick
//! is ever in flight against a device that is being closed.

use super::events::{SchedulerCommand, SessionEvent, emit};
use super::scheduler::{CaptureScheduler, SchedulerHandle, SchedulerParts};
use crate::backends::background::FrameSource;
use crate::backends::camera::{CaptureDevice, DeviceSelector, GstCaptureBackend, NegotiatedFormat};
use crate::config::Config;
use crate::constants::background::FILL_RGB;
use crate::constants::scheduler::{COMMAND_CAPACITY, EVENT_CAPACITY};
use crate::errors::{AppError, AppResult};
use crate::frame::Frame;
use crate::pipelines::compositor::ChromaKeyRange;
use crate::pipelines::video::{GstSinkFactory, WriterPipeline};
use crate::storage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, watch};
use tracing::{error, info, warn};

/// Settings fixed for the lifetime of a controller
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSettings {
    pub chroma_key: ChromaKeyRange,
    pub output_root: PathBuf,
}

impl From<&Config> for SessionSettings {
    fn from(config: &Config) -> Self {
        Self {
            chroma_key: config.chroma_key,
            output_root: config.output_root.clone(),
        }
    }
}

pub struct SessionController {
    settings: SessionSettings,
    /// Present while a scheduler is running
    running: Option<SchedulerHandle>,
    /// Present while no scheduler is running
    idle: Option<SchedulerParts>,
    frames: watch::Receiver<Option<Arc<Frame>>>,
    events: Option<mpsc::Receiver<SessionEvent>>,
    /// The writer's own flag, so sessions the scheduler ends are seen here
    recording: Arc<AtomicBool>,
    recording_dir: Option<PathBuf>,
    generation: u32,
}

impl SessionController {
    /// Create a controller around a disconnected device
    ///
    /// Nothing runs until [`SessionController::select_capture_device`] succeeds.
    pub fn new(
        device: CaptureDevice,
        background: FrameSource,
        writer: WriterPipeline,
        settings: SessionSettings,
    ) -> Self {
        let (frames_tx, frames_rx) = watch::channel(None);
        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);
        let recording = writer.recording_flag();

        Self {
            settings,
            running: None,
            idle: Some(SchedulerParts {
                device,
                background,
                writer,
                frames: frames_tx,
                events: events_tx,
            }),
            frames: frames_rx,
            events: Some(events_rx),
            recording,
            recording_dir: None,
            generation: 0,
        }
    }

    /// Build a controller on the GStreamer capture and recording backends
    ///
    /// Without a configured background a solid fill is used. The device is
    /// left disconnected.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        crate::media::gst::init().map_err(AppError::Session)?;

        let device = CaptureDevice::new(Arc::new(GstCaptureBackend::new()), config.capture);
        let background = match &config.background {
            Some(path) => FrameSource::open(path)?,
            None => {
                info!("No background configured, using a solid fill");
                FrameSource::solid(config.capture.width, config.capture.height, FILL_RGB)?
            }
        };
        info!(
            kind = background.kind(),
            path = %background.path().display(),
            "Background source ready"
        );

        let factory = GstSinkFactory::for_extension(&config.video_container)?;
        let writer = WriterPipeline::new(Box::new(factory), config.write_failure_policy);

        Ok(Self::new(device, background, writer, SessionSettings::from(config)))
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    /// Receiver for the latest composite frame
    pub fn frames(&self) -> watch::Receiver<Option<Arc<Frame>>> {
        self.frames.clone()
    }

    /// Take the status event receiver (only the first call gets it)
    pub fn take_events(&mut self) -> Option<mpsc::Receiver<SessionEvent>> {
        self.events.take()
    }

    /// Stop the scheduler, if running, and reclaim its parts
    fn quiesce(&mut self) -> Option<SchedulerParts> {
        if let Some(mut handle) = self.running.take() {
            let parts = handle.stop();
            if parts.is_none() {
                error!("Scheduler did not return its resources");
            }
            parts
        } else {
            self.idle.take()
        }
    }

    fn launch(&mut self, parts: SchedulerParts) -> AppResult<()> {
        let (commands_tx, commands_rx) = mpsc::channel(COMMAND_CAPACITY);
        self.generation += 1;
        let name = format!("capture-scheduler-{}", self.generation);

        let scheduler = CaptureScheduler::new(parts, self.settings.chroma_key, commands_rx);
        match SchedulerHandle::spawn(&name, scheduler, commands_tx) {
            Ok(handle) => {
                self.running = Some(handle);
                Ok(())
            }
            Err(e) => {
                // Keep the parts so a later select or shutdown still works
                self.idle = e.parts;
                Err(e.error)
            }
        }
    }

    /// Switch to another capture device and restart the scheduler
    ///
    /// Any recording in progress is closed. If the new device fails to open,
    /// the previous device is reconnected and the error is returned.
    pub fn select_capture_device(
        &mut self,
        selector: &DeviceSelector,
    ) -> AppResult<NegotiatedFormat> {
        let Some(mut parts) = self.quiesce() else {
            return Err(AppError::Session("Session resources are gone".into()));
        };
        self.recording_dir = None;

        let previous = parts.device.selector().cloned();
        parts.device.disconnect();

        let result = match parts.device.connect(selector) {
            Ok(format) => {
                emit(
                    &parts.events,
                    SessionEvent::DeviceConnected {
                        selector: selector.clone(),
                        format,
                    },
                );
                Ok(format)
            }
            Err(e) => {
                warn!(device = %selector, error = %e, "Failed to open capture device");
                emit(
                    &parts.events,
                    SessionEvent::DeviceFailed {
                        selector: selector.clone(),
                        error: e.clone(),
                    },
                );
                if let Some(previous) = previous.filter(|p| p != selector) {
                    match parts.device.connect(&previous) {
                        Ok(format) => {
                            info!(device = %previous, "Reconnected previous capture device");
                            emit(
                                &parts.events,
                                SessionEvent::DeviceConnected {
                                    selector: previous,
                                    format,
                                },
                            );
                        }
                        Err(e) => warn!(device = %previous, error = %e, "Previous device is gone too"),
                    }
                }
                Err(AppError::Device(e))
            }
        };

        if parts.device.is_connected() {
            self.launch(parts)?;
        } else {
            self.idle = Some(parts);
        }

        result
    }

    /// Create a session directory and tell the scheduler to start writing
    ///
    /// Fails without entering the recording state when the output root cannot
    /// be created or written.
    pub fn start_recording(&mut self) -> AppResult<PathBuf> {
        let Some(handle) = self.running.as_ref() else {
            return Err(AppError::Session("No capture device is active".into()));
        };

        storage::init_output_dir(&self.settings.output_root)?;
        let directory = storage::create_session_dir(&self.settings.output_root, &chrono::Local::now())?;

        if let Err(e) = handle.send(SchedulerCommand::StartRecording {
            directory: directory.clone(),
        }) {
            storage::discard_session_dir(&directory);
            return Err(e);
        }
        // Set now so the state is right before the scheduler picks the command up
        self.recording.store(true, Ordering::SeqCst);
        self.recording_dir = Some(directory.clone());
        Ok(directory)
    }

    pub fn stop_recording(&mut self) -> AppResult<()> {
        let Some(handle) = self.running.as_ref() else {
            return Ok(());
        };
        handle.send(SchedulerCommand::StopRecording)?;
        self.recording.store(false, Ordering::SeqCst);
        self.recording_dir = None;
        Ok(())
    }

    /// Directory of the recording in progress
    pub fn recording_dir(&self) -> Option<&Path> {
        self.recording_dir.as_deref().filter(|_| self.is_recording())
    }

    /// A session is open, or has been requested and not yet stopped
    ///
    /// Goes false on its own when the scheduler ends a session after too many
    /// write failures.
    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    pub fn is_running(&self) -> bool {
        self.running.as_ref().is_some_and(|h| h.is_running())
    }

    /// Stop the scheduler and release the device
    ///
    /// Blocks until the scheduler has exited and finalized any recording.
    /// Safe to call more than once.
    pub fn shutdown(&mut self) {
        if let Some(mut parts) = self.quiesce() {
            if let Some(summary) = parts.writer.close() {
                emit(&parts.events, SessionEvent::RecordingStopped(summary));
            }
            parts.device.disconnect();
            self.idle = Some(parts);
        }
        self.recording_dir = None;
        info!("Session shut down");
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        if self.running.is_some() {
            self.shutdown();
        }
    }
}
