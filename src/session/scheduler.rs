// SPDX-License-Identifier: GPL-3.0-only

//! The capture loop
//!
//! One scheduler thread exists per connected device. Each tick runs, in order:
//!
//! 1. Handle pending recording commands
//! 2. Pull a camera frame (failure skips the rest of the tick)
//! 3. Pull a background frame (`None` skips the rest of the tick)
//! 4. Resize the background to the camera frame if their sizes differ
//! 5. Composite
//! 6. Write raw, fx and still outputs if recording
//! 7. Publish the composite to the presentation channel
//!
//! Commands are only looked at in step 1, so a recording can never start or
//! stop between pulling a camera frame and writing it.

use super::events::{SchedulerCommand, SessionEvent, emit};
use super::ticker::{Ticker, period_for_fps};
use crate::backends::background::FrameSource;
use crate::backends::camera::CaptureDevice;
use crate::constants::scheduler::FRAME_LOG_INTERVAL;
use crate::errors::{AppError, AppResult, CompositeError, DeviceError};
use crate::frame::{self, Frame};
use crate::pipelines::compositor::{ChromaKeyRange, composite};
use crate::pipelines::video::{PolicyVerdict, WriterPipeline};
use crate::storage;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, trace, warn};

/// Latest composite frame, shared with the presentation layer
pub type FramePublisher = watch::Sender<Option<Arc<Frame>>>;

/// Everything a scheduler owns, handed back when it exits
pub struct SchedulerParts {
    pub device: CaptureDevice,
    pub background: FrameSource,
    pub writer: WriterPipeline,
    pub frames: FramePublisher,
    pub events: mpsc::Sender<SessionEvent>,
}

/// Result of one tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// A composite was produced and published
    Composited { recorded: bool },
    /// The camera had no frame; nothing else ran
    CameraSkipped(DeviceError),
    /// The background had no frame; nothing was composited
    BackgroundSkipped,
    /// Frames could not be composited
    CompositeFailed(CompositeError),
}

pub struct CaptureScheduler {
    parts: SchedulerParts,
    chroma_key: ChromaKeyRange,
    commands: mpsc::Receiver<SchedulerCommand>,
    ticks: u64,
    composited: u64,
    camera_failures: u64,
    background_failures: u64,
}

impl CaptureScheduler {
    pub fn new(
        parts: SchedulerParts,
        chroma_key: ChromaKeyRange,
        commands: mpsc::Receiver<SchedulerCommand>,
    ) -> Self {
        Self {
            parts,
            chroma_key,
            commands,
            ticks: 0,
            composited: 0,
            camera_failures: 0,
            background_failures: 0,
        }
    }

    /// Run one tick
    pub fn tick(&mut self) -> TickOutcome {
        self.ticks += 1;
        self.handle_commands();

        let parts = &mut self.parts;

        // 2. Camera
        if let Err(e) = parts.device.try_next_frame().map(|_| ()) {
            self.camera_failures += 1;
            if self.camera_failures == 1 {
                warn!(error = %e, "Camera frame unavailable, skipping tick");
                emit(&parts.events, SessionEvent::FrameReadFailed(e.clone()));
            } else {
                trace!(error = %e, failures = self.camera_failures, "Camera frame unavailable");
            }
            return TickOutcome::CameraSkipped(e);
        }
        if self.camera_failures > 0 {
            info!(after = self.camera_failures, "Camera frames flowing again");
            emit(
                &parts.events,
                SessionEvent::FrameReadRecovered {
                    after: self.camera_failures,
                },
            );
            self.camera_failures = 0;
        }
        let Some(foreground) = parts.device.frame() else {
            return TickOutcome::CameraSkipped(DeviceError::NotConnected);
        };

        // 3. Background
        let Some(background) = parts.background.next_frame() else {
            self.background_failures += 1;
            if self.background_failures == 1 {
                warn!(path = %parts.background.path().display(), "Background frame unavailable, skipping tick");
                emit(&parts.events, SessionEvent::BackgroundSkipped);
            }
            return TickOutcome::BackgroundSkipped;
        };
        self.background_failures = 0;

        // 4. Resize into a separate buffer; the source's own frame is never touched
        let resized;
        let background = if frame::same_dimensions(background, foreground) {
            background
        } else {
            trace!(
                from = ?background.dimensions(),
                to = ?foreground.dimensions(),
                "Resizing background"
            );
            resized = frame::resize_to(background, foreground.width(), foreground.height());
            &resized
        };

        // 5. Composite
        let result = match composite(foreground, background, &self.chroma_key) {
            Ok(result) => result,
            Err(e) => {
                warn!(error = %e, "Composite failed");
                return TickOutcome::CompositeFailed(e);
            }
        };

        // 6. Record
        let recorded = parts.writer.is_recording();
        if recorded {
            let report = parts.writer.save_frame(foreground, &result.mask, &result.frame);
            match (report.verdict, report.culprit) {
                (PolicyVerdict::Degraded { failures }, Some(sink)) => {
                    emit(&parts.events, SessionEvent::RecordingDegraded { sink, failures });
                }
                (PolicyVerdict::Abort { failures }, Some(sink)) => {
                    emit(&parts.events, SessionEvent::RecordingAborted { sink, failures });
                    if let Some(summary) = parts.writer.close() {
                        emit(&parts.events, SessionEvent::RecordingStopped(summary));
                    }
                }
                _ => {}
            }
            if parts.writer.is_recording() {
                emit(
                    &parts.events,
                    SessionEvent::RecordingProgress {
                        stills: parts.writer.still_counter(),
                    },
                );
            }
        }

        // 7. Present
        parts.frames.send_replace(Some(Arc::new(result.frame)));

        self.composited += 1;
        if self.composited % FRAME_LOG_INTERVAL == 0 {
            debug!(
                frame = self.composited,
                ticks = self.ticks,
                recording = recorded,
                "Composited frames"
            );
        }

        TickOutcome::Composited { recorded }
    }

    fn handle_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            let parts = &mut self.parts;
            match command {
                SchedulerCommand::StopRecording => {
                    if let Some(summary) = parts.writer.close() {
                        emit(&parts.events, SessionEvent::RecordingStopped(summary));
                    } else {
                        debug!("Stop requested while not recording");
                    }
                }
                SchedulerCommand::StartRecording { directory } => {
                    if let Some(summary) = parts.writer.close() {
                        emit(&parts.events, SessionEvent::RecordingStopped(summary));
                    }
                    let (raw, fx) = parts.writer.open(&directory, &parts.device);
                    emit(
                        &parts.events,
                        SessionEvent::RecordingStarted { directory, raw, fx },
                    );
                }
            }
        }
    }

    /// Drop commands still queued once the loop is told to stop
    ///
    /// A start that never ran must not open sinks only to close them again,
    /// so its directory is removed instead. Stops are covered by the close
    /// that follows.
    fn discard_pending_commands(&mut self) {
        while let Ok(command) = self.commands.try_recv() {
            if let SchedulerCommand::StartRecording { directory } = command {
                debug!(directory = %directory.display(), "Dropping recording start queued before stop");
                storage::discard_session_dir(&directory);
            }
        }
    }

    /// Tick until `stop` is raised, then close any open recording
    ///
    /// A panicking tick ends the loop early; the parts are still handed back.
    pub fn run(mut self, stop: &AtomicBool) -> SchedulerParts {
        let fps = self.parts.device.format().map(|f| f.fps()).unwrap_or(0.0);
        let mut ticker = Ticker::new(period_for_fps(fps));
        info!(fps, period_ms = ticker.period().as_millis() as u64, "Capture scheduler running");

        while !stop.load(Ordering::SeqCst) {
            if panic::catch_unwind(AssertUnwindSafe(|| self.tick())).is_err() {
                error!(ticks = self.ticks, "Capture tick panicked, stopping scheduler");
                break;
            }
            if !ticker.wait(stop) {
                break;
            }
        }

        self.discard_pending_commands();
        if let Some(summary) = self.parts.writer.close() {
            emit(&self.parts.events, SessionEvent::RecordingStopped(summary));
        }

        info!(
            ticks = self.ticks,
            composited = self.composited,
            "Capture scheduler stopped"
        );
        self.parts
    }

    pub fn parts(&self) -> &SchedulerParts {
        &self.parts
    }

    pub fn into_parts(self) -> SchedulerParts {
        self.parts
    }
}

/// A scheduler thread that could not be started
///
/// Carries the parts back so the caller can keep using them.
pub struct SpawnError {
    pub error: AppError,
    pub parts: Option<SchedulerParts>,
}

impl std::fmt::Debug for SpawnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnError")
            .field("error", &self.error)
            .field("parts_returned", &self.parts.is_some())
            .finish()
    }
}

impl std::fmt::Display for SpawnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for SpawnError {}

impl From<SpawnError> for AppError {
    fn from(e: SpawnError) -> Self {
        e.error
    }
}

/// A scheduler running on its own thread
pub struct SchedulerHandle {
    thread_handle: Option<JoinHandle<Option<SchedulerParts>>>,
    stop_signal: Arc<AtomicBool>,
    commands: mpsc::Sender<SchedulerCommand>,
    name: String,
}

impl SchedulerHandle {
    /// Start `scheduler` on a named thread
    pub fn spawn(
        name: &str,
        scheduler: CaptureScheduler,
        commands: mpsc::Sender<SchedulerCommand>,
    ) -> Result<Self, SpawnError> {
        let stop_signal = Arc::new(AtomicBool::new(false));
        let stop_signal_clone = Arc::clone(&stop_signal);

        info!(name = %name, "Starting capture scheduler thread");

        // The scheduler waits in a slot so a failed spawn can give it back
        let slot = Arc::new(Mutex::new(Some(scheduler)));
        let thread_slot = Arc::clone(&slot);

        let spawned = thread::Builder::new().name(name.to_string()).spawn(move || {
            let scheduler = thread_slot.lock().ok().and_then(|mut slot| slot.take());
            scheduler.map(|scheduler| scheduler.run(&stop_signal_clone))
        });

        let thread_handle = match spawned {
            Ok(handle) => handle,
            Err(e) => {
                error!(name = %name, error = %e, "Failed to spawn capture scheduler");
                let parts = slot
                    .lock()
                    .ok()
                    .and_then(|mut slot| slot.take())
                    .map(CaptureScheduler::into_parts);
                return Err(SpawnError {
                    error: AppError::Session(format!("Failed to spawn scheduler: {}", e)),
                    parts,
                });
            }
        };

        Ok(Self {
            thread_handle: Some(thread_handle),
            stop_signal,
            commands,
            name: name.to_string(),
        })
    }

    /// Queue a command for the next tick
    pub fn send(&self, command: SchedulerCommand) -> AppResult<()> {
        self.commands
            .try_send(command)
            .map_err(|e| AppError::Session(format!("Scheduler did not accept command: {}", e)))
    }

    pub fn is_running(&self) -> bool {
        self.thread_handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Stop the loop and wait for it to hand its parts back
    ///
    /// Returns `None` if already stopped or if the thread panicked.
    pub fn stop(&mut self) -> Option<SchedulerParts> {
        debug!(name = %self.name, "Requesting scheduler stop");
        self.stop_signal.store(true, Ordering::SeqCst);

        let handle = self.thread_handle.take()?;
        match handle.join() {
            Ok(parts) => {
                debug!(name = %self.name, "Scheduler thread finished");
                parts
            }
            Err(e) => {
                warn!(name = %self.name, "Scheduler thread panicked: {:?}", e);
                None
            }
        }
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        if self.thread_handle.is_some() {
            debug!(name = %self.name, "SchedulerHandle dropped, stopping loop");
            self.stop();
        }
    }
}
