// SPDX-License-Identifier: GPL-3.0-only

//! Recording session state machine
//!
//! ```text
//!            open()                close()
//!   Idle ───────────────▶ Recording ─────────▶ Idle
//!    ▲                        │ open() (closes first)
//!    └────────────────────────┘
//! ```
//!
//! There is no paused state. Every `open` starts a fresh session with the
//! still counter at zero; `close` is safe to call in any state.

use super::{PolicyVerdict, SinkFactory, VideoSink, WriteFailurePolicy};
use crate::backends::camera::{CaptureDevice, NegotiatedFormat};
use crate::constants::output::{
    FX_STREAM_STEM, IMAGE_SEQUENCE_DIR, RAW_STREAM_STEM, STILL_PREFIX,
};
use crate::errors::{WriterError, WriterResult};
use crate::frame::{Frame, Mask};
use crate::pipelines::compositor::alpha_still;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    Idle,
    Recording,
}

/// The three outputs of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    Raw,
    Fx,
    Still,
}

impl std::fmt::Display for SinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SinkKind::Raw => write!(f, "raw"),
            SinkKind::Fx => write!(f, "fx"),
            SinkKind::Still => write!(f, "still"),
        }
    }
}

/// Per-sink results of one `save_frame` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameWriteReport {
    pub raw: WriterResult<()>,
    pub fx: WriterResult<()>,
    pub still: WriterResult<()>,
    /// The most severe policy outcome across the three sinks
    pub verdict: PolicyVerdict,
    /// Sink responsible for a non-`Continue` verdict
    pub culprit: Option<SinkKind>,
}

impl FrameWriteReport {
    fn idle() -> Self {
        Self {
            raw: Err(WriterError::SinkUnavailable),
            fx: Err(WriterError::SinkUnavailable),
            still: Err(WriterError::SinkUnavailable),
            verdict: PolicyVerdict::Continue,
            culprit: None,
        }
    }

    pub fn all_ok(&self) -> bool {
        self.raw.is_ok() && self.fx.is_ok() && self.still.is_ok()
    }
}

/// What a closed session produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub directory: PathBuf,
    pub raw: Option<WriterResult<PathBuf>>,
    pub fx: Option<WriterResult<PathBuf>>,
    pub stills_written: u64,
}

/// Consecutive failure streaks, one per sink
#[derive(Debug, Default, Clone, Copy)]
struct FailureStreaks {
    raw: u32,
    fx: u32,
    still: u32,
}

impl FailureStreaks {
    fn get_mut(&mut self, kind: SinkKind) -> &mut u32 {
        match kind {
            SinkKind::Raw => &mut self.raw,
            SinkKind::Fx => &mut self.fx,
            SinkKind::Still => &mut self.still,
        }
    }
}

/// Raw, composited and still-sequence outputs of one recording session
pub struct WriterPipeline {
    factory: Box<dyn SinkFactory>,
    policy: WriteFailurePolicy,
    state: WriterState,
    directory: Option<PathBuf>,
    raw_sink: Option<Box<dyn VideoSink>>,
    fx_sink: Option<Box<dyn VideoSink>>,
    still_dir: Option<PathBuf>,
    still_counter: u64,
    streaks: FailureStreaks,
    /// Mirrors `state` for readers on other threads
    active: Arc<AtomicBool>,
}

impl WriterPipeline {
    /// Create an idle pipeline
    pub fn new(factory: Box<dyn SinkFactory>, policy: WriteFailurePolicy) -> Self {
        Self {
            factory,
            policy,
            state: WriterState::Idle,
            directory: None,
            raw_sink: None,
            fx_sink: None,
            still_dir: None,
            still_counter: 0,
            streaks: FailureStreaks::default(),
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Shared flag that is set while a session is open
    ///
    /// Stays accurate when the pipeline lives on another thread, including
    /// sessions ended by the failure policy.
    pub fn recording_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.active)
    }

    /// Start a session in `directory` sized to the device's negotiated format
    ///
    /// Returns the raw and fx open results independently. The session enters
    /// `Recording` even when one or both video sinks fail; failed sinks are
    /// skipped on every write.
    pub fn open(
        &mut self,
        directory: &Path,
        device: &CaptureDevice,
    ) -> (WriterResult<()>, WriterResult<()>) {
        match device.format() {
            Some(format) => self.open_with_format(directory, &format),
            None => {
                let not_connected = |stem: &str| WriterError::SinkOpenFailed {
                    path: self.video_path(directory, stem),
                    reason: "capture device is not connected".into(),
                };
                (Err(not_connected(RAW_STREAM_STEM)), Err(not_connected(FX_STREAM_STEM)))
            }
        }
    }

    /// Start a session in `directory` for an explicit format
    pub fn open_with_format(
        &mut self,
        directory: &Path,
        format: &NegotiatedFormat,
    ) -> (WriterResult<()>, WriterResult<()>) {
        if self.state == WriterState::Recording {
            warn!("Recording session already open, closing it first");
            self.close();
        }

        info!(directory = %directory.display(), format = %format, "Opening recording session");

        self.still_counter = 0;
        self.streaks = FailureStreaks::default();

        let raw_path = self.video_path(directory, RAW_STREAM_STEM);
        let raw = match self.factory.open_video(&raw_path, format) {
            Ok(sink) => {
                self.raw_sink = Some(sink);
                Ok(())
            }
            Err(e) => {
                error!(path = %raw_path.display(), error = %e, "Raw stream sink failed to open");
                Err(e)
            }
        };

        let fx_path = self.video_path(directory, FX_STREAM_STEM);
        let fx = match self.factory.open_video(&fx_path, format) {
            Ok(sink) => {
                self.fx_sink = Some(sink);
                Ok(())
            }
            Err(e) => {
                error!(path = %fx_path.display(), error = %e, "Composited stream sink failed to open");
                Err(e)
            }
        };

        self.still_dir = Some(directory.join(IMAGE_SEQUENCE_DIR));
        self.directory = Some(directory.to_path_buf());
        self.state = WriterState::Recording;
        self.active.store(true, Ordering::SeqCst);

        (raw, fx)
    }

    /// Write one tick's frames to every open sink
    ///
    /// The still counter advances only when the still is written.
    pub fn save_frame(&mut self, raw: &Frame, mask: &Mask, fx: &Frame) -> FrameWriteReport {
        if self.state != WriterState::Recording {
            return FrameWriteReport::idle();
        }

        let raw_result = match self.raw_sink.as_mut() {
            Some(sink) => sink.write(raw),
            None => Err(WriterError::SinkUnavailable),
        };
        let fx_result = match self.fx_sink.as_mut() {
            Some(sink) => sink.write(fx),
            None => Err(WriterError::SinkUnavailable),
        };
        let still_result = self.save_still(raw, mask);

        let mut verdict = PolicyVerdict::Continue;
        let mut culprit = None;
        for (kind, result) in [
            (SinkKind::Raw, &raw_result),
            (SinkKind::Fx, &fx_result),
            (SinkKind::Still, &still_result),
        ] {
            let outcome = self.track(kind, result);
            if severity(outcome) > severity(verdict) {
                verdict = outcome;
                culprit = Some(kind);
            }
        }

        FrameWriteReport {
            raw: raw_result,
            fx: fx_result,
            still: still_result,
            verdict,
            culprit,
        }
    }

    fn save_still(&mut self, raw: &Frame, mask: &Mask) -> WriterResult<()> {
        let dir = self.still_dir.as_ref().ok_or(WriterError::SinkUnavailable)?;
        let still = alpha_still(raw, mask).ok_or_else(|| {
            WriterError::InvalidFrame(format!(
                "Mask {}x{} doesn't match frame {}x{}",
                mask.width(),
                mask.height(),
                raw.width(),
                raw.height()
            ))
        })?;

        let path = dir.join(format!("{}{}.png", STILL_PREFIX, self.still_counter));
        self.factory.write_still(&path, &still)?;
        self.still_counter += 1;
        Ok(())
    }

    /// Update the failure streak for one sink and judge it
    fn track(&mut self, kind: SinkKind, result: &WriterResult<()>) -> PolicyVerdict {
        let streak = self.streaks.get_mut(kind);
        match result {
            Ok(()) => {
                *streak = 0;
                PolicyVerdict::Continue
            }
            Err(WriterError::SinkUnavailable) => PolicyVerdict::Continue,
            Err(e) => {
                *streak += 1;
                let failures = *streak;
                debug!(sink = %kind, failures, error = %e, "Write failed");
                let verdict = self.policy.evaluate(failures);
                match verdict {
                    PolicyVerdict::Degraded { .. } => {
                        warn!(sink = %kind, failures, "Recording degraded");
                    }
                    PolicyVerdict::Abort { .. } => {
                        error!(sink = %kind, failures, "Too many write failures, ending session");
                    }
                    PolicyVerdict::Continue => {}
                }
                verdict
            }
        }
    }

    /// End the session, finalizing whichever video sinks are open
    ///
    /// Returns `None` when already idle.
    pub fn close(&mut self) -> Option<SessionSummary> {
        let raw = self.raw_sink.take().map(|sink| sink.finish());
        let fx = self.fx_sink.take().map(|sink| sink.finish());
        let directory = self.directory.take();
        let stills_written = self.still_counter;

        let was_recording = self.state == WriterState::Recording;
        self.state = WriterState::Idle;
        self.active.store(false, Ordering::SeqCst);
        self.still_counter = 0;
        self.still_dir = None;
        self.streaks = FailureStreaks::default();

        if !was_recording {
            return None;
        }

        let summary = SessionSummary {
            directory: directory.unwrap_or_default(),
            raw,
            fx,
            stills_written,
        };
        info!(
            directory = %summary.directory.display(),
            stills = summary.stills_written,
            "Recording session closed"
        );
        Some(summary)
    }

    fn video_path(&self, directory: &Path, stem: &str) -> PathBuf {
        directory.join(format!("{}.{}", stem, self.factory.container_extension()))
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == WriterState::Recording
    }

    /// Stills written in the current session
    pub fn still_counter(&self) -> u64 {
        self.still_counter
    }

    pub fn has_raw_sink(&self) -> bool {
        self.raw_sink.is_some()
    }

    pub fn has_fx_sink(&self) -> bool {
        self.fx_sink.is_some()
    }

    pub fn session_dir(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    pub fn still_dir(&self) -> Option<&Path> {
        self.still_dir.as_deref()
    }

    pub fn policy(&self) -> WriteFailurePolicy {
        self.policy
    }
}

impl Drop for WriterPipeline {
    fn drop(&mut self) {
        self.close();
    }
}

fn severity(verdict: PolicyVerdict) -> u8 {
    match verdict {
        PolicyVerdict::Continue => 0,
        PolicyVerdict::Degraded { .. } => 1,
        PolicyVerdict::Abort { .. } => 2,
    }
}
