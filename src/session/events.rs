// SPDX-License-Identifier: GPL-3.0-only

//! Messages between the UI and the scheduler thread

use crate::backends::camera::{DeviceSelector, NegotiatedFormat};
use crate::errors::{DeviceError, WriterResult};
use crate::pipelines::video::{SessionSummary, SinkKind};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::trace;

/// Requests delivered to the scheduler, handled at the top of a tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerCommand {
    /// Open a recording session in an already created directory
    StartRecording { directory: PathBuf },
    StopRecording,
}

/// Status reported to the UI
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    DeviceConnected {
        selector: DeviceSelector,
        format: NegotiatedFormat,
    },
    DeviceFailed {
        selector: DeviceSelector,
        error: DeviceError,
    },
    /// First failed read in a streak
    FrameReadFailed(DeviceError),
    /// Reads are succeeding again after a failure streak
    FrameReadRecovered { after: u64 },
    /// First skipped background frame in a streak
    BackgroundSkipped,
    RecordingStarted {
        directory: PathBuf,
        raw: WriterResult<()>,
        fx: WriterResult<()>,
    },
    RecordingProgress { stills: u64 },
    RecordingDegraded { sink: SinkKind, failures: u32 },
    RecordingAborted { sink: SinkKind, failures: u32 },
    RecordingStopped(SessionSummary),
}

impl std::fmt::Display for SessionEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionEvent::DeviceConnected { selector, format } => {
                write!(f, "Device {} connected ({})", selector, format)
            }
            SessionEvent::DeviceFailed { selector, error } => {
                write!(f, "Device {} failed: {}", selector, error)
            }
            SessionEvent::FrameReadFailed(error) => write!(f, "Camera read failed: {}", error),
            SessionEvent::FrameReadRecovered { after } => {
                write!(f, "Camera recovered after {} failed reads", after)
            }
            SessionEvent::BackgroundSkipped => write!(f, "Background frame unavailable"),
            SessionEvent::RecordingStarted { directory, raw, fx } => {
                write!(f, "Recording to {}", directory.display())?;
                if let Err(e) = raw {
                    write!(f, " (raw stream off: {})", e)?;
                }
                if let Err(e) = fx {
                    write!(f, " (fx stream off: {})", e)?;
                }
                Ok(())
            }
            SessionEvent::RecordingProgress { stills } => write!(f, "{} stills saved", stills),
            SessionEvent::RecordingDegraded { sink, failures } => {
                write!(f, "Recording degraded: {} sink failed {} times in a row", sink, failures)
            }
            SessionEvent::RecordingAborted { sink, failures } => {
                write!(f, "Recording stopped: {} sink failed {} times in a row", sink, failures)
            }
            SessionEvent::RecordingStopped(summary) => write!(
                f,
                "Recording saved to {} ({} stills)",
                summary.directory.display(),
                summary.stills_written
            ),
        }
    }
}

/// Send without blocking; a full or closed channel drops the event
pub fn emit(events: &mpsc::Sender<SessionEvent>, event: SessionEvent) {
    if let Err(e) = events.try_send(event) {
        trace!(error = %e, "Session event dropped");
    }
}
