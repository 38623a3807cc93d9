// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the compositing pipeline
//!
//! Every error below is recoverable at the scheduler tick boundary except
//! [`StorageError`] raised while preparing the output root at startup.

use std::fmt;
use std::path::PathBuf;

/// Result type alias using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for capture device operations
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Result type alias for background source operations
pub type SourceResult<T> = Result<T, SourceError>;

/// Result type alias for writer operations
pub type WriterResult<T> = Result<T, WriterError>;

/// Main application error type
#[derive(Debug, Clone)]
pub enum AppError {
    /// Capture device errors
    Device(DeviceError),
    /// Background source errors
    Source(SourceError),
    /// Recording sink errors
    Writer(WriterError),
    /// Output directory errors
    Storage(StorageError),
    /// Configuration errors
    Config(ConfigError),
    /// Scheduler is not running or rejected the request
    Session(String),
}

/// Capture device errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The hardware path could not be opened
    OpenFailed(String),
    /// The device selector could not be parsed
    InvalidSelector(String),
    /// A frame was requested while the device was disconnected
    NotConnected,
    /// The underlying read reported the stream closed
    Closed,
    /// The read did not complete (timeout or pipeline error)
    ReadFailed(String),
    /// The read returned a zero-sized buffer
    EmptyFrame,
}

/// Background frame source errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The source file could not be opened or decoded at load time
    OpenFailed { path: PathBuf, reason: String },
    /// The file extension is neither a known image nor video format
    UnsupportedFormat(String),
    /// The reader hit end-of-stream
    Exhausted,
    /// A frame could not be decoded
    Decode(String),
}

/// Recording sink errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriterError {
    /// A video sink could not be created
    SinkOpenFailed { path: PathBuf, reason: String },
    /// The sink is not open (failed to open or no session active)
    SinkUnavailable,
    /// A frame could not be pushed into a video sink
    FrameWriteFailed(String),
    /// A still image could not be written
    StillWriteFailed { path: PathBuf, reason: String },
    /// The frame does not match the sink's negotiated geometry
    InvalidFrame(String),
    /// The sink could not be finalized
    FinalizeFailed(String),
    /// No muxer is known for the configured container extension
    UnsupportedContainer(String),
}

/// Output directory errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The directory does not exist and could not be created
    CreateFailed { path: PathBuf, reason: String },
    /// The directory cannot be read
    PermissionDenied(PathBuf),
    /// The directory exists but a probe file cannot be written into it
    NotWritable { path: PathBuf, reason: String },
    /// Any other I/O failure while probing
    Other(String),
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The config file exists but could not be read
    Read(String),
    /// The config file is not valid JSON for [`crate::config::Config`]
    Parse(String),
    /// The config file could not be written
    Write(String),
    /// A value is out of range
    Invalid(String),
}

/// Compositor precondition violations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompositeError {
    /// Foreground and background dimensions differ
    DimensionMismatch {
        foreground: (u32, u32),
        background: (u32, u32),
    },
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Device(e) => write!(f, "Capture device error: {}", e),
            AppError::Source(e) => write!(f, "Background source error: {}", e),
            AppError::Writer(e) => write!(f, "Recording error: {}", e),
            AppError::Storage(e) => write!(f, "Storage error: {}", e),
            AppError::Config(e) => write!(f, "Configuration error: {}", e),
            AppError::Session(msg) => write!(f, "Session error: {}", msg),
        }
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::OpenFailed(msg) => write!(f, "Failed to open capture device: {}", msg),
            DeviceError::InvalidSelector(sel) => write!(f, "Invalid device selector: {}", sel),
            DeviceError::NotConnected => write!(f, "Capture device not connected"),
            DeviceError::Closed => write!(f, "Capture device closed"),
            DeviceError::ReadFailed(msg) => write!(f, "Frame read failed: {}", msg),
            DeviceError::EmptyFrame => write!(f, "Capture device returned an empty frame"),
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::OpenFailed { path, reason } => {
                write!(f, "Could not open background '{}': {}", path.display(), reason)
            }
            SourceError::UnsupportedFormat(ext) => {
                write!(f, "Unsupported background format: {}", ext)
            }
            SourceError::Exhausted => write!(f, "Background stream exhausted"),
            SourceError::Decode(msg) => write!(f, "Background decode failed: {}", msg),
        }
    }
}

impl fmt::Display for WriterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriterError::SinkOpenFailed { path, reason } => {
                write!(f, "Could not open writer '{}': {}", path.display(), reason)
            }
            WriterError::SinkUnavailable => write!(f, "Writer not open"),
            WriterError::FrameWriteFailed(msg) => write!(f, "Frame write failed: {}", msg),
            WriterError::StillWriteFailed { path, reason } => {
                write!(f, "Could not save still '{}': {}", path.display(), reason)
            }
            WriterError::InvalidFrame(msg) => write!(f, "Invalid frame: {}", msg),
            WriterError::FinalizeFailed(msg) => write!(f, "Could not finalize writer: {}", msg),
            WriterError::UnsupportedContainer(ext) => {
                write!(f, "Unsupported video container '{}'", ext)
            }
        }
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageError::CreateFailed { path, reason } => write!(
                f,
                "Could not create output directory '{}': {}",
                path.display(),
                reason
            ),
            StorageError::PermissionDenied(path) => {
                write!(f, "Unable to read output directory '{}'", path.display())
            }
            StorageError::NotWritable { path, reason } => write!(
                f,
                "Output directory '{}' is not writable: {}",
                path.display(),
                reason
            ),
            StorageError::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Read(msg) => write!(f, "Failed to read config: {}", msg),
            ConfigError::Parse(msg) => write!(f, "Failed to parse config: {}", msg),
            ConfigError::Write(msg) => write!(f, "Failed to write config: {}", msg),
            ConfigError::Invalid(msg) => write!(f, "Invalid config value: {}", msg),
        }
    }
}

impl fmt::Display for CompositeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompositeError::DimensionMismatch {
                foreground,
                background,
            } => write!(
                f,
                "Foreground {}x{} does not match background {}x{}",
                foreground.0, foreground.1, background.0, background.1
            ),
        }
    }
}

impl std::error::Error for AppError {}
impl std::error::Error for DeviceError {}
impl std::error::Error for SourceError {}
impl std::error::Error for WriterError {}
impl std::error::Error for StorageError {}
impl std::error::Error for ConfigError {}
impl std::error::Error for CompositeError {}

impl From<DeviceError> for AppError {
    fn from(err: DeviceError) -> Self {
        AppError::Device(err)
    }
}

impl From<SourceError> for AppError {
    fn from(err: SourceError) -> Self {
        AppError::Source(err)
    }
}

impl From<WriterError> for AppError {
    fn from(err: WriterError) -> Self {
        AppError::Writer(err)
    }
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        AppError::Storage(err)
    }
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err)
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Other(err.to_string())
    }
}
