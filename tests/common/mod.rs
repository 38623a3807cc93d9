// SPDX-License-Identifier: GPL-3.0-only

//! In-memory capture, background and sink doubles shared by the integration tests

#![allow(dead_code)]

use greenscreen::backends::background::{FrameSource, LoopingVideo, VideoReader};
use greenscreen::backends::camera::{
    CaptureBackend, CaptureRequest, CaptureStream, DeviceSelector, Framerate, NegotiatedFormat,
};
use greenscreen::errors::{DeviceError, DeviceResult, SourceError, SourceResult, WriterError, WriterResult};
use greenscreen::frame::{AlphaStill, Frame, solid};
use greenscreen::pipelines::video::{SinkFactory, VideoSink};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const GREEN: [u8; 3] = [0, 255, 0];
pub const BLUE: [u8; 3] = [0, 0, 255];
pub const RED: [u8; 3] = [255, 0, 0];

/// Unique scratch directory under the system temp dir
pub fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "greenscreen-test-{}-{}-{}",
        name,
        std::process::id(),
        chrono::Local::now().timestamp_nanos_opt().unwrap_or_default()
    ));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// A fake camera that returns a solid frame per read
#[derive(Clone)]
pub struct FakeCamera {
    pub color: [u8; 3],
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Errors returned by the next reads, in order
    pub failures: Arc<Mutex<VecDeque<DeviceError>>>,
    pub reads: Arc<AtomicUsize>,
    /// Reads panic while set, like a crashing driver binding
    pub panics: Arc<AtomicBool>,
}

impl FakeCamera {
    pub fn new(color: [u8; 3], width: u32, height: u32) -> Self {
        Self {
            color,
            width,
            height,
            fps: 200,
            failures: Arc::new(Mutex::new(VecDeque::new())),
            reads: Arc::new(AtomicUsize::new(0)),
            panics: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps;
        self
    }

    pub fn fail_next(&self, errors: impl IntoIterator<Item = DeviceError>) {
        self.failures.lock().unwrap().extend(errors);
    }
}

struct FakeStream {
    camera: FakeCamera,
}

impl CaptureStream for FakeStream {
    fn format(&self) -> NegotiatedFormat {
        NegotiatedFormat {
            width: self.camera.width,
            height: self.camera.height,
            framerate: Framerate::new(self.camera.fps, 1),
        }
    }

    fn read_into(&mut self, buffer: &mut Frame) -> DeviceResult<()> {
        self.camera.reads.fetch_add(1, Ordering::SeqCst);
        if self.camera.panics.load(Ordering::SeqCst) {
            panic!("camera driver crashed");
        }
        if let Some(e) = self.camera.failures.lock().unwrap().pop_front() {
            return Err(e);
        }
        *buffer = solid(self.camera.width, self.camera.height, self.camera.color);
        Ok(())
    }

    fn close(&mut self) {}
}

/// Backend serving [`FakeCamera`]s by index; unknown indices fail to open
#[derive(Default)]
pub struct FakeBackend {
    cameras: Mutex<HashMap<u32, FakeCamera>>,
    pub opens: AtomicUsize,
}

impl FakeBackend {
    pub fn with_camera(self, index: u32, camera: FakeCamera) -> Self {
        self.cameras.lock().unwrap().insert(index, camera);
        self
    }

    pub fn unplug(&self, index: u32) {
        self.cameras.lock().unwrap().remove(&index);
    }
}

impl CaptureBackend for FakeBackend {
    fn open(
        &self,
        selector: &DeviceSelector,
        _request: &CaptureRequest,
    ) -> DeviceResult<Box<dyn CaptureStream>> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let camera = match selector {
            DeviceSelector::Index(index) => self.cameras.lock().unwrap().get(index).cloned(),
            DeviceSelector::Path(_) => None,
        };
        match camera {
            Some(camera) => Ok(Box::new(FakeStream { camera })),
            None => Err(DeviceError::OpenFailed(selector.device_path())),
        }
    }
}

/// Video reader over a fixed list that counts how many reads it served
pub struct CountingReader {
    frames: Vec<Frame>,
    position: usize,
    pub reads: Arc<AtomicUsize>,
}

impl VideoReader for CountingReader {
    fn read_into(&mut self, buffer: &mut Frame) -> SourceResult<()> {
        let frame = self.frames.get(self.position).ok_or(SourceError::Exhausted)?;
        buffer.clone_from(frame);
        self.position += 1;
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn rewind(&mut self) -> SourceResult<()> {
        self.position = 0;
        Ok(())
    }
}

/// Looping background over `frames`, with a counter of successful reads
pub fn looping_background(frames: Vec<Frame>) -> (FrameSource, Arc<AtomicUsize>) {
    let reads = Arc::new(AtomicUsize::new(0));
    let reader = CountingReader {
        frames,
        position: 0,
        reads: Arc::clone(&reads),
    };
    let source = FrameSource::LoopingVideo(LoopingVideo::with_reader(
        Path::new("loop.mp4"),
        Box::new(reader),
    ));
    (source, reads)
}

/// What the memory sinks received
#[derive(Debug, Default)]
pub struct SinkLog {
    /// Frames accepted per video path
    pub videos: HashMap<PathBuf, Vec<Frame>>,
    /// Finished video paths in completion order
    pub finished: Vec<PathBuf>,
    pub stills: Vec<(PathBuf, AlphaStill)>,
}

/// Failure switches for [`MemoryFactory`]
#[derive(Debug, Default, Clone)]
pub struct SinkFaults {
    /// Video files whose stem contains one of these fail to open
    pub fail_open: Vec<&'static str>,
    /// Video files whose stem contains one of these reject every frame
    pub fail_write: Vec<&'static str>,
    pub fail_stills: bool,
}

#[derive(Clone, Default)]
pub struct MemoryFactory {
    pub log: Arc<Mutex<SinkLog>>,
    pub faults: SinkFaults,
}

impl MemoryFactory {
    pub fn with_faults(faults: SinkFaults) -> Self {
        Self {
            log: Arc::default(),
            faults,
        }
    }
}

fn stem_matches(path: &Path, needles: &[&str]) -> bool {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    needles.iter().any(|n| stem.contains(n))
}

impl SinkFactory for MemoryFactory {
    fn container_extension(&self) -> &str {
        "mp4"
    }

    fn open_video(
        &self,
        path: &Path,
        _format: &NegotiatedFormat,
    ) -> WriterResult<Box<dyn VideoSink>> {
        if stem_matches(path, &self.faults.fail_open) {
            return Err(WriterError::SinkOpenFailed {
                path: path.to_path_buf(),
                reason: "refused".into(),
            });
        }
        self.log
            .lock()
            .unwrap()
            .videos
            .insert(path.to_path_buf(), Vec::new());
        Ok(Box::new(MemorySink {
            path: path.to_path_buf(),
            log: Arc::clone(&self.log),
            fail: stem_matches(path, &self.faults.fail_write),
            written: 0,
        }))
    }

    fn write_still(&self, path: &Path, still: &AlphaStill) -> WriterResult<()> {
        if self.faults.fail_stills {
            return Err(WriterError::StillWriteFailed {
                path: path.to_path_buf(),
                reason: "disk full".into(),
            });
        }
        self.log
            .lock()
            .unwrap()
            .stills
            .push((path.to_path_buf(), still.clone()));
        Ok(())
    }
}

struct MemorySink {
    path: PathBuf,
    log: Arc<Mutex<SinkLog>>,
    fail: bool,
    written: u64,
}

impl VideoSink for MemorySink {
    fn write(&mut self, frame: &Frame) -> WriterResult<()> {
        if self.fail {
            return Err(WriterError::FrameWriteFailed("encoder stalled".into()));
        }
        self.log
            .lock()
            .unwrap()
            .videos
            .entry(self.path.clone())
            .or_default()
            .push(frame.clone());
        self.written += 1;
        Ok(())
    }

    fn finish(self: Box<Self>) -> WriterResult<PathBuf> {
        self.log.lock().unwrap().finished.push(self.path.clone());
        Ok(self.path)
    }

    fn frames_written(&self) -> u64 {
        self.written
    }
}
