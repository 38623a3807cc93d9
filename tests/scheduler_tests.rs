// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for the capture scheduler tick

mod common;

use common::*;
use greenscreen::backends::background::{FrameSource, StillImage};
use greenscreen::backends::camera::{CaptureDevice, CaptureRequest, DeviceSelector};
use greenscreen::errors::DeviceError;
use greenscreen::frame::{Frame, solid};
use greenscreen::pipelines::compositor::ChromaKeyRange;
use greenscreen::pipelines::video::{SinkKind, WriteFailurePolicy, WriterPipeline};
use greenscreen::session::{
    CaptureScheduler, SchedulerCommand, SchedulerHandle, SchedulerParts, SessionEvent, TickOutcome,
};
use greenscreen::storage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{mpsc, watch};

struct Harness {
    scheduler: CaptureScheduler,
    commands: mpsc::Sender<SchedulerCommand>,
    frames: watch::Receiver<Option<Arc<Frame>>>,
    events: mpsc::Receiver<SessionEvent>,
}

fn harness(
    camera: FakeCamera,
    background: FrameSource,
    factory: MemoryFactory,
    policy: WriteFailurePolicy,
) -> Harness {
    let backend = Arc::new(FakeBackend::default().with_camera(0, camera));
    let mut device = CaptureDevice::new(backend, CaptureRequest::default());
    device.connect(&DeviceSelector::Index(0)).unwrap();

    let (frames_tx, frames) = watch::channel(None);
    let (events_tx, events) = mpsc::channel(64);
    let (commands, commands_rx) = mpsc::channel(8);

    let parts = SchedulerParts {
        device,
        background,
        writer: WriterPipeline::new(Box::new(factory), policy),
        frames: frames_tx,
        events: events_tx,
    };

    Harness {
        scheduler: CaptureScheduler::new(parts, ChromaKeyRange::default(), commands_rx),
        commands,
        frames,
        events,
    }
}

fn still_background(width: u32, height: u32, rgb: [u8; 3]) -> FrameSource {
    FrameSource::Image(
        StillImage::from_frame(Path::new("bg.png"), solid(width, height, rgb)).unwrap(),
    )
}

fn drain(events: &mut mpsc::Receiver<SessionEvent>) -> Vec<SessionEvent> {
    let mut out = Vec::new();
    while let Ok(event) = events.try_recv() {
        out.push(event);
    }
    out
}

fn session_dir() -> PathBuf {
    PathBuf::from("/recordings/2024-01-01T00-00-00")
}

#[test]
fn test_green_camera_shows_background() {
    let mut h = harness(
        FakeCamera::new(GREEN, 8, 6),
        still_background(8, 6, BLUE),
        MemoryFactory::default(),
        WriteFailurePolicy::Tolerate,
    );

    assert_eq!(h.scheduler.tick(), TickOutcome::Composited { recorded: false });

    let frame = h.frames.borrow().clone().expect("composite published");
    assert_eq!(*frame, solid(8, 6, BLUE));
}

#[test]
fn test_red_camera_is_kept() {
    let mut h = harness(
        FakeCamera::new(RED, 8, 6),
        still_background(8, 6, BLUE),
        MemoryFactory::default(),
        WriteFailurePolicy::Tolerate,
    );

    h.scheduler.tick();

    let frame = h.frames.borrow().clone().unwrap();
    assert_eq!(*frame, solid(8, 6, RED));
}

#[test]
fn test_background_resized_without_touching_source() {
    let mut h = harness(
        FakeCamera::new(GREEN, 8, 6),
        still_background(4, 3, BLUE),
        MemoryFactory::default(),
        WriteFailurePolicy::Tolerate,
    );

    h.scheduler.tick();
    h.scheduler.tick();

    let frame = h.frames.borrow().clone().unwrap();
    assert_eq!(frame.dimensions(), (8, 6));
    assert_eq!(*frame, solid(8, 6, BLUE));

    match &h.scheduler.into_parts().background {
        FrameSource::Image(image) => assert_eq!(image.frame().dimensions(), (4, 3)),
        other => panic!("unexpected source {:?}", other),
    }
}

#[test]
fn test_camera_failure_does_not_advance_background() {
    let camera = FakeCamera::new(GREEN, 4, 4);
    camera.fail_next([DeviceError::ReadFailed("timeout".into())]);
    let (background, reads) = looping_background(vec![solid(4, 4, BLUE), solid(4, 4, RED)]);

    let mut h = harness(camera, background, MemoryFactory::default(), WriteFailurePolicy::Tolerate);

    assert_eq!(
        h.scheduler.tick(),
        TickOutcome::CameraSkipped(DeviceError::ReadFailed("timeout".into()))
    );
    assert_eq!(reads.load(Ordering::SeqCst), 0);
    assert!(h.frames.borrow().is_none());

    // The first background frame is still the next one served
    h.scheduler.tick();
    assert_eq!(reads.load(Ordering::SeqCst), 1);
    assert_eq!(*h.frames.borrow().clone().unwrap(), solid(4, 4, BLUE));
}

#[test]
fn test_failure_streak_reported_once() {
    let camera = FakeCamera::new(GREEN, 4, 4);
    camera.fail_next([DeviceError::Closed, DeviceError::Closed, DeviceError::Closed]);
    let mut h = harness(
        camera,
        still_background(4, 4, BLUE),
        MemoryFactory::default(),
        WriteFailurePolicy::Tolerate,
    );

    for _ in 0..4 {
        h.scheduler.tick();
    }

    let events = drain(&mut h.events);
    assert_eq!(
        events,
        vec![
            SessionEvent::FrameReadFailed(DeviceError::Closed),
            SessionEvent::FrameReadRecovered { after: 3 },
        ]
    );
}

#[test]
fn test_empty_background_skips_tick() {
    let (background, _) = looping_background(vec![]);
    let mut h = harness(
        FakeCamera::new(GREEN, 4, 4),
        background,
        MemoryFactory::default(),
        WriteFailurePolicy::Tolerate,
    );

    assert_eq!(h.scheduler.tick(), TickOutcome::BackgroundSkipped);
    assert_eq!(h.scheduler.tick(), TickOutcome::BackgroundSkipped);
    assert!(h.frames.borrow().is_none());
    assert_eq!(drain(&mut h.events), vec![SessionEvent::BackgroundSkipped]);
}

#[test]
fn test_recording_writes_every_sink() {
    let factory = MemoryFactory::default();
    let log = Arc::clone(&factory.log);
    let mut h = harness(
        FakeCamera::new(GREEN, 4, 2),
        still_background(4, 2, BLUE),
        factory,
        WriteFailurePolicy::Tolerate,
    );
    let dir = session_dir();

    h.commands
        .try_send(SchedulerCommand::StartRecording {
            directory: dir.clone(),
        })
        .unwrap();
    for _ in 0..3 {
        assert_eq!(h.scheduler.tick(), TickOutcome::Composited { recorded: true });
    }
    h.commands.try_send(SchedulerCommand::StopRecording).unwrap();
    assert_eq!(h.scheduler.tick(), TickOutcome::Composited { recorded: false });

    let log = log.lock().unwrap();
    let raw = &log.videos[&dir.join("stream_raw_output.mp4")];
    let fx = &log.videos[&dir.join("stream_fx_output.mp4")];
    assert_eq!(raw.len(), 3);
    assert_eq!(fx.len(), 3);
    assert_eq!(raw[0], solid(4, 2, GREEN));
    assert_eq!(fx[0], solid(4, 2, BLUE));
    assert_eq!(log.finished.len(), 2);

    let stills: Vec<&PathBuf> = log.stills.iter().map(|(path, _)| path).collect();
    assert_eq!(
        stills,
        vec![
            &dir.join("image_sequence/output_image_0.png"),
            &dir.join("image_sequence/output_image_1.png"),
            &dir.join("image_sequence/output_image_2.png"),
        ]
    );
    // Everything was keyed out, so the stills are fully transparent
    assert!(log.stills[0].1.pixels().all(|p| p.0 == [0, 255, 0, 0]));

    let events = drain(&mut h.events);
    assert!(events.contains(&SessionEvent::RecordingStarted {
        directory: dir.clone(),
        raw: Ok(()),
        fx: Ok(()),
    }));
    assert!(events.contains(&SessionEvent::RecordingProgress { stills: 3 }));
    let Some(SessionEvent::RecordingStopped(summary)) = events.last() else {
        panic!("expected a stop summary, got {:?}", events.last());
    };
    assert_eq!(summary.stills_written, 3);
    assert_eq!(summary.directory, dir);
}

#[test]
fn test_failed_sink_does_not_stop_others() {
    let factory = MemoryFactory::with_faults(SinkFaults {
        fail_open: vec!["stream_raw"],
        ..Default::default()
    });
    let log = Arc::clone(&factory.log);
    let mut h = harness(
        FakeCamera::new(RED, 2, 2),
        still_background(2, 2, BLUE),
        factory,
        WriteFailurePolicy::Abort { after: 1 },
    );

    h.commands
        .try_send(SchedulerCommand::StartRecording {
            directory: session_dir(),
        })
        .unwrap();
    h.scheduler.tick();
    h.scheduler.tick();

    // A sink that never opened is not a write failure
    assert!(h.scheduler.parts().writer.is_recording());
    let log = log.lock().unwrap();
    assert_eq!(log.videos.len(), 1);
    assert_eq!(log.stills.len(), 2);
    assert!(log.stills[0].1.pixels().all(|p| p.0 == [255, 0, 0, 255]));
}

#[test]
fn test_abort_policy_ends_session() {
    let factory = MemoryFactory::with_faults(SinkFaults {
        fail_write: vec!["stream_fx"],
        ..Default::default()
    });
    let log = Arc::clone(&factory.log);
    let mut h = harness(
        FakeCamera::new(GREEN, 2, 2),
        still_background(2, 2, BLUE),
        factory,
        WriteFailurePolicy::Abort { after: 2 },
    );

    h.commands
        .try_send(SchedulerCommand::StartRecording {
            directory: session_dir(),
        })
        .unwrap();
    h.scheduler.tick();
    assert!(h.scheduler.parts().writer.is_recording());
    h.scheduler.tick();
    assert!(!h.scheduler.parts().writer.is_recording());
    assert_eq!(h.scheduler.tick(), TickOutcome::Composited { recorded: false });

    let events = drain(&mut h.events);
    assert!(events.contains(&SessionEvent::RecordingAborted {
        sink: SinkKind::Fx,
        failures: 2,
    }));
    assert!(matches!(events.last(), Some(SessionEvent::RecordingStopped(_))));
    assert_eq!(log.lock().unwrap().finished.len(), 2);
}

#[test]
fn test_warn_policy_keeps_recording() {
    let factory = MemoryFactory::with_faults(SinkFaults {
        fail_stills: true,
        ..Default::default()
    });
    let mut h = harness(
        FakeCamera::new(GREEN, 2, 2),
        still_background(2, 2, BLUE),
        factory,
        WriteFailurePolicy::Warn { after: 2 },
    );

    h.commands
        .try_send(SchedulerCommand::StartRecording {
            directory: session_dir(),
        })
        .unwrap();
    for _ in 0..4 {
        h.scheduler.tick();
    }

    assert!(h.scheduler.parts().writer.is_recording());
    assert_eq!(h.scheduler.parts().writer.still_counter(), 0);
    let degraded: Vec<SessionEvent> = drain(&mut h.events)
        .into_iter()
        .filter(|e| matches!(e, SessionEvent::RecordingDegraded { .. }))
        .collect();
    assert_eq!(
        degraded,
        vec![SessionEvent::RecordingDegraded {
            sink: SinkKind::Still,
            failures: 2,
        }]
    );
}

#[test]
fn test_restart_resets_still_counter() {
    let factory = MemoryFactory::default();
    let log = Arc::clone(&factory.log);
    let mut h = harness(
        FakeCamera::new(GREEN, 2, 2),
        still_background(2, 2, BLUE),
        factory,
        WriteFailurePolicy::Tolerate,
    );
    let first = PathBuf::from("/recordings/first");
    let second = PathBuf::from("/recordings/second");

    h.commands
        .try_send(SchedulerCommand::StartRecording {
            directory: first.clone(),
        })
        .unwrap();
    h.scheduler.tick();
    h.scheduler.tick();
    // Starting again closes the open session first
    h.commands
        .try_send(SchedulerCommand::StartRecording {
            directory: second.clone(),
        })
        .unwrap();
    h.scheduler.tick();

    let log = log.lock().unwrap();
    assert_eq!(
        log.stills.last().map(|(p, _)| p.clone()),
        Some(second.join("image_sequence/output_image_0.png"))
    );
    assert_eq!(log.finished.len(), 2);
    assert!(log.finished.iter().all(|p| p.starts_with(&first)));
}

#[test]
fn test_handle_stop_finalizes_recording() {
    let factory = MemoryFactory::default();
    let log = Arc::clone(&factory.log);
    let h = harness(
        FakeCamera::new(GREEN, 2, 2),
        still_background(2, 2, BLUE),
        factory,
        WriteFailurePolicy::Tolerate,
    );
    let Harness {
        scheduler,
        commands,
        mut frames,
        mut events,
    } = h;

    commands
        .try_send(SchedulerCommand::StartRecording {
            directory: session_dir(),
        })
        .unwrap();
    let mut handle = SchedulerHandle::spawn("test-scheduler", scheduler, commands).unwrap();

    // 200fps camera, so a frame shows up quickly
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while frames.borrow_and_update().is_none() && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(handle.is_running());

    let parts = handle.stop().expect("scheduler hands back its parts");
    assert!(!parts.writer.is_recording());
    assert!(!handle.is_running());
    assert!(handle.stop().is_none());

    let log = log.lock().unwrap();
    assert_eq!(log.finished.len(), 2);
    assert!(!log.stills.is_empty());

    let events = drain(&mut events);
    assert!(matches!(events.last(), Some(SessionEvent::RecordingStopped(_))));
}

#[test]
fn test_start_queued_before_stop_is_dropped() {
    let factory = MemoryFactory::default();
    let log = Arc::clone(&factory.log);
    let h = harness(
        FakeCamera::new(GREEN, 2, 2),
        still_background(2, 2, BLUE),
        factory,
        WriteFailurePolicy::Tolerate,
    );
    let Harness {
        scheduler,
        commands,
        mut events,
        ..
    } = h;

    let root = temp_dir("dropped-start");
    let dir = storage::create_session_dir(&root, &chrono::Local::now()).unwrap();
    commands
        .try_send(SchedulerCommand::StartRecording {
            directory: dir.clone(),
        })
        .unwrap();

    let parts = scheduler.run(&AtomicBool::new(true));

    assert!(!parts.writer.is_recording());
    assert!(log.lock().unwrap().videos.is_empty());
    assert!(!dir.exists());
    assert!(drain(&mut events).iter().all(|e| !matches!(
        e,
        SessionEvent::RecordingStarted { .. } | SessionEvent::RecordingStopped(_)
    )));
}

#[test]
fn test_panicking_tick_hands_back_parts() {
    let factory = MemoryFactory::default();
    let log = Arc::clone(&factory.log);
    let camera = FakeCamera::new(GREEN, 2, 2);
    camera.panics.store(true, Ordering::SeqCst);
    let h = harness(
        camera,
        still_background(2, 2, BLUE),
        factory,
        WriteFailurePolicy::Tolerate,
    );
    let Harness {
        scheduler,
        commands,
        mut events,
        ..
    } = h;

    commands
        .try_send(SchedulerCommand::StartRecording {
            directory: session_dir(),
        })
        .unwrap();

    // Never stopped from outside; the panic ends the loop
    let parts = scheduler.run(&AtomicBool::new(false));

    assert!(parts.device.is_connected());
    assert!(!parts.writer.is_recording());
    assert_eq!(log.lock().unwrap().finished.len(), 2);
    assert!(matches!(
        drain(&mut events).last(),
        Some(SessionEvent::RecordingStopped(_))
    ));
}
