// SPDX-License-Identifier: GPL-3.0-only

//! Headless commands
//!
//! - Listing capture devices
//! - Recording without a preview
//! - Printing the effective configuration

use greenscreen::backends::camera::enumerate_capture_devices;
use greenscreen::config::Config;
use greenscreen::session::{SessionController, SessionEvent};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// List the capture devices that answered the probe
pub fn list_devices() -> Result<(), Box<dyn std::error::Error>> {
    let devices = enumerate_capture_devices();

    if devices.is_empty() {
        println!("No capture devices found.");
        return Ok(());
    }

    println!("Available capture devices:");
    println!();
    for device in &devices {
        println!("  [{}] {}", device.index, device.card);
        println!("      Path: {}  Driver: {}", device.path, device.driver);
    }
    println!();

    Ok(())
}

/// Composite and record for `duration` seconds, or until Ctrl+C
pub fn record(config: &Config, duration: u64) -> Result<(), Box<dyn std::error::Error>> {
    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = Arc::clone(&stop);
    ctrlc::set_handler(move || stop_handler.store(true, Ordering::SeqCst))?;

    let mut controller = SessionController::from_config(config)?;
    let mut events = controller
        .take_events()
        .ok_or("Session event channel already taken")?;

    let format = controller.select_capture_device(&config.device)?;
    println!("Capturing from device {} ({})", config.device, format);

    let directory = controller.start_recording()?;
    println!("Recording to {}", directory.display());
    if duration == 0 {
        println!("Press Ctrl+C to stop");
    }

    let limit = (duration > 0).then(|| Duration::from_secs(duration));
    let start = Instant::now();
    let mut last_report = 0;

    while !stop.load(Ordering::SeqCst) && limit.is_none_or(|limit| start.elapsed() < limit) {
        print_events(&mut events, &mut last_report);
        if !controller.is_running() {
            return Err("Capture scheduler stopped unexpectedly".into());
        }
        std::thread::sleep(POLL_INTERVAL);
    }

    println!("Stopping...");
    controller.shutdown();
    print_events(&mut events, &mut last_report);

    Ok(())
}

/// Print queued session events, with progress every 25 stills
fn print_events(events: &mut mpsc::Receiver<SessionEvent>, last_report: &mut u64) {
    while let Ok(event) = events.try_recv() {
        match &event {
            SessionEvent::RecordingProgress { stills } => {
                if *stills >= *last_report + 25 {
                    *last_report = *stills;
                    println!("  {}", event);
                }
            }
            SessionEvent::RecordingStopped(summary) => {
                println!("{}", event);
                for (kind, result) in [("raw", &summary.raw), ("fx", &summary.fx)] {
                    match result {
                        Some(Ok(path)) => println!("  {} stream: {}", kind, path.display()),
                        Some(Err(e)) => println!("  {} stream failed: {}", kind, e),
                        None => println!("  {} stream: not recorded", kind),
                    }
                }
            }
            _ => println!("{}", event),
        }
    }
}

/// Print the config as JSON, optionally saving it
pub fn show_config(
    config: &Config,
    save_path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(config)?);

    if let Some(path) = save_path {
        config.save_to(&path)?;
        println!("Saved: {}", path.display());
    }

    Ok(())
}
