// SPDX-License-Identifier: GPL-3.0-only

//! Fixed-rate pacing for the scheduler thread

use crate::constants::capture::TARGET_FRAMERATE;
use crate::constants::scheduler::MIN_PERIOD;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Tick period for a frame rate: whole milliseconds, never below 1ms
///
/// Unknown or nonsensical rates fall back to the target capture rate.
pub fn period_for_fps(fps: f64) -> Duration {
    let fps = if fps.is_finite() && fps > 0.0 {
        fps
    } else {
        TARGET_FRAMERATE
    };
    Duration::from_millis((1000.0 / fps).floor() as u64).max(MIN_PERIOD)
}

/// Deadline-based sleeper
///
/// When a tick overruns, missed deadlines are skipped rather than replayed
/// in a burst.
#[derive(Debug)]
pub struct Ticker {
    period: Duration,
    next: Instant,
}

impl Ticker {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            next: Instant::now() + period,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Sleep until the next deadline, returning early if `stop` is raised
    ///
    /// Returns false when stopped.
    pub fn wait(&mut self, stop: &AtomicBool) -> bool {
        // Sleep in slices so a stop request is seen within a few ms even at low rates
        const SLICE: Duration = Duration::from_millis(5);

        loop {
            if stop.load(Ordering::SeqCst) {
                return false;
            }
            let now = Instant::now();
            if now >= self.next {
                break;
            }
            std::thread::sleep((self.next - now).min(SLICE));
        }

        self.next += self.period;
        let now = Instant::now();
        if self.next <= now {
            self.next = now + self.period;
        }
        true
    }
}
