// SPDX-License-Identifier: GPL-3.0-only

//! Live compositing session
//!
//! ```text
//!   UI thread                         scheduler thread
//! ┌───────────────────┐  commands   ┌──────────────────┐
//! │ SessionController │ ──────────▶ │ CaptureScheduler │
//! │                   │ ◀────────── │  device, source, │
//! └───────────────────┘   events    │  writer          │
//!          ▲                        └────────┬─────────┘
//!          └──────── latest composite ───────┘ (watch)
//! ```

pub mod controller;
pub mod events;
pub mod scheduler;
pub mod ticker;

pub use controller::{SessionController, SessionSettings};
pub use events::{SchedulerCommand, SessionEvent};
pub use scheduler::{CaptureScheduler, SchedulerHandle, SchedulerParts, SpawnError, TickOutcome};
pub use ticker::{Ticker, period_for_fps};
