// SPDX-License-Identifier: GPL-3.0-only

//! Terminal preview
//!
//! Renders the latest composite to the terminal using Unicode half-block
//! characters for improved vertical resolution, and maps keys to session
//! intents.
//!
//! | Key       | Action                        |
//! |-----------|-------------------------------|
//! | `r`       | Start or stop recording       |
//! | `0`-`9`   | Select capture device N       |
//! | `n`       | Next listed capture device    |
//! | `q`/`Esc` | Ask to exit                   |
//! | `Ctrl+C`  | Exit immediately              |

use crate::backends::camera::{DeviceInfo, DeviceSelector, NegotiatedFormat, enumerate_capture_devices};
use crate::config::Config;
use crate::frame::Frame;
use crate::session::{SessionController, SessionEvent};

use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    widgets::Widget,
};
use std::io::{self, stdout};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info};

/// Run the terminal preview until the user exits
pub fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut controller = SessionController::from_config(&config)?;

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let result = run_app(&mut terminal, &mut controller, &config.device);

    // Finalize any recording before giving the screen back
    controller.shutdown();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

/// What a key press asks for
#[derive(Debug, Clone, PartialEq, Eq)]
enum Action {
    Quit,
    AskExit,
    CancelExit,
    ToggleRecording,
    SelectDevice(DeviceSelector),
    NextDevice,
}

fn action_for_key(key: &KeyEvent, confirming_exit: bool) -> Option<Action> {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return Some(Action::Quit);
    }

    if confirming_exit {
        return match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => Some(Action::Quit),
            _ => Some(Action::CancelExit),
        };
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Esc => Some(Action::AskExit),
        KeyCode::Char('r') => Some(Action::ToggleRecording),
        KeyCode::Char('n') => Some(Action::NextDevice),
        KeyCode::Char(c) => c
            .to_digit(10)
            .map(|index| Action::SelectDevice(DeviceSelector::Index(index))),
        _ => None,
    }
}

/// Device after `current` in the probed list, wrapping around
fn next_device(devices: &[DeviceInfo], current: Option<&DeviceSelector>) -> Option<DeviceSelector> {
    if devices.is_empty() {
        return None;
    }
    let position = current.and_then(|current| {
        devices.iter().position(|d| {
            &d.selector() == current || d.path == current.device_path()
        })
    });
    let next = position.map(|p| (p + 1) % devices.len()).unwrap_or(0);
    Some(devices[next].selector())
}

/// Everything the status bar shows
struct Status {
    device: Option<DeviceSelector>,
    format: Option<NegotiatedFormat>,
    recording: bool,
    stills: u64,
    message: String,
    confirming_exit: bool,
}

impl Status {
    fn new() -> Self {
        Self {
            device: None,
            format: None,
            recording: false,
            stills: 0,
            message: String::new(),
            confirming_exit: false,
        }
    }

    fn apply(&mut self, event: SessionEvent) {
        match &event {
            SessionEvent::RecordingProgress { stills } => {
                self.stills = *stills;
                return;
            }
            SessionEvent::DeviceConnected { selector, format } => {
                self.device = Some(selector.clone());
                self.format = Some(*format);
            }
            SessionEvent::RecordingStarted { .. } => {
                self.recording = true;
                self.stills = 0;
            }
            SessionEvent::RecordingStopped(_) | SessionEvent::RecordingAborted { .. } => {
                self.recording = false;
            }
            _ => {}
        }
        self.message = event.to_string();
    }

    fn line(&self) -> String {
        if self.confirming_exit {
            return "Exit? (y/n)".to_string();
        }

        let mut line = match (&self.device, &self.format) {
            (Some(device), Some(format)) => format!("[{}] {}", device, format),
            _ => "[no device]".to_string(),
        };
        if self.recording {
            line.push_str(&format!(" | REC {} stills", self.stills));
        }
        if !self.message.is_empty() {
            line.push_str(" | ");
            line.push_str(&self.message);
        }
        line.push_str(" | 'r' record | 0-9/'n' device | 'q' quit");
        line
    }
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    controller: &mut SessionController,
    initial_device: &DeviceSelector,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut frames = controller.frames();
    let mut events = controller
        .take_events()
        .ok_or("Session event channel already taken")?;

    let devices = enumerate_capture_devices();
    info!(count = devices.len(), "Found capture devices");

    let mut status = Status::new();
    let mut frame_widget = FrameWidget::new();

    select_device(controller, initial_device, &mut status, &mut events);

    loop {
        // Only the newest composite matters
        if frames.has_changed().unwrap_or(false) {
            frame_widget.update_frame(frames.borrow_and_update().clone());
        }
        drain_events(&mut events, &mut status);

        let status_line = status.line();
        terminal.draw(|f| {
            let area = f.area();

            // Reserve bottom line for status
            let preview_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(1),
            };
            f.render_widget(&frame_widget, preview_area);

            let status_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };
            f.render_widget(
                StatusBar {
                    message: &status_line,
                },
                status_area,
            );
        })?;

        // Handle input with timeout for frame updates
        if event::poll(Duration::from_millis(16))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
            && let Some(action) = action_for_key(&key, status.confirming_exit)
        {
            match action {
                Action::Quit => break,
                Action::AskExit => status.confirming_exit = true,
                Action::CancelExit => status.confirming_exit = false,
                Action::ToggleRecording => toggle_recording(controller, &mut status),
                Action::SelectDevice(selector) => {
                    frame_widget = FrameWidget::new();
                    select_device(controller, &selector, &mut status, &mut events);
                }
                Action::NextDevice => match next_device(&devices, status.device.as_ref()) {
                    Some(selector) => {
                        frame_widget = FrameWidget::new();
                        select_device(controller, &selector, &mut status, &mut events);
                    }
                    None => status.message = "No capture devices found".to_string(),
                },
            }
        }
    }

    Ok(())
}

fn select_device(
    controller: &mut SessionController,
    selector: &DeviceSelector,
    status: &mut Status,
    events: &mut mpsc::Receiver<SessionEvent>,
) {
    info!(device = %selector, "Selecting capture device");
    status.recording = false;

    let result = controller.select_capture_device(selector);
    // The switch may have closed a recording; show its summary first
    drain_events(events, status);

    if let Err(e) = result {
        error!(device = %selector, error = %e, "Failed to select capture device");
        status.message = format!("Device {}: {}", selector, e);
    }
}

fn toggle_recording(controller: &mut SessionController, status: &mut Status) {
    if controller.is_recording() {
        if let Err(e) = controller.stop_recording() {
            error!(error = %e, "Failed to stop recording");
            status.message = format!("Error: {}", e);
        }
        return;
    }

    match controller.start_recording() {
        Ok(directory) => info!(directory = %directory.display(), "Recording requested"),
        Err(e) => {
            error!(error = %e, "Failed to start recording");
            status.message = format!("Error: {}", e);
        }
    }
}

fn drain_events(events: &mut mpsc::Receiver<SessionEvent>, status: &mut Status) {
    while let Ok(event) = events.try_recv() {
        status.apply(event);
    }
}

/// Widget that renders a frame using half-block characters
struct FrameWidget {
    frame: Option<Arc<Frame>>,
}

impl FrameWidget {
    fn new() -> Self {
        Self { frame: None }
    }

    fn update_frame(&mut self, frame: Option<Arc<Frame>>) {
        if frame.is_some() {
            self.frame = frame;
        }
    }
}

impl Widget for &FrameWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(frame) = self.frame.as_deref().filter(|f| f.width() > 0 && f.height() > 0)
        else {
            // No frame yet - show placeholder
            let msg = "Waiting for camera...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, ratatui::style::Style::default());
            }
            return;
        };

        // Each terminal cell displays 2 vertical pixels using half-block characters
        let frame_aspect = frame.width() as f64 / frame.height() as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64;

        let (display_width, display_height) = if term_width / term_height > frame_aspect {
            // Terminal is wider - fit to height
            let h = term_height;
            let w = h * frame_aspect;
            (w as u16, (h / 2.0) as u16)
        } else {
            // Terminal is taller - fit to width
            let w = term_width;
            let h = w / frame_aspect;
            (w as u16, (h / 2.0) as u16)
        };
        if display_width == 0 || display_height == 0 {
            return;
        }

        // Center the image
        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = frame.width() as f64 / display_width as f64;
        let y_scale = frame.height() as f64 / (display_height * 2) as f64;

        // Upper half (▀) colored with fg, lower half with bg
        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;

                if term_x >= area.x + area.width || term_y >= area.y + area.height {
                    continue;
                }

                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(sample_pixel(frame, src_x, src_y_top));
                    cell.set_bg(sample_pixel(frame, src_x, src_y_bottom));
                }
            }
        }
    }
}

fn sample_pixel(frame: &Frame, x: u32, y: u32) -> Color {
    let x = x.min(frame.width() - 1);
    let y = y.min(frame.height() - 1);
    let [r, g, b] = frame.get_pixel(x, y).0;
    Color::Rgb(r, g, b)
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Fill background
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        // Truncate on a char boundary
        let text: String = self.message.chars().take(area.width as usize).collect();

        buf.set_string(
            area.x,
            area.y,
            text,
            ratatui::style::Style::default()
                .fg(Color::White)
                .bg(Color::DarkGray),
        );
    }
}
