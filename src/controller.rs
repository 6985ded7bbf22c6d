//! The narrow façade the control channel drives.
//!
//! Capture and encoding live behind `RecordingController`; the router only
//! reads flags and issues commands through it. `HeadlessRecorder` is a
//! stand-in that keeps the state machine and clock without any pipeline.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use crate::error::ControllerError;

/// Whether a destructive command may ask the user before acting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirm {
    Prompt,
    Suppress,
}

pub trait RecordingController {
    /// True from start until save/cancel, including while paused.
    fn is_recording(&self) -> bool;
    fn is_paused(&self) -> bool;
    fn current_file_name(&self) -> String;
    fn current_file_size(&self) -> u64;
    fn total_time(&self) -> String;

    fn start(&mut self) -> Result<(), ControllerError>;
    fn pause(&mut self) -> Result<(), ControllerError>;
    fn resume(&mut self) -> Result<(), ControllerError>;
    fn cancel(&mut self, confirm: Confirm) -> Result<(), ControllerError>;
    fn save(&mut self, confirm: Confirm) -> Result<(), ControllerError>;
}

/// Point-in-time read of a controller, taken fresh on every status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub is_recording: bool,
    pub is_paused: bool,
    pub file_name: String,
    // Sent as a decimal string so clients with 53-bit numbers keep every byte.
    #[serde(serialize_with = "serialize_u64_string")]
    pub file_size: u64,
    pub total_time: String,
}

impl StatusSnapshot {
    pub fn capture<C: RecordingController + ?Sized>(controller: &C) -> Self {
        Self {
            is_recording: controller.is_recording(),
            is_paused: controller.is_paused(),
            file_name: controller.current_file_name(),
            file_size: controller.current_file_size(),
            total_time: controller.total_time(),
        }
    }
}

fn serialize_u64_string<S: serde::Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(value)
}

/// Formats elapsed time as `H:MM:SS`, rounded to the nearest second.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = (elapsed.as_micros() + 500_000) / 1_000_000;
    format!("{}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
}

#[derive(Debug, Clone, Copy)]
enum State {
    Idle,
    Recording { since: Instant },
    Paused,
}

/// Controller without a capture pipeline.
///
/// Tracks the Idle/Recording/Paused machine and the active (unpaused) time,
/// and reports the size of `output` as it exists on disk.
#[derive(Debug)]
pub struct HeadlessRecorder {
    output: PathBuf,
    state: State,
    accumulated: Duration,
    saved: usize,
}

impl HeadlessRecorder {
    pub fn new(output: impl Into<PathBuf>) -> Self {
        Self {
            output: output.into(),
            state: State::Idle,
            accumulated: Duration::ZERO,
            saved: 0,
        }
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Number of recordings finished with `save`.
    pub fn saved_recordings(&self) -> usize {
        self.saved
    }

    fn elapsed(&self) -> Duration {
        match self.state {
            State::Recording { since } => self.accumulated + since.elapsed(),
            State::Idle | State::Paused => self.accumulated,
        }
    }

    fn reset(&mut self) {
        self.state = State::Idle;
        self.accumulated = Duration::ZERO;
    }
}

impl RecordingController for HeadlessRecorder {
    fn is_recording(&self) -> bool {
        !matches!(self.state, State::Idle)
    }

    fn is_paused(&self) -> bool {
        matches!(self.state, State::Paused)
    }

    fn current_file_name(&self) -> String {
        self.output.display().to_string()
    }

    fn current_file_size(&self) -> u64 {
        if !self.is_recording() {
            return 0;
        }
        std::fs::metadata(&self.output).map(|m| m.len()).unwrap_or(0)
    }

    fn total_time(&self) -> String {
        format_elapsed(self.elapsed())
    }

    fn start(&mut self) -> Result<(), ControllerError> {
        match self.state {
            State::Idle => {
                self.accumulated = Duration::ZERO;
                self.state = State::Recording { since: Instant::now() };
                debug!(output = %self.output.display(), "recording started");
            }
            State::Paused => self.resume()?,
            State::Recording { .. } => {}
        }
        Ok(())
    }

    fn pause(&mut self) -> Result<(), ControllerError> {
        if let State::Recording { since } = self.state {
            self.accumulated += since.elapsed();
            self.state = State::Paused;
            debug!("recording paused");
        }
        Ok(())
    }

    fn resume(&mut self) -> Result<(), ControllerError> {
        if let State::Paused = self.state {
            self.state = State::Recording { since: Instant::now() };
            debug!("recording resumed");
        }
        Ok(())
    }

    fn cancel(&mut self, confirm: Confirm) -> Result<(), ControllerError> {
        if self.is_recording() {
            debug!(?confirm, "recording cancelled");
            self.reset();
        }
        Ok(())
    }

    fn save(&mut self, confirm: Confirm) -> Result<(), ControllerError> {
        if self.is_recording() {
            debug!(?confirm, output = %self.output.display(), "recording saved");
            self.saved += 1;
            self.reset();
        }
        Ok(())
    }
}
