//! Simulated SD job, host bridge and power-loss recovery.

use std::collections::VecDeque;

use parkline::{HostAction, HostPrompt, HostUi, PrintJob, Recovery};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::gcode::strip_comment;

/// Job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum JobState {
    /// No file open.
    #[default]
    Idle,
    /// File open, not yet started.
    Loaded,
    /// Lines are being fed to the queue.
    Printing,
    /// Feeding stopped by a pause.
    Paused,
    /// Every line has been read.
    Finished,
}

/// Print-job timer counted in simulation steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct JobTimer {
    /// Timer is counting.
    pub running: bool,
    /// Steps counted so far.
    pub elapsed: u64,
    /// Times the timer was started or resumed.
    pub starts: u32,
}

/// An SD job read line by line.
#[derive(Debug, Clone, Default)]
pub struct SdJob {
    name: Option<String>,
    lines: VecDeque<String>,
    lines_read: usize,
    state: JobState,
    paused_for_resume: bool,
    timer: JobTimer,
}

impl SdJob {
    /// Open a job file. Blank and comment-only lines are skipped.
    pub fn open(name: impl Into<String>, text: &str) -> Self {
        let lines = text
            .lines()
            .map(|line| strip_comment(line).trim())
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();
        Self {
            name: Some(name.into()),
            lines,
            state: JobState::Loaded,
            ..Self::default()
        }
    }

    /// File name, when a file is open.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Job state.
    pub fn state(&self) -> JobState {
        self.state
    }

    /// Lines handed to the queue so far.
    pub fn lines_read(&self) -> usize {
        self.lines_read
    }

    /// Lines not yet read.
    pub fn remaining(&self) -> usize {
        self.lines.len()
    }

    /// Job timer.
    pub fn timer(&self) -> JobTimer {
        self.timer
    }

    /// Next line to feed, while printing.
    pub fn next_line(&mut self) -> Option<String> {
        if self.state != JobState::Printing {
            return None;
        }
        match self.lines.pop_front() {
            Some(line) => {
                self.lines_read += 1;
                Some(line)
            }
            None => {
                info!(lines = self.lines_read, "job file finished");
                self.state = JobState::Finished;
                self.timer.running = false;
                None
            }
        }
    }

    /// Advance the job timer by one step.
    pub fn tick(&mut self) {
        if self.timer.running {
            self.timer.elapsed += 1;
        }
    }
}

impl PrintJob for SdJob {
    fn is_printing(&self) -> bool {
        self.state == JobState::Printing
    }

    fn is_file_open(&self) -> bool {
        self.name.is_some() && self.state != JobState::Finished
    }

    fn request_pause(&mut self) {
        if self.state == JobState::Printing {
            self.state = JobState::Paused;
        }
    }

    fn pause_timer(&mut self) {
        self.timer.running = false;
    }

    fn set_paused_for_resume(&mut self, paused: bool) {
        self.paused_for_resume = paused;
    }

    fn is_paused_for_resume(&self) -> bool {
        self.paused_for_resume
    }

    fn start_or_resume(&mut self) {
        if !self.is_file_open() {
            return;
        }
        debug!(file = ?self.name, "job feeding");
        self.state = JobState::Printing;
        if !self.timer.running {
            self.timer.running = true;
            self.timer.starts += 1;
        }
    }
}

/// Status line and host traffic, recorded.
#[derive(Debug, Clone, Serialize)]
pub struct HostLog {
    /// Current status line.
    pub status: String,
    /// Prompts opened on the host.
    pub prompts: Vec<HostPrompt>,
    /// Actions sent to the host.
    pub actions: Vec<HostAction>,
    idle_status: String,
    prompts_enabled: bool,
}

impl Default for HostLog {
    fn default() -> Self {
        Self::new("Ready.", true)
    }
}

impl HostLog {
    /// Host bridge showing `idle_status` when nothing else is going on.
    pub fn new(idle_status: impl Into<String>, prompts_enabled: bool) -> Self {
        let idle_status = idle_status.into();
        Self {
            status: idle_status.clone(),
            prompts: Vec::new(),
            actions: Vec::new(),
            idle_status,
            prompts_enabled,
        }
    }
}

impl HostUi for HostLog {
    fn set_status(&mut self, message: &str) {
        self.status = message.to_string();
    }

    fn reset_status(&mut self) {
        self.status.clone_from(&self.idle_status);
    }

    fn prompt(&mut self, prompt: HostPrompt) {
        if self.prompts_enabled {
            debug!(message = prompt.message(), button = prompt.button(), "host prompt");
            self.prompts.push(prompt);
        }
    }

    fn action(&mut self, action: HostAction) {
        info!("//action:{}", action.keyword());
        self.actions.push(action);
    }
}

/// Power-loss recovery store that counts what it was asked to do.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RecoveryLog {
    /// Recovery switched on.
    pub enabled: bool,
    /// Saves performed.
    pub saves: usize,
    /// Prepares performed.
    pub prepares: usize,
}

impl Recovery for RecoveryLog {
    fn enabled(&self) -> bool {
        self.enabled
    }

    fn save(&mut self) {
        self.saves += 1;
    }

    fn prepare(&mut self) {
        self.prepares += 1;
    }
}
