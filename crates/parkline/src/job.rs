//! Print-job, host and recovery collaborators.

use serde::{Deserialize, Serialize};

/// The SD print job: file reader plus job timer.
pub trait PrintJob {
    /// A job file is being read into the queue.
    fn is_printing(&self) -> bool;

    /// A job file is open (printing or not).
    fn is_file_open(&self) -> bool;

    /// Stop feeding job lines into the queue as early as possible.
    fn request_pause(&mut self);

    /// Pause the print-job timer.
    fn pause_timer(&mut self);

    /// Mark or clear the paused-for-resume state.
    fn set_paused_for_resume(&mut self, paused: bool);

    /// Is the job parked waiting for a resume?
    fn is_paused_for_resume(&self) -> bool;

    /// Resume (or start) reading the file and run the job timer.
    fn start_or_resume(&mut self);
}

/// Prompt shown to the host during a pause bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostPrompt {
    /// Job paused, waiting for the operator.
    PausedSd,
    /// Job is resuming.
    ResumingSd,
}

impl HostPrompt {
    /// Prompt text.
    pub fn message(self) -> &'static str {
        match self {
            HostPrompt::PausedSd => "Pause SD",
            HostPrompt::ResumingSd => "Resuming SD",
        }
    }

    /// Label of the prompt's single button.
    pub fn button(self) -> &'static str {
        match self {
            HostPrompt::PausedSd => "Resume",
            HostPrompt::ResumingSd => "Dismiss",
        }
    }
}

/// Action notification sent to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HostAction {
    /// `//action:paused`
    Paused,
    /// `//action:resumed`
    Resumed,
}

impl HostAction {
    /// Action keyword.
    pub fn keyword(self) -> &'static str {
        match self {
            HostAction::Paused => "paused",
            HostAction::Resumed => "resumed",
        }
    }
}

/// Display status line and host bridge.
pub trait HostUi {
    /// Show a status message.
    fn set_status(&mut self, message: &str);

    /// Return the status line to its idle text.
    fn reset_status(&mut self);

    /// Open a host prompt.
    fn prompt(&mut self, prompt: HostPrompt);

    /// Notify the host of an action.
    fn action(&mut self, action: HostAction);
}

/// Power-loss recovery store.
pub trait Recovery {
    /// Recovery is switched on.
    fn enabled(&self) -> bool;

    /// Persist the job state now.
    fn save(&mut self);

    /// Prepare for a running job.
    fn prepare(&mut self);
}
