#![warn(missing_docs)]

//! Print pause/resume sequencing for 3D printer firmware.
//!
//! This crate provides:
//! - A bounded two-lane command queue (injected lane + ring)
//! - The pause/resume sequencer behind `M25`/`M24`
//! - The pause state captured for one pause bracket
//! - Fixed-size G-code macro slots (`M810`..`M819`)
//! - Contracts for the planner, print job, host UI and recovery collaborators
//!
//! # Example
//!
//! ```ignore
//! use parkline::{Sequencer, SequencerConfig, Transition};
//!
//! let mut sequencer = Sequencer::<4>::new(SequencerConfig::default());
//!
//! // Inside the firmware's dispatcher, for an M25 command:
//! match sequencer.pause(&mut firmware)? {
//!     Transition::Resubmitted => { /* runs again with priority */ }
//!     Transition::Paused { backed_up } => println!("{backed_up} commands held"),
//!     _ => {}
//! }
//! ```

pub mod error;
pub mod firmware;
pub mod job;
pub mod macros;
pub mod planner;
pub mod position;
pub mod queue;
pub mod sequencer;
pub mod state;

pub use error::{MacroError, MotionError, QueueError, Result, SequencerError};
pub use firmware::Firmware;
pub use job::{HostAction, HostPrompt, HostUi, PrintJob, Recovery};
pub use macros::{
    slot_for_code, MacroTable, ParkMove, MACRO_BASE_CODE, MACRO_SLOTS, MACRO_SLOT_SIZE,
    PARK_SLOT, RESUME_POST_MOVE_SLOT, RESUME_PRE_MOVE_SLOT,
};
pub use planner::Planner;
pub use position::{Axis, AxisModes, Position};
pub use queue::{Command, CommandQueue, RingQueue, BUFSIZE, MAX_CMD_SIZE};
pub use sequencer::{Phase, Sequencer, SequencerConfig, Transition, PAUSE_COMMAND, RESUME_COMMAND};
pub use state::PauseState;
