#![warn(missing_docs)]

//! Simulated printer for the parkline pause/resume sequencer.
//!
//! This crate provides:
//! - A G-code word reader for the commands a print job uses
//! - A planner with a bounded block buffer and machine limits
//! - An SD job, host bridge and recovery store that record what they see
//! - [`Machine`], implementing [`parkline::Firmware`] over all of the above
//! - [`SimPrinter`], a step-driven loop with scripted pause/resume
//!
//! # Example
//!
//! ```ignore
//! use parkline_sim::{Scenario, SimConfig, SimPrinter};
//!
//! let mut printer: SimPrinter = SimPrinter::new(&SimConfig::default())?;
//! printer.load_job("cube.gcode", &std::fs::read_to_string("cube.gcode")?);
//! printer.submit("M24");
//!
//! let report = printer.run_scenario(Scenario::pause_resume(200, 10, 100_000));
//! println!("paused {} time(s), {} commands held", report.pauses, report.backed_up);
//! ```

pub mod config;
pub mod error;
pub mod gcode;
pub mod job;
pub mod machine;
pub mod planner;
pub mod printer;
pub mod profile;

pub use config::{MacroPreset, SimConfig};
pub use error::{Result, SimError};
pub use gcode::{parse_line, GcodeLine};
pub use job::{HostLog, JobState, JobTimer, RecoveryLog, SdJob};
pub use machine::{Executed, Machine, Source, DEFAULT_FEEDRATE};
pub use planner::{PlannedMove, SimPlanner, BLOCK_BUFFER_SIZE};
pub use printer::{RunReport, Scenario, SimPrinter};
pub use profile::MachineProfile;
