//! Step-driven printer: a [`Machine`] plus its pause/resume [`Sequencer`].

use parkline::{
    AxisModes, Phase, Planner, Position, Sequencer, Transition, BUFSIZE, PAUSE_COMMAND,
    RESUME_COMMAND,
};
use serde::Serialize;
use tracing::{error, info};

use crate::config::SimConfig;
use crate::error::{Result, SimError};
use crate::job::{HostLog, JobState, SdJob};
use crate::machine::{Machine, Source};

/// When the operator pauses and resumes during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Scenario {
    /// Send `M25` once this many commands have been dispatched.
    pub pause_after: Option<u64>,
    /// Send `M24` after this many idle steps spent paused.
    pub resume_after: Option<u64>,
    /// Give up after this many steps.
    pub max_steps: u64,
}

impl Scenario {
    /// Run to completion without pausing.
    pub fn straight(max_steps: u64) -> Self {
        Self {
            max_steps,
            ..Self::default()
        }
    }

    /// Pause after `pause_after` commands and resume after `resume_after`
    /// idle steps.
    pub fn pause_resume(pause_after: u64, resume_after: u64, max_steps: u64) -> Self {
        Self {
            pause_after: Some(pause_after),
            resume_after: Some(resume_after),
            max_steps,
        }
    }
}

/// Summary of a run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// Commands dispatched.
    pub steps: u64,
    /// Job state at the end.
    pub job_state: JobState,
    /// Job lines read.
    pub lines_read: usize,
    /// Job timer value (steps).
    pub job_time: u64,
    /// Sequencer phase at the end.
    pub phase: Phase,
    /// Logical position at the end.
    pub position: Position,
    /// Addressing modes at the end.
    pub modes: AxisModes,
    /// Completed pauses.
    pub pauses: usize,
    /// Completed resumes.
    pub resumes: usize,
    /// Commands held across pauses.
    pub backed_up: usize,
    /// Commands replayed by resumes.
    pub replayed: usize,
    /// Completed moves.
    pub moves: usize,
    /// Total motion time (s).
    pub motion_time_s: f64,
    /// Flow percentage (`M221`) at the end.
    pub flow_percentage: u16,
    /// Status line at the end.
    pub status: String,
    /// Refused commands and macro texts.
    pub rejected: Vec<String>,
    /// Halt reason, if the run halted.
    pub halted: Option<String>,
}

/// A simulated printer with an `N`-deep command ring.
#[derive(Debug, Clone)]
pub struct SimPrinter<const N: usize = BUFSIZE> {
    machine: Machine<N>,
    sequencer: Sequencer<N>,
    steps: u64,
    halted: Option<String>,
}

impl<const N: usize> SimPrinter<N> {
    /// Build a printer from validated settings.
    pub fn new(config: &SimConfig) -> Result<Self> {
        config.validate()?;
        let profile = config.machine_profile()?;
        let retract_length = config.retract_length_for(&profile);
        let machine = Machine::new(profile, config.macro_table()?)
            .with_retract_length(retract_length)
            .with_host(HostLog::new("Ready.", config.host_prompts))
            .with_recovery(config.recovery);
        Ok(Self {
            machine,
            sequencer: Sequencer::new(config.sequencer_config()),
            steps: 0,
            halted: None,
        })
    }

    /// Open a job file. It starts printing on the next `M24`.
    pub fn load_job(&mut self, name: &str, text: &str) {
        self.machine.load_job(SdJob::open(name, text));
    }

    /// Send a command as the host would.
    pub fn submit(&mut self, line: &str) {
        self.machine.submit(line);
    }

    /// Dispatch one command. Returns `false` when there was nothing to run.
    pub fn step(&mut self) -> Result<bool> {
        if let Some(reason) = &self.halted {
            return Err(SimError::Halted(reason.clone()));
        }

        self.machine.feed();
        self.machine.sd_job_mut().tick();
        let Some((command, source)) = self.machine.next_command() else {
            return Ok(false);
        };

        self.steps += 1;
        if let Err(err) = self
            .machine
            .execute(command.as_str(), source, &mut self.sequencer)
        {
            error!(%err, command = %command, "machine halted");
            self.halted = Some(err.to_string());
            return Err(err.into());
        }
        Ok(true)
    }

    /// Run until idle or `max_steps` commands have been dispatched.
    pub fn run(&mut self, max_steps: u64) -> Result<u64> {
        let start = self.steps;
        while self.steps - start < max_steps {
            if !self.step()? && self.machine.is_idle() {
                break;
            }
        }
        Ok(self.steps - start)
    }

    /// Play a scenario. Errors halt the printer and are reported, not
    /// returned.
    pub fn run_scenario(&mut self, scenario: Scenario) -> RunReport {
        let mut pause_sent = false;
        let mut resume_sent = false;
        let mut paused_for = 0;

        for _ in 0..scenario.max_steps {
            if let Some(after) = scenario.pause_after {
                if !pause_sent && self.steps >= after {
                    info!(step = self.steps, "operator pauses");
                    self.submit(PAUSE_COMMAND);
                    pause_sent = true;
                }
            }

            let waiting = self.sequencer.is_paused() && !resume_sent;
            if waiting {
                if let Some(after) = scenario.resume_after {
                    paused_for += 1;
                    if paused_for > after {
                        info!(step = self.steps, "operator resumes");
                        self.submit(RESUME_COMMAND);
                        resume_sent = true;
                    }
                }
            }

            match self.step() {
                Ok(true) => {}
                Ok(false) => {
                    let will_resume = waiting && scenario.resume_after.is_some();
                    if self.machine.is_idle() && !will_resume {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
        self.report()
    }

    /// Summary of the run so far.
    pub fn report(&self) -> RunReport {
        let transitions = self.machine.transitions();
        let mut pauses = 0;
        let mut resumes = 0;
        let mut backed_up = 0;
        let mut replayed = 0;
        for transition in transitions {
            match transition {
                Transition::Paused { backed_up: n } => {
                    pauses += 1;
                    backed_up += n;
                }
                Transition::Resumed { replayed: n } => {
                    resumes += 1;
                    replayed += n;
                }
                _ => {}
            }
        }

        let motion = self.machine.motion();
        let job = self.machine.sd_job();
        RunReport {
            steps: self.steps,
            job_state: job.state(),
            lines_read: job.lines_read(),
            job_time: job.timer().elapsed,
            phase: self.sequencer.phase(),
            position: motion.current_position(),
            modes: self.machine.axis_modes(),
            pauses,
            resumes,
            backed_up,
            replayed,
            moves: motion.completed().len(),
            motion_time_s: motion.motion_time_s(),
            flow_percentage: motion.flow_percentage(),
            status: self.machine.host_log().status.clone(),
            rejected: self.machine.rejected().to_vec(),
            halted: self.halted.clone(),
        }
    }

    /// Job-originated commands in execution order, leaving out host
    /// pause/resume requests and anything run from a macro.
    pub fn job_commands(&self) -> Vec<String> {
        self.machine
            .executed()
            .iter()
            .filter(|e| e.source == Source::Queued)
            .filter(|e| e.line != PAUSE_COMMAND && e.line != RESUME_COMMAND)
            .map(|e| e.line.clone())
            .collect()
    }

    /// Clear a halt after operator intervention.
    pub fn clear_halt(&mut self) {
        self.halted = None;
        self.sequencer.reset();
        self.machine.motion_mut().clear_halt();
    }

    /// Commands dispatched so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Halt reason, if halted.
    pub fn halted(&self) -> Option<&str> {
        self.halted.as_deref()
    }

    /// The machine.
    pub fn machine(&self) -> &Machine<N> {
        &self.machine
    }

    /// The sequencer.
    pub fn sequencer(&self) -> &Sequencer<N> {
        &self.sequencer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Ten layers of a 20 mm square with relative extrusion.
    fn square_job() -> String {
        let mut job = String::from("G28\nG92 E0\nM83\n");
        for layer in 1..=10 {
            let z = f64::from(layer) * 0.2;
            job.push_str(&format!("G1 Z{z:.1} F600\nG1 X10 Y10 F3000\n"));
            job.push_str("G1 X30 Y10 E1\nG1 X30 Y30 E1\nG1 X10 Y30 E1\nG1 X10 Y10 E1\n");
        }
        job
    }

    fn printer() -> SimPrinter {
        let mut printer = SimPrinter::new(&SimConfig::default()).unwrap();
        printer.load_job("square.gcode", &square_job());
        printer.submit(RESUME_COMMAND);
        printer
    }

    #[test]
    fn test_straight_run_finishes_job() {
        let mut printer = printer();
        let report = printer.run_scenario(Scenario::straight(1000));
        assert_eq!(report.job_state, JobState::Finished);
        assert_eq!(report.lines_read, 63);
        assert_eq!(report.pauses, 0);
        assert_eq!(report.position, Position::new(10.0, 10.0, 2.0, 40.0));
        assert!(report.halted.is_none());
    }

    #[test]
    fn test_paused_run_matches_straight_run() {
        let mut straight = printer();
        let baseline = straight.run_scenario(Scenario::straight(1000));

        let mut paused = printer();
        let report = paused.run_scenario(Scenario::pause_resume(5, 2, 1000));

        assert_eq!(report.pauses, 1);
        assert_eq!(report.resumes, 1);
        assert_eq!(report.backed_up, BUFSIZE);
        assert_eq!(report.replayed, BUFSIZE);
        assert_eq!(report.phase, Phase::Idle);
        assert_eq!(report.job_state, JobState::Finished);
        assert_eq!(report.position, baseline.position);
        assert_eq!(report.modes, baseline.modes);
        assert_eq!(paused.job_commands(), straight.job_commands());
    }

    #[test]
    fn test_unresumed_pause_stays_parked() {
        let mut printer = printer();
        let report = printer.run_scenario(Scenario {
            pause_after: Some(2),
            resume_after: None,
            max_steps: 1000,
        });
        assert_eq!(report.phase, Phase::Paused);
        assert_eq!(report.job_state, JobState::Paused);
        assert_eq!(report.position.x, 0.0);
        assert_eq!(report.position.y, 0.0);
    }

    #[test]
    fn test_halt_is_sticky_until_cleared() {
        let mut printer = SimPrinter::<BUFSIZE>::new(&SimConfig::default()).unwrap();
        printer.submit("G1 X900");
        assert!(printer.step().is_err());
        assert!(matches!(printer.step(), Err(SimError::Halted(_))));

        printer.clear_halt();
        printer.submit("G1 X5");
        assert!(printer.step().unwrap());
    }
}
