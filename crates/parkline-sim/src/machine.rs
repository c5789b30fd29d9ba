//! The simulated machine: queue, planner, job and command dispatch.

use std::collections::VecDeque;

use parkline::{
    slot_for_code, Axis, AxisModes, Command, CommandQueue, Firmware, HostUi, MacroTable,
    Planner, Position, PrintJob, Recovery, RingQueue, Sequencer, Transition,
};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::gcode::{parse_line, GcodeLine};
use crate::job::{HostLog, RecoveryLog, SdJob};
use crate::planner::SimPlanner;
use crate::profile::MachineProfile;

/// Default feedrate before any `F` word (mm/min).
pub const DEFAULT_FEEDRATE: f64 = 1500.0;

/// Where an executed command came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Source {
    /// Ring: job lines, host commands and replayed backups.
    Queued,
    /// Priority lane.
    Injected,
    /// A macro or other immediate script.
    Macro,
}

/// One executed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Executed {
    /// Origin of the command.
    pub source: Source,
    /// Command text.
    pub line: String,
}

/// Simulated firmware with an `N`-deep command ring.
#[derive(Debug, Clone)]
pub struct Machine<const N: usize> {
    queue: RingQueue<N>,
    planner: SimPlanner,
    modes: AxisModes,
    macros: MacroTable,
    job: SdJob,
    host: HostLog,
    recovery: RecoveryLog,
    inbox: VecDeque<String>,
    feedrate: f64,
    retract_length: f64,
    retracted: bool,
    executed: Vec<Executed>,
    transitions: Vec<Transition>,
    rejected: Vec<String>,
}

impl<const N: usize> Machine<N> {
    /// Idle machine at the origin.
    pub fn new(profile: MachineProfile, macros: MacroTable) -> Self {
        let retract_length = profile.retraction_distance;
        Self {
            queue: RingQueue::new(),
            planner: SimPlanner::new(profile),
            modes: AxisModes::default(),
            macros,
            job: SdJob::default(),
            host: HostLog::default(),
            recovery: RecoveryLog::default(),
            inbox: VecDeque::new(),
            feedrate: DEFAULT_FEEDRATE,
            retract_length,
            retracted: false,
            executed: Vec::new(),
            transitions: Vec::new(),
            rejected: Vec::new(),
        }
    }

    /// Override the firmware retract length.
    pub fn with_retract_length(mut self, length: f64) -> Self {
        self.retract_length = length;
        self
    }

    /// Replace the host bridge.
    pub fn with_host(mut self, host: HostLog) -> Self {
        self.host = host;
        self
    }

    /// Switch power-loss recovery on or off.
    pub fn with_recovery(mut self, enabled: bool) -> Self {
        self.recovery.enabled = enabled;
        self
    }

    /// Open a job file.
    pub fn load_job(&mut self, job: SdJob) {
        self.job = job;
    }

    /// Queue a command from the host. Host commands reach the ring ahead of
    /// job lines.
    pub fn submit(&mut self, line: &str) {
        self.inbox.push_back(line.to_string());
    }

    /// Fill free ring slots from the host inbox, then from the job.
    pub fn feed(&mut self) {
        while self.queue.free_slots() > 0 {
            let line = match self.inbox.pop_front() {
                Some(line) => line,
                None => match self.job.next_line() {
                    Some(line) => line,
                    None => break,
                },
            };
            match Command::new(&line) {
                Ok(command) => {
                    if let Err(err) = self.queue.enqueue_one_now(command) {
                        warn!(%err, line, "dropping command");
                    }
                }
                Err(err) => {
                    warn!(%err, "dropping command");
                    self.rejected.push(err.to_string());
                }
            }
        }
    }

    /// Nothing queued, nothing from the host and no job feeding.
    pub fn is_idle(&self) -> bool {
        self.queue.is_empty() && self.inbox.is_empty() && !self.job.is_printing()
    }

    /// Take the next command to dispatch.
    pub fn next_command(&mut self) -> Option<(Command, Source)> {
        let command = self.queue.next_command()?;
        let source = if self.queue.is_processing_injected() {
            Source::Injected
        } else {
            Source::Queued
        };
        Some((command, source))
    }

    /// Execute one command line.
    pub fn execute(
        &mut self,
        line: &str,
        source: Source,
        sequencer: &mut Sequencer<N>,
    ) -> parkline::Result<()> {
        trace!(?source, line, "execute");
        self.executed.push(Executed {
            source,
            line: line.to_string(),
        });

        let gcode = match parse_line(line) {
            Ok(Some(gcode)) => gcode,
            Ok(None) => return Ok(()),
            Err(err) => {
                warn!(%err, "unparsable command skipped");
                self.rejected.push(err.to_string());
                return Ok(());
            }
        };

        if gcode.letter == 'M' {
            if let Some(slot) = slot_for_code(gcode.code) {
                return self.macro_command(slot, gcode.string_arg, sequencer);
            }
        }

        match (gcode.letter, gcode.code) {
            ('G', 0 | 1) => self.linear_move(&gcode)?,
            ('G', 4) | ('M', 400) => self.planner.synchronize()?,
            ('G', 10) => self.retract()?,
            ('G', 11) => self.unretract()?,
            ('G', 28) => self.home()?,
            ('G', 90) => self.modes.set_relative_mode(false),
            ('G', 91) => self.modes.set_relative_mode(true),
            ('G', 92) => self.set_position(&gcode),
            ('M', 24) => {
                let transition = sequencer.resume(self)?;
                debug!(?transition, "M24");
                self.transitions.push(transition);
            }
            ('M', 25) => {
                let transition = sequencer.pause(self)?;
                debug!(?transition, "M25");
                self.transitions.push(transition);
            }
            ('M', 82) => self.modes.set_e_relative(false),
            ('M', 83) => self.modes.set_e_relative(true),
            ('M', 117) => self.host.set_status(gcode.string_arg),
            ('M', 221) => {
                if let Some(percent) = gcode.value('S') {
                    self.planner.set_flow_percentage(percent.clamp(0.0, 999.0) as u16);
                }
            }
            _ => {
                debug!(line, "unsupported command ignored");
            }
        }
        Ok(())
    }

    fn macro_command(
        &mut self,
        slot: usize,
        text: &str,
        sequencer: &mut Sequencer<N>,
    ) -> parkline::Result<()> {
        if text.is_empty() {
            return self.run_macro(slot, sequencer);
        }
        if let Err(err) = self.macros.set(slot, text) {
            warn!(%err, slot, "macro not stored");
            self.rejected.push(err.to_string());
        }
        Ok(())
    }

    fn linear_move(&mut self, gcode: &GcodeLine<'_>) -> parkline::Result<()> {
        if let Some(feedrate) = gcode.value('F') {
            if feedrate > 0.0 {
                self.feedrate = feedrate;
            }
        }
        let mut target = self.planner.current_position();
        for axis in Axis::ALL {
            if let Some(value) = gcode.value(axis.letter()) {
                let base = if self.modes.is_relative(axis) {
                    target.get(axis)
                } else {
                    0.0
                };
                target.set(axis, base + value);
            }
        }
        self.planner.buffer_line(target, self.feedrate / 60.0)?;
        Ok(())
    }

    fn retract(&mut self) -> parkline::Result<()> {
        if self.retracted {
            return Ok(());
        }
        let at = self.planner.current_position();
        let speed = self.planner.profile().retraction_speed;
        self.planner
            .buffer_line(at.with_e(at.e - self.retract_length), speed)?;
        self.retracted = true;
        Ok(())
    }

    fn unretract(&mut self) -> parkline::Result<()> {
        if !self.retracted {
            return Ok(());
        }
        let at = self.planner.current_position();
        let speed = self.planner.profile().retraction_speed;
        self.planner
            .buffer_line(at.with_e(at.e + self.retract_length), speed)?;
        self.retracted = false;
        Ok(())
    }

    fn home(&mut self) -> parkline::Result<()> {
        let at = self.planner.current_position();
        let speed = self.planner.profile().max_feedrate_x;
        self.planner
            .buffer_line(Position::new(0.0, 0.0, 0.0, at.e), speed)?;
        self.planner.synchronize()?;
        Ok(())
    }

    fn set_position(&mut self, gcode: &GcodeLine<'_>) {
        let mut position = self.planner.current_position();
        if gcode.has_params() {
            for axis in Axis::ALL {
                if let Some(value) = gcode.value(axis.letter()) {
                    position.set(axis, value);
                }
            }
        } else {
            position = Position::default();
        }
        self.planner.set_current_position(position);
        self.planner.sync_plan_position();
    }

    /// The command queue.
    pub fn command_queue(&self) -> &RingQueue<N> {
        &self.queue
    }

    /// The planner.
    pub fn motion(&self) -> &SimPlanner {
        &self.planner
    }

    /// Mutable planner, for clearing a halt.
    pub fn motion_mut(&mut self) -> &mut SimPlanner {
        &mut self.planner
    }

    /// Current addressing modes.
    pub fn axis_modes(&self) -> AxisModes {
        self.modes
    }

    /// Macro slots.
    pub fn macro_table(&self) -> &MacroTable {
        &self.macros
    }

    /// The SD job.
    pub fn sd_job(&self) -> &SdJob {
        &self.job
    }

    /// Mutable SD job, for ticking the timer.
    pub fn sd_job_mut(&mut self) -> &mut SdJob {
        &mut self.job
    }

    /// Host traffic so far.
    pub fn host_log(&self) -> &HostLog {
        &self.host
    }

    /// Recovery activity so far.
    pub fn recovery_log(&self) -> RecoveryLog {
        self.recovery
    }

    /// Every executed command, in order.
    pub fn executed(&self) -> &[Executed] {
        &self.executed
    }

    /// Outcomes of every `M24`/`M25` dispatched.
    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    /// Commands or macro texts refused.
    pub fn rejected(&self) -> &[String] {
        &self.rejected
    }

    /// Is firmware retraction in effect?
    pub fn is_retracted(&self) -> bool {
        self.retracted
    }
}

impl<const N: usize> Firmware<N> for Machine<N> {
    type Queue = RingQueue<N>;
    type Planner = SimPlanner;

    fn queue(&mut self) -> &mut Self::Queue {
        &mut self.queue
    }

    fn planner(&mut self) -> &mut Self::Planner {
        &mut self.planner
    }

    fn modes(&mut self) -> &mut AxisModes {
        &mut self.modes
    }

    fn macros(&self) -> &MacroTable {
        &self.macros
    }

    fn job(&mut self) -> &mut dyn PrintJob {
        &mut self.job
    }

    fn host(&mut self) -> &mut dyn HostUi {
        &mut self.host
    }

    fn recovery(&mut self) -> Option<&mut dyn Recovery> {
        Some(&mut self.recovery)
    }

    fn exhaust(&mut self, sequencer: &mut Sequencer<N>) -> parkline::Result<()> {
        while let Some((command, source)) = self.next_command() {
            self.execute(command.as_str(), source, sequencer)?;
        }
        Ok(())
    }

    fn process_now(&mut self, script: &str, sequencer: &mut Sequencer<N>) -> parkline::Result<()> {
        for line in script.lines() {
            self.execute(line, Source::Macro, sequencer)?;
        }
        Ok(())
    }
}
