//! Pause/resume sequencing (`M25`/`M24`).
//!
//! A pause captures the settled position, the addressing modes and every
//! command still waiting in the ring, then parks the head through macro
//! slot 0. A resume returns the head to the captured position, restores
//! the modes and replays the captured commands in their original order.
//!
//! Both transitions only run when the dispatcher is processing an injected
//! command. A request arriving any other way re-injects itself at the
//! front of the queue and returns; the transition then runs when the
//! dispatcher reaches it with priority.

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::error::{Result, SequencerError};
use crate::firmware::Firmware;
use crate::job::{HostAction, HostPrompt};
use crate::macros::{PARK_SLOT, RESUME_POST_MOVE_SLOT, RESUME_PRE_MOVE_SLOT};
use crate::planner::Planner;
use crate::position::AxisModes;
use crate::queue::{Command, CommandQueue};
use crate::state::PauseState;

/// Command that requests a pause.
pub const PAUSE_COMMAND: &str = "M25";

/// Command that requests a resume.
pub const RESUME_COMMAND: &str = "M24";

/// Sequencer settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SequencerConfig {
    /// Feedrate of the move back to the paused position (mm/min).
    pub resume_feedrate: f64,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            resume_feedrate: 4500.0,
        }
    }
}

/// Where the sequencer is in the pause bracket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Phase {
    /// No pause in effect.
    #[default]
    Idle,
    /// Pause re-injected, waiting for the dispatcher.
    PauseRequested,
    /// Pause transition running.
    Pausing,
    /// Parked, waiting for a resume.
    Paused,
    /// Resume re-injected, waiting for the dispatcher.
    ResumeRequested,
    /// Resume transition running.
    Resuming,
    /// A transition failed; the machine needs an operator.
    Halted,
}

/// Outcome of a pause or resume request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Transition {
    /// Request re-injected at the front of the queue.
    Resubmitted,
    /// The same request is already waiting in the priority lane.
    AlreadyRequested,
    /// Pause completed.
    Paused {
        /// Commands moved from the queue into the backup.
        backed_up: usize,
    },
    /// Already paused; only the paused flag was refreshed.
    AlreadyPaused,
    /// Resume completed.
    Resumed {
        /// Commands replayed into the queue.
        replayed: usize,
    },
    /// Resume requested while not paused; only status was refreshed.
    NotPaused,
    /// Another transition is running, or the machine is halted.
    Ignored,
}

/// Drives the pause/resume bracket and owns its [`PauseState`].
#[derive(Debug, Clone, Default)]
pub struct Sequencer<const N: usize> {
    config: SequencerConfig,
    phase: Phase,
    state: Option<PauseState<N>>,
}

impl<const N: usize> Sequencer<N> {
    /// Create an idle sequencer.
    pub fn new(config: SequencerConfig) -> Self {
        Self {
            config,
            phase: Phase::Idle,
            state: None,
        }
    }

    /// Settings in use.
    pub fn config(&self) -> &SequencerConfig {
        &self.config
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Is a pause in effect (parked or about to resume)?
    pub fn is_paused(&self) -> bool {
        matches!(self.phase, Phase::Paused | Phase::ResumeRequested)
    }

    /// Captured state. Kept after a halt and after a resume that found the
    /// job no longer paused.
    pub fn pause_state(&self) -> Option<&PauseState<N>> {
        self.state.as_ref()
    }

    /// Return to idle after operator intervention, handing back any
    /// captured state.
    pub fn reset(&mut self) -> Option<PauseState<N>> {
        self.phase = Phase::Idle;
        self.state.take()
    }

    /// Handle a pause request (`M25`).
    pub fn pause<F: Firmware<N>>(&mut self, fw: &mut F) -> Result<Transition> {
        match self.phase {
            Phase::Pausing | Phase::Resuming | Phase::Halted => {
                warn!(phase = ?self.phase, "pause ignored");
                return Ok(Transition::Ignored);
            }
            Phase::Paused | Phase::ResumeRequested => {
                fw.job().set_paused_for_resume(true);
                return Ok(Transition::AlreadyPaused);
            }
            Phase::Idle | Phase::PauseRequested => {}
        }

        if !fw.queue().is_processing_injected() {
            if self.phase == Phase::PauseRequested {
                debug!("pause already waiting for priority");
                return Ok(Transition::AlreadyRequested);
            }
            fw.queue().inject(Command::new(PAUSE_COMMAND)?)?;
            self.phase = Phase::PauseRequested;
            debug!("pause re-injected for priority");
            return Ok(Transition::Resubmitted);
        }

        let occupied = fw.queue().occupied();
        if occupied > N {
            self.phase = Phase::Idle;
            return Err(SequencerError::BackupOverflow {
                occupied,
                capacity: N,
            });
        }

        if let Some(stale) = self.state.take() {
            warn!(dropped = stale.backup_size(), "discarding abandoned pause state");
        }

        self.phase = Phase::Pausing;
        match self.run_pause(fw, occupied) {
            Ok(backed_up) => {
                fw.job().set_paused_for_resume(true);
                self.phase = Phase::Paused;
                info!(backed_up, "print paused");
                Ok(Transition::Paused { backed_up })
            }
            Err(err) => Err(self.halt(err)),
        }
    }

    /// Handle a resume request (`M24`).
    pub fn resume<F: Firmware<N>>(&mut self, fw: &mut F) -> Result<Transition> {
        match self.phase {
            Phase::Pausing | Phase::Resuming | Phase::Halted => {
                warn!(phase = ?self.phase, "resume ignored");
                return Ok(Transition::Ignored);
            }
            Phase::Idle | Phase::PauseRequested => return Ok(self.not_paused(fw)),
            Phase::Paused | Phase::ResumeRequested => {}
        }

        if !fw.job().is_paused_for_resume() {
            let stranded = self.state.as_ref().map_or(0, PauseState::backup_size);
            warn!(stranded, "job no longer paused, captured state left for reset");
            self.phase = Phase::Idle;
            return Ok(self.not_paused(fw));
        }

        if !fw.queue().is_processing_injected() {
            if self.phase == Phase::ResumeRequested {
                debug!("resume already waiting for priority");
                return Ok(Transition::AlreadyRequested);
            }
            fw.queue().inject(Command::new(RESUME_COMMAND)?)?;
            self.phase = Phase::ResumeRequested;
            debug!("resume re-injected for priority");
            return Ok(Transition::Resubmitted);
        }

        let Some(state) = self.state.take() else {
            self.phase = Phase::Idle;
            return Ok(self.not_paused(fw));
        };

        self.phase = Phase::Resuming;
        match self.run_resume(fw, &state) {
            Ok(replayed) => {
                self.phase = Phase::Idle;
                Self::finish_resume(fw);
                info!(replayed, "print resumed");
                Ok(Transition::Resumed { replayed })
            }
            Err(err) => {
                self.state = Some(state);
                Err(self.halt(err))
            }
        }
    }

    fn run_pause<F: Firmware<N>>(&mut self, fw: &mut F, occupied: usize) -> Result<usize> {
        let job = fw.job();
        if job.is_printing() {
            job.request_pause();
        }
        if let Some(recovery) = fw.recovery() {
            if recovery.enabled() {
                recovery.save();
            }
        }
        fw.job().pause_timer();

        let host = fw.host();
        host.reset_status();
        host.prompt(HostPrompt::PausedSd);
        host.action(HostAction::Paused);

        let mut state = PauseState::new();
        for _ in 0..occupied {
            let Some(command) = fw.queue().pop_next() else {
                break;
            };
            state
                .push_backup(command)
                .map_err(|_| SequencerError::BackupOverflow {
                    occupied,
                    capacity: N,
                })?;
        }
        debug!(backed_up = state.backup_size(), "queue drained");

        if let Err(err) = fw.planner().synchronize() {
            self.state = Some(state);
            return Err(err.into());
        }

        let position = fw.planner().current_position();
        let modes = *fw.modes();
        state.capture(position, modes);
        debug!(%position, ?modes, "pause state captured");

        *fw.modes() = AxisModes::PARKING;
        let backed_up = state.backup_size();
        self.state = Some(state);

        fw.run_macro(PARK_SLOT, self)?;
        Ok(backed_up)
    }

    fn run_resume<F: Firmware<N>>(&mut self, fw: &mut F, state: &PauseState<N>) -> Result<usize> {
        let target = state.position();

        fw.planner().restore_e(target.e);
        fw.exhaust(self)?;

        fw.run_macro(RESUME_PRE_MOVE_SLOT, self)?;
        fw.modes().set_relative_mode(false);
        // Travel only; E is put back logically once the post-move macro ran.
        let travel = target.with_e(fw.planner().current_position().e);
        debug!(%target, "returning to paused position");
        fw.planner()
            .blocking_move_to(travel, self.config.resume_feedrate / 60.0)?;
        fw.run_macro(RESUME_POST_MOVE_SLOT, self)?;

        fw.planner().restore_e(target.e);
        *fw.modes() = state.modes();
        fw.planner().synchronize()?;

        let needed = state.backup_size();
        let available = fw.queue().free_slots();
        if needed > available {
            return Err(SequencerError::ReplayOverflow { needed, available });
        }
        for command in state.backup() {
            fw.queue().enqueue_one_now(command.clone())?;
        }
        Ok(needed)
    }

    fn not_paused<F: Firmware<N>>(&mut self, fw: &mut F) -> Transition {
        let job = fw.job();
        if job.is_file_open() && !job.is_printing() && !job.is_paused_for_resume() {
            job.start_or_resume();
        }
        fw.host().reset_status();
        Transition::NotPaused
    }

    fn finish_resume<F: Firmware<N>>(fw: &mut F) {
        let job = fw.job();
        job.set_paused_for_resume(false);
        let file_open = job.is_file_open();
        if file_open {
            job.start_or_resume();
            if let Some(recovery) = fw.recovery() {
                if recovery.enabled() {
                    recovery.prepare();
                }
            }
        }

        let host = fw.host();
        host.action(HostAction::Resumed);
        host.prompt(HostPrompt::ResumingSd);
        host.reset_status();
    }

    fn halt(&mut self, err: SequencerError) -> SequencerError {
        error!(error = %err, phase = ?self.phase, "pause/resume halted");
        self.phase = Phase::Halted;
        err
    }
}

#[cfg(test)]
mod tests {
    use std::ops::{Deref, DerefMut};

    use approx::assert_relative_eq;

    use super::*;
    use crate::error::{MotionError, QueueError};
    use crate::job::{HostUi, PrintJob, Recovery};
    use crate::macros::MacroTable;
    use crate::position::{Axis, Position};
    use crate::queue::RingQueue;

    const DEPTH: usize = 4;

    #[derive(Default)]
    struct FakePlanner {
        current: Position,
        physical: Position,
        plan_e: f64,
        pending: Vec<Position>,
        syncs: usize,
        limit: Option<f64>,
        extruded: f64,
    }

    impl FakePlanner {
        fn buffer(&mut self, target: Position) -> std::result::Result<(), MotionError> {
            if self.limit.is_some_and(|limit| target.x > limit) {
                return Err(MotionError::Unreachable { target });
            }
            self.pending.push(target);
            self.extruded += target.e - self.current.e;
            self.current = target;
            self.plan_e = target.e;
            Ok(())
        }
    }

    impl Planner for FakePlanner {
        fn synchronize(&mut self) -> std::result::Result<(), MotionError> {
            if let Some(last) = self.pending.last() {
                self.physical = *last;
            }
            self.pending.clear();
            self.syncs += 1;
            Ok(())
        }

        fn current_position(&self) -> Position {
            self.current
        }

        fn set_current_position(&mut self, position: Position) {
            self.current = position;
        }

        fn sync_plan_position_e(&mut self) {
            self.plan_e = self.current.e;
        }

        fn blocking_move_to(
            &mut self,
            target: Position,
            _feedrate_mm_s: f64,
        ) -> std::result::Result<(), MotionError> {
            self.buffer(target)?;
            self.synchronize()
        }
    }

    #[derive(Default, Debug, Clone, PartialEq)]
    struct FakeJob {
        printing: bool,
        file_open: bool,
        pause_requested: bool,
        timer_paused: bool,
        paused_for_resume: bool,
        resumes: usize,
    }

    impl PrintJob for FakeJob {
        fn is_printing(&self) -> bool {
            self.printing
        }
        fn is_file_open(&self) -> bool {
            self.file_open
        }
        fn request_pause(&mut self) {
            self.pause_requested = true;
            self.printing = false;
        }
        fn pause_timer(&mut self) {
            self.timer_paused = true;
        }
        fn set_paused_for_resume(&mut self, paused: bool) {
            self.paused_for_resume = paused;
        }
        fn is_paused_for_resume(&self) -> bool {
            self.paused_for_resume
        }
        fn start_or_resume(&mut self) {
            self.printing = true;
            self.pause_requested = false;
            self.timer_paused = false;
            self.resumes += 1;
        }
    }

    #[derive(Default)]
    struct FakeHost {
        resets: usize,
        prompts: Vec<HostPrompt>,
        actions: Vec<HostAction>,
    }

    impl HostUi for FakeHost {
        fn set_status(&mut self, _message: &str) {}
        fn reset_status(&mut self) {
            self.resets += 1;
        }
        fn prompt(&mut self, prompt: HostPrompt) {
            self.prompts.push(prompt);
        }
        fn action(&mut self, action: HostAction) {
            self.actions.push(action);
        }
    }

    #[derive(Default)]
    struct FakeRecovery {
        saves: usize,
        prepares: usize,
    }

    impl Recovery for FakeRecovery {
        fn enabled(&self) -> bool {
            true
        }
        fn save(&mut self) {
            self.saves += 1;
        }
        fn prepare(&mut self) {
            self.prepares += 1;
        }
    }

    /// Ring queue that can report more occupancy than it holds.
    #[derive(Default)]
    struct SkewedQueue {
        ring: RingQueue<DEPTH>,
        phantom: usize,
    }

    impl Deref for SkewedQueue {
        type Target = RingQueue<DEPTH>;
        fn deref(&self) -> &Self::Target {
            &self.ring
        }
    }

    impl DerefMut for SkewedQueue {
        fn deref_mut(&mut self) -> &mut Self::Target {
            &mut self.ring
        }
    }

    impl CommandQueue for SkewedQueue {
        fn inject(&mut self, command: Command) -> std::result::Result<(), QueueError> {
            self.ring.inject(command)
        }
        fn enqueue_one_now(&mut self, command: Command) -> std::result::Result<(), QueueError> {
            self.ring.enqueue_one_now(command)
        }
        fn next_command(&mut self) -> Option<Command> {
            self.ring.next_command()
        }
        fn pop_next(&mut self) -> Option<Command> {
            self.ring.pop_next()
        }
        fn clear(&mut self) {
            self.ring.clear()
        }
        fn occupied(&self) -> usize {
            self.ring.occupied() + self.phantom
        }
        fn capacity(&self) -> usize {
            self.ring.capacity()
        }
        fn is_processing_injected(&self) -> bool {
            self.ring.is_processing_injected()
        }
    }

    #[derive(Default)]
    struct FakeFirmware {
        queue: SkewedQueue,
        planner: FakePlanner,
        modes: AxisModes,
        macros: MacroTable,
        job: FakeJob,
        host: FakeHost,
        recovery: FakeRecovery,
        executed: Vec<String>,
    }

    impl FakeFirmware {
        fn printing() -> Self {
            let mut fw = Self::default();
            fw.job.printing = true;
            fw.job.file_open = true;
            fw
        }

        fn enqueue(&mut self, line: &str) {
            self.queue
                .enqueue_one_now(Command::new(line).unwrap())
                .unwrap();
        }

        fn pending(&self) -> Vec<String> {
            self.queue.pending().map(|c| c.to_string()).collect()
        }

        fn execute(&mut self, line: &str, seq: &mut Sequencer<DEPTH>) -> Result<()> {
            self.executed.push(line.to_string());
            let mut words = line.split_whitespace();
            match words.next() {
                Some("M25") => {
                    seq.pause(self)?;
                }
                Some("M24") => {
                    seq.resume(self)?;
                }
                Some("G90") => self.modes.set_relative_mode(false),
                Some("G91") => self.modes.set_relative_mode(true),
                Some("M82") => self.modes.set_e_relative(false),
                Some("M83") => self.modes.set_e_relative(true),
                Some("G10") => {
                    let at = self.planner.current;
                    self.planner.blocking_move_to(at.with_e(at.e - 1.0), 10.0)?;
                }
                Some("G11") => {
                    let at = self.planner.current;
                    self.planner.blocking_move_to(at.with_e(at.e + 1.0), 10.0)?;
                }
                Some("G0") | Some("G1") => {
                    let mut target = self.planner.current;
                    for word in words {
                        let (letter, value) = word.split_at(1);
                        let Ok(value) = value.parse::<f64>() else {
                            continue;
                        };
                        let axis = match letter {
                            "X" => Axis::X,
                            "Y" => Axis::Y,
                            "Z" => Axis::Z,
                            "E" => Axis::E,
                            _ => continue,
                        };
                        let base = if self.modes.is_relative(axis) {
                            target.get(axis)
                        } else {
                            0.0
                        };
                        target.set(axis, base + value);
                    }
                    self.planner.buffer(target)?;
                }
                _ => {}
            }
            Ok(())
        }

        /// Dispatch one command, reporting the transition for M24/M25.
        fn step(&mut self, seq: &mut Sequencer<DEPTH>) -> Option<Transition> {
            let command = self.queue.next_command()?;
            match command.as_str() {
                PAUSE_COMMAND => Some(seq.pause(self).unwrap()),
                RESUME_COMMAND => Some(seq.resume(self).unwrap()),
                other => {
                    self.execute(other, seq).unwrap();
                    None
                }
            }
        }

        /// Run a request that already holds priority.
        fn request(&mut self, seq: &mut Sequencer<DEPTH>, command: &str) -> Transition {
            self.queue.inject(Command::new(command).unwrap()).unwrap();
            self.step(seq).unwrap()
        }
    }

    impl Firmware<DEPTH> for FakeFirmware {
        type Queue = SkewedQueue;
        type Planner = FakePlanner;

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
        fn exhaust(&mut self, seq: &mut Sequencer<DEPTH>) -> Result<()> {
            while let Some(command) = self.queue.next_command() {
                self.execute(command.as_str(), seq)?;
            }
            Ok(())
        }
        fn process_now(&mut self, script: &str, seq: &mut Sequencer<DEPTH>) -> Result<()> {
            for line in script.lines() {
                self.execute(line, seq)?;
            }
            Ok(())
        }
    }

    fn sequencer() -> Sequencer<DEPTH> {
        Sequencer::new(SequencerConfig::default())
    }

    #[test]
    fn test_top_level_pause_only_reinjects() {
        let mut fw = FakeFirmware::printing();
        let mut seq = sequencer();
        fw.enqueue("M25");
        fw.enqueue("G1 X1");

        assert_eq!(fw.step(&mut seq), Some(Transition::Resubmitted));
        assert_eq!(seq.phase(), Phase::PauseRequested);
        assert_eq!(fw.queue.injected_len(), 1);
        assert_eq!(fw.pending(), vec!["G1 X1"]);
        assert!(fw.job.printing);
        assert!(fw.host.actions.is_empty());
    }

    #[test]
    fn test_waiting_request_is_not_injected_twice() {
        let mut fw = FakeFirmware::printing();
        let mut seq = sequencer();
        fw.enqueue("M25");
        fw.enqueue("G1 X1");

        assert_eq!(fw.step(&mut seq), Some(Transition::Resubmitted));
        assert_eq!(seq.pause(&mut fw).unwrap(), Transition::AlreadyRequested);
        assert_eq!(fw.queue.injected_len(), 1);

        assert_eq!(
            fw.step(&mut seq),
            Some(Transition::Paused { backed_up: 1 })
        );
        assert_eq!(fw.queue.injected_len(), 0);
    }

    #[test]
    fn test_round_trip_preserves_queue() {
        let mut fw = FakeFirmware::printing();
        let mut seq = sequencer();
        for line in ["M25", "G1 X1", "G1 X2", "G1 X3"] {
            fw.enqueue(line);
        }

        assert_eq!(fw.step(&mut seq), Some(Transition::Resubmitted));
        assert_eq!(
            fw.step(&mut seq),
            Some(Transition::Paused { backed_up: 3 })
        );
        assert!(fw.pending().is_empty());
        assert!(fw.job.paused_for_resume);
        assert!(fw.job.pause_requested);

        fw.enqueue("M24");
        assert_eq!(fw.step(&mut seq), Some(Transition::Resubmitted));
        assert_eq!(
            fw.step(&mut seq),
            Some(Transition::Resumed { replayed: 3 })
        );

        assert_eq!(fw.pending(), vec!["G1 X1", "G1 X2", "G1 X3"]);
        assert!(fw.executed.iter().all(|line| !line.starts_with("G1 X")));
        assert!(!fw.job.paused_for_resume);
        assert!(fw.job.printing);
        assert_eq!(seq.phase(), Phase::Idle);
        assert!(seq.pause_state().is_none());
    }

    #[test]
    fn test_position_and_modes_restored() {
        let combos = [(false, false), (false, true), (true, false), (true, true)];
        for (relative_xyz, relative_e) in combos {
            let mut fw = FakeFirmware::printing();
            let mut seq = sequencer();
            let paused_at = Position::new(42.0, 17.5, 3.2, 118.25);
            fw.planner.set_current_position(paused_at);
            fw.modes = AxisModes {
                relative_xyz,
                relative_e,
            };

            fw.request(&mut seq, PAUSE_COMMAND);
            assert_eq!(fw.modes, AxisModes::PARKING);
            assert_relative_eq!(fw.planner.current.x, 0.0);

            fw.request(&mut seq, RESUME_COMMAND);
            let restored = fw.planner.current;
            assert_relative_eq!(restored.x, paused_at.x);
            assert_relative_eq!(restored.y, paused_at.y);
            assert_relative_eq!(restored.z, paused_at.z);
            assert_relative_eq!(restored.e, paused_at.e);
            assert_relative_eq!(fw.planner.plan_e, paused_at.e);
            assert_eq!(
                fw.modes,
                AxisModes {
                    relative_xyz,
                    relative_e
                }
            );
        }
    }

    #[test]
    fn test_position_sampled_after_synchronize() {
        let mut fw = FakeFirmware::printing();
        let mut seq = sequencer();
        fw.planner.buffer(Position::new(10.0, 20.0, 0.3, 1.0)).unwrap();
        assert_eq!(fw.planner.physical, Position::default());

        fw.request(&mut seq, PAUSE_COMMAND);
        let captured = seq.pause_state().unwrap().position();
        assert_eq!(captured, Position::new(10.0, 20.0, 0.3, 1.0));
    }

    #[test]
    fn test_second_pause_is_idempotent() {
        let mut fw = FakeFirmware::printing();
        let mut seq = sequencer();
        fw.enqueue("G1 X1");
        fw.enqueue("G1 X2");

        assert_eq!(
            fw.request(&mut seq, PAUSE_COMMAND),
            Transition::Paused { backed_up: 2 }
        );
        let state = seq.pause_state().cloned();
        let position = fw.planner.current;
        let job = fw.job.clone();
        let executed = fw.executed.len();

        assert_eq!(fw.request(&mut seq, PAUSE_COMMAND), Transition::AlreadyPaused);
        assert_eq!(seq.pause_state().cloned(), state);
        assert_eq!(fw.planner.current, position);
        assert_eq!(fw.job, job);
        assert_eq!(fw.modes, AxisModes::PARKING);
        assert!(fw.pending().is_empty());
        assert_eq!(fw.executed.len(), executed);
    }

    #[test]
    fn test_resume_when_not_paused_changes_nothing() {
        let mut fw = FakeFirmware::printing();
        let mut seq = sequencer();
        fw.enqueue("G1 X1");
        fw.modes = AxisModes {
            relative_xyz: true,
            relative_e: true,
        };
        let position = fw.planner.current;

        fw.queue.inject(Command::new(RESUME_COMMAND).unwrap()).unwrap();
        assert_eq!(fw.step(&mut seq), Some(Transition::NotPaused));

        assert_eq!(fw.planner.current, position);
        assert!(fw.modes.relative_xyz && fw.modes.relative_e);
        assert_eq!(fw.pending(), vec!["G1 X1"]);
        assert_eq!(fw.host.resets, 1);
        assert_eq!(fw.job.resumes, 0);
    }

    #[test]
    fn test_resume_starts_open_job() {
        let mut fw = FakeFirmware::default();
        fw.job.file_open = true;
        let mut seq = sequencer();

        fw.enqueue(RESUME_COMMAND);
        assert_eq!(fw.step(&mut seq), Some(Transition::NotPaused));
        assert!(fw.job.printing);
        assert_eq!(fw.job.resumes, 1);
    }

    #[test]
    fn test_full_queue_backs_up_everything() {
        let mut fw = FakeFirmware::printing();
        let mut seq = sequencer();
        let lines = ["G1 X1", "G1 X2", "G1 X3", "G1 X4"];
        for line in lines {
            fw.enqueue(line);
        }
        assert!(fw.queue.is_full());

        fw.queue.inject(Command::new(PAUSE_COMMAND).unwrap()).unwrap();
        assert_eq!(
            fw.step(&mut seq),
            Some(Transition::Paused { backed_up: DEPTH })
        );
        assert_eq!(seq.pause_state().unwrap().backup_size(), DEPTH);

        fw.queue.inject(Command::new(RESUME_COMMAND).unwrap()).unwrap();
        assert_eq!(
            fw.step(&mut seq),
            Some(Transition::Resumed { replayed: DEPTH })
        );
        assert_eq!(fw.pending(), lines);
    }

    #[test]
    fn test_empty_queue_replays_nothing() {
        let mut fw = FakeFirmware::printing();
        let mut seq = sequencer();

        assert_eq!(
            fw.request(&mut seq, PAUSE_COMMAND),
            Transition::Paused { backed_up: 0 }
        );
        assert_eq!(
            fw.request(&mut seq, RESUME_COMMAND),
            Transition::Resumed { replayed: 0 }
        );
        assert!(fw.pending().is_empty());
    }

    #[test]
    fn test_default_macros_bracket_the_pause() {
        let mut fw = FakeFirmware::printing();
        let mut seq = sequencer();
        fw.request(&mut seq, PAUSE_COMMAND);
        fw.request(&mut seq, RESUME_COMMAND);

        assert_eq!(fw.executed, ["G10", "G1 F4500 X0 Y0", "G11", "G10", "G11"]);
    }

    #[test]
    fn test_undefined_macro_slot_is_a_no_op() {
        let mut fw = FakeFirmware::default();
        let mut seq = sequencer();
        fw.run_macro(7, &mut seq).unwrap();
        assert!(fw.executed.is_empty());
        assert_eq!(fw.planner.current, Position::default());
        assert!(fw.run_macro(10, &mut seq).is_err());
    }

    #[test]
    fn test_host_and_recovery_notified() {
        let mut fw = FakeFirmware::printing();
        let mut seq = sequencer();
        fw.request(&mut seq, PAUSE_COMMAND);
        assert!(fw.job.timer_paused);
        assert_eq!(fw.recovery.saves, 1);
        assert_eq!(fw.host.prompts, [HostPrompt::PausedSd]);
        assert_eq!(fw.host.actions, [HostAction::Paused]);

        fw.request(&mut seq, RESUME_COMMAND);
        assert_eq!(fw.recovery.prepares, 1);
        assert!(!fw.job.timer_paused);
        assert_eq!(
            fw.host.prompts,
            [HostPrompt::PausedSd, HostPrompt::ResumingSd]
        );
        assert_eq!(fw.host.actions, [HostAction::Paused, HostAction::Resumed]);
    }

    #[test]
    fn test_nested_pause_inside_macro_is_ignored() {
        let mut fw = FakeFirmware::printing();
        fw.macros.set(PARK_SLOT, "M25|G1 X5 Y5").unwrap();
        let mut seq = sequencer();

        assert_eq!(
            fw.request(&mut seq, PAUSE_COMMAND),
            Transition::Paused { backed_up: 0 }
        );
        assert_eq!(seq.phase(), Phase::Paused);
        assert_relative_eq!(fw.planner.current.x, 5.0);
    }

    #[test]
    fn test_commands_queued_while_paused_run_before_return_move() {
        let mut fw = FakeFirmware::printing();
        let mut seq = sequencer();
        fw.request(&mut seq, PAUSE_COMMAND);

        fw.enqueue("G1 Z50");
        fw.queue.inject(Command::new(RESUME_COMMAND).unwrap()).unwrap();
        assert_eq!(
            fw.step(&mut seq),
            Some(Transition::Resumed { replayed: 0 })
        );
        assert!(fw.executed.iter().any(|line| line == "G1 Z50"));
        assert_relative_eq!(fw.planner.current.z, 0.0);
    }

    #[test]
    fn test_unreachable_return_move_halts() {
        let mut fw = FakeFirmware::printing();
        let mut seq = sequencer();
        fw.enqueue("G1 X1");
        fw.planner.set_current_position(Position::new(500.0, 0.0, 0.0, 0.0));
        fw.request(&mut seq, PAUSE_COMMAND);
        fw.planner.limit = Some(300.0);

        fw.queue.inject(Command::new(RESUME_COMMAND).unwrap()).unwrap();
        fw.queue.next_command();
        let err = seq.resume(&mut fw).unwrap_err();
        assert!(matches!(
            err,
            SequencerError::Motion(MotionError::Unreachable { .. })
        ));
        assert_eq!(seq.phase(), Phase::Halted);
        assert_eq!(seq.pause_state().unwrap().backup_size(), 1);
        assert!(fw.pending().is_empty());

        fw.queue.inject(Command::new(PAUSE_COMMAND).unwrap()).unwrap();
        assert_eq!(fw.step(&mut seq), Some(Transition::Ignored));

        let stranded = seq.reset().unwrap();
        assert_eq!(stranded.backup()[0].as_str(), "G1 X1");
        assert_eq!(seq.phase(), Phase::Idle);
    }

    #[test]
    fn test_return_move_travels_without_extruding() {
        let mut fw = FakeFirmware::printing();
        let mut seq = sequencer();
        fw.planner
            .set_current_position(Position::new(60.0, 20.0, 1.0, 12.0));
        fw.request(&mut seq, PAUSE_COMMAND);
        assert_relative_eq!(fw.planner.extruded, 0.0);

        fw.request(&mut seq, RESUME_COMMAND);
        assert_relative_eq!(fw.planner.extruded, 0.0);
        assert_relative_eq!(fw.planner.current.x, 60.0);
        assert_relative_eq!(fw.planner.current.e, 12.0);
        assert_relative_eq!(fw.planner.plan_e, 12.0);
    }

    #[test]
    fn test_stale_pause_keeps_backup_for_reset() {
        let mut fw = FakeFirmware::printing();
        let mut seq = sequencer();
        fw.enqueue("G1 X1");
        fw.enqueue("G1 X2");
        fw.request(&mut seq, PAUSE_COMMAND);

        fw.job.paused_for_resume = false;
        assert_eq!(fw.request(&mut seq, RESUME_COMMAND), Transition::NotPaused);
        assert_eq!(seq.phase(), Phase::Idle);
        assert_eq!(seq.pause_state().unwrap().backup_size(), 2);

        let stranded = seq.reset().unwrap();
        let lines: Vec<_> = stranded.backup().iter().map(|c| c.as_str()).collect();
        assert_eq!(lines, ["G1 X1", "G1 X2"]);
    }

    #[test]
    fn test_backup_overflow_leaves_machine_untouched() {
        let mut fw = FakeFirmware::printing();
        let mut seq = sequencer();
        fw.enqueue("G1 X1");
        fw.queue.phantom = DEPTH;
        fw.modes = AxisModes::ABSOLUTE;
        let position = fw.planner.current;

        fw.queue.inject(Command::new(PAUSE_COMMAND).unwrap()).unwrap();
        fw.queue.next_command();
        let err = seq.pause(&mut fw).unwrap_err();
        assert_eq!(
            err,
            SequencerError::BackupOverflow {
                occupied: DEPTH + 1,
                capacity: DEPTH
            }
        );

        assert_eq!(seq.phase(), Phase::Idle);
        assert!(seq.pause_state().is_none());
        assert_eq!(fw.pending(), vec!["G1 X1"]);
        assert_eq!(fw.planner.current, position);
        assert_eq!(fw.planner.syncs, 0);
        assert_eq!(fw.modes, AxisModes::ABSOLUTE);
        assert!(fw.job.printing && !fw.job.paused_for_resume);
        assert!(fw.host.actions.is_empty());
        assert_eq!(fw.recovery.saves, 0);
        assert!(fw.executed.is_empty());
    }

    #[test]
    fn test_replay_overflow_halts_before_replaying() {
        let mut fw = FakeFirmware::printing();
        let mut seq = sequencer();
        fw.enqueue("G1 X1");
        fw.enqueue("G1 X2");
        assert_eq!(
            fw.request(&mut seq, PAUSE_COMMAND),
            Transition::Paused { backed_up: 2 }
        );

        fw.queue.phantom = DEPTH - 1;
        fw.queue.inject(Command::new(RESUME_COMMAND).unwrap()).unwrap();
        fw.queue.next_command();
        let err = seq.resume(&mut fw).unwrap_err();
        assert_eq!(
            err,
            SequencerError::ReplayOverflow {
                needed: 2,
                available: 1
            }
        );

        assert_eq!(seq.phase(), Phase::Halted);
        assert!(fw.pending().is_empty());
        assert_eq!(seq.pause_state().unwrap().backup_size(), 2);
    }
}
