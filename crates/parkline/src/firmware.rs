//! The collaborator bundle the sequencer drives.

use tracing::debug;

use crate::error::Result;
use crate::job::{HostUi, PrintJob, Recovery};
use crate::macros::MacroTable;
use crate::planner::Planner;
use crate::position::AxisModes;
use crate::queue::CommandQueue;
use crate::sequencer::Sequencer;

/// Everything a pause/resume transition touches.
///
/// The sequencer is passed back into [`exhaust`](Firmware::exhaust) and
/// [`process_now`](Firmware::process_now) so a dispatcher can route nested
/// `M24`/`M25` commands to it without owning it.
pub trait Firmware<const N: usize> {
    /// Pending-command queue.
    type Queue: CommandQueue;
    /// Motion planner.
    type Planner: Planner;

    /// The command queue.
    fn queue(&mut self) -> &mut Self::Queue;

    /// The motion planner.
    fn planner(&mut self) -> &mut Self::Planner;

    /// Current addressing modes.
    fn modes(&mut self) -> &mut AxisModes;

    /// Macro slots.
    fn macros(&self) -> &MacroTable;

    /// The SD print job.
    fn job(&mut self) -> &mut dyn PrintJob;

    /// Status display and host bridge.
    fn host(&mut self) -> &mut dyn HostUi;

    /// Power-loss recovery, when built in.
    fn recovery(&mut self) -> Option<&mut dyn Recovery> {
        None
    }

    /// Run the dispatch loop until the queue is empty.
    fn exhaust(&mut self, sequencer: &mut Sequencer<N>) -> Result<()>;

    /// Run newline-separated commands immediately, bypassing the queue.
    fn process_now(&mut self, script: &str, sequencer: &mut Sequencer<N>) -> Result<()>;

    /// Run a macro slot, falling back to the slot's default when empty.
    fn run_macro(&mut self, index: usize, sequencer: &mut Sequencer<N>) -> Result<()> {
        let script = self.macros().script(index)?.into_owned();
        if script.is_empty() {
            debug!(slot = index, "macro slot empty, nothing to run");
            return Ok(());
        }
        debug!(slot = index, "running macro");
        self.process_now(&script, sequencer)
    }
}
