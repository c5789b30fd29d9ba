//! Motion planner contract.

use crate::error::MotionError;
use crate::position::Position;

/// Background motion planner.
///
/// Moves are buffered and executed asynchronously to command dispatch.
/// [`synchronize`](Planner::synchronize) is the only way to wait for them.
pub trait Planner {
    /// Block until every buffered move has physically completed.
    fn synchronize(&mut self) -> Result<(), MotionError>;

    /// Logical position the next move starts from.
    fn current_position(&self) -> Position;

    /// Overwrite the logical position without moving.
    fn set_current_position(&mut self, position: Position);

    /// Make the planner's extruder position agree with the logical E value.
    fn sync_plan_position_e(&mut self);

    /// Move to `target` and wait for the move to complete.
    fn blocking_move_to(&mut self, target: Position, feedrate_mm_s: f64)
        -> Result<(), MotionError>;

    /// Flow override in percent, for display.
    fn flow_percentage(&self) -> u16 {
        100
    }

    /// Set the logical extruder position and sync it into the planner.
    fn restore_e(&mut self, e: f64) {
        let position = self.current_position().with_e(e);
        self.set_current_position(position);
        self.sync_plan_position_e();
    }
}
