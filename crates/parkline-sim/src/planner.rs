//! Simulated motion planner.
//!
//! Moves land in a fixed-size block buffer and only "complete" when the
//! planner synchronizes, either because the buffer filled up or because a
//! caller waited for it. Targets outside the machine's build volume are
//! refused and leave the planner halted until [`SimPlanner::clear_halt`].

use heapless::Deque;
use parkline::{Axis, MotionError, Planner, Position};
use serde::Serialize;
use tracing::{debug, error, trace};

use crate::profile::MachineProfile;

/// Depth of the planner's block buffer.
pub const BLOCK_BUFFER_SIZE: usize = 16;

/// One buffered linear move.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PlannedMove {
    /// Planner position the move starts from.
    pub from: Position,
    /// Target position.
    pub to: Position,
    /// Feedrate after machine limits (mm/s).
    pub feedrate_mm_s: f64,
}

impl PlannedMove {
    /// Travel length; extruder travel for extruder-only moves (mm).
    pub fn length(&self) -> f64 {
        let dx = self.to.x - self.from.x;
        let dy = self.to.y - self.from.y;
        let dz = self.to.z - self.from.z;
        let xyz = (dx * dx + dy * dy + dz * dz).sqrt();
        if xyz > 0.0 {
            xyz
        } else {
            (self.to.e - self.from.e).abs()
        }
    }

    /// Time the move takes (s).
    pub fn duration_s(&self) -> f64 {
        if self.feedrate_mm_s > 0.0 {
            self.length() / self.feedrate_mm_s
        } else {
            0.0
        }
    }
}

/// Planner for the simulated machine.
#[derive(Debug, Clone)]
pub struct SimPlanner {
    profile: MachineProfile,
    current: Position,
    planned: Position,
    physical: Position,
    blocks: Deque<PlannedMove, BLOCK_BUFFER_SIZE>,
    completed: Vec<PlannedMove>,
    motion_time_s: f64,
    syncs: usize,
    flow_percentage: u16,
    halted: Option<String>,
}

impl SimPlanner {
    /// Planner at the origin for `profile`.
    pub fn new(profile: MachineProfile) -> Self {
        Self {
            profile,
            current: Position::default(),
            planned: Position::default(),
            physical: Position::default(),
            blocks: Deque::new(),
            completed: Vec::new(),
            motion_time_s: 0.0,
            syncs: 0,
            flow_percentage: 100,
            halted: None,
        }
    }

    /// Machine limits in use.
    pub fn profile(&self) -> &MachineProfile {
        &self.profile
    }

    /// Position the last completed move ended at.
    pub fn physical_position(&self) -> Position {
        self.physical
    }

    /// Position the planner plans the next move from.
    pub fn planned_position(&self) -> Position {
        self.planned
    }

    /// Moves still waiting in the block buffer.
    pub fn buffered(&self) -> usize {
        self.blocks.len()
    }

    /// Completed moves, oldest first.
    pub fn completed(&self) -> &[PlannedMove] {
        &self.completed
    }

    /// Total time of completed moves (s).
    pub fn motion_time_s(&self) -> f64 {
        self.motion_time_s
    }

    /// Number of synchronizations so far.
    pub fn syncs(&self) -> usize {
        self.syncs
    }

    /// Why the planner refuses motion, if it does.
    pub fn halted(&self) -> Option<&str> {
        self.halted.as_deref()
    }

    /// Accept motion again after a halt. Buffered moves are discarded.
    pub fn clear_halt(&mut self) {
        self.halted = None;
        self.blocks.clear();
        self.planned = self.physical;
        self.current = self.physical;
    }

    /// Set the flow override (`M221`).
    pub fn set_flow_percentage(&mut self, percent: u16) {
        self.flow_percentage = percent;
    }

    /// Make the planner position agree with the logical position (`G92`).
    pub fn sync_plan_position(&mut self) {
        self.planned = self.current;
    }

    /// Queue a move to `target`. Syncs first when the block buffer is full.
    pub fn buffer_line(&mut self, target: Position, feedrate_mm_s: f64) -> Result<(), MotionError> {
        if let Some(reason) = &self.halted {
            return Err(MotionError::Halted(reason.clone()));
        }
        if !self.profile.in_bounds(target.x, target.y, target.z) {
            let reason = format!("move to {target} leaves the build volume");
            error!(%target, profile = %self.profile.key, "refusing move");
            self.halted = Some(reason);
            return Err(MotionError::Unreachable { target });
        }
        if self.blocks.is_full() {
            trace!("block buffer full, waiting");
            self.synchronize()?;
        }

        let block = PlannedMove {
            from: self.planned,
            to: target,
            feedrate_mm_s: self.limit_feedrate(self.planned, target, feedrate_mm_s),
        };
        self.blocks
            .push_back(block)
            .map_err(|_| MotionError::Halted("block buffer overflow".into()))?;
        self.planned = target;
        self.current = target;
        Ok(())
    }

    /// Scale `feedrate_mm_s` down so no axis exceeds its limit.
    fn limit_feedrate(&self, from: Position, to: Position, feedrate_mm_s: f64) -> f64 {
        let block = PlannedMove {
            from,
            to,
            feedrate_mm_s,
        };
        let length = block.length();
        if length <= 0.0 || feedrate_mm_s <= 0.0 {
            return feedrate_mm_s;
        }

        let limits = self.profile.max_feedrates();
        let mut scale: f64 = 1.0;
        for (axis, limit) in Axis::ALL.into_iter().zip(limits) {
            let delta = (to.get(axis) - from.get(axis)).abs();
            let axis_speed = feedrate_mm_s * delta / length;
            if axis_speed > limit {
                scale = scale.min(limit / axis_speed);
            }
        }
        feedrate_mm_s * scale
    }
}

impl Planner for SimPlanner {
    fn synchronize(&mut self) -> Result<(), MotionError> {
        if let Some(reason) = &self.halted {
            return Err(MotionError::Halted(reason.clone()));
        }
        let drained = self.blocks.len();
        while let Some(block) = self.blocks.pop_front() {
            self.motion_time_s += block.duration_s();
            self.physical = block.to;
            self.completed.push(block);
        }
        self.syncs += 1;
        debug!(drained, position = %self.physical, "planner synchronized");
        Ok(())
    }

    fn current_position(&self) -> Position {
        self.current
    }

    fn set_current_position(&mut self, position: Position) {
        self.current = position;
    }

    fn sync_plan_position_e(&mut self) {
        self.planned.e = self.current.e;
    }

    fn blocking_move_to(&mut self, target: Position, feedrate_mm_s: f64) -> Result<(), MotionError> {
        self.buffer_line(target, feedrate_mm_s)?;
        self.synchronize()
    }

    fn flow_percentage(&self) -> u16 {
        self.flow_percentage
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    fn planner() -> SimPlanner {
        SimPlanner::new(MachineProfile::generic())
    }

    #[test]
    fn test_moves_complete_on_sync() {
        let mut planner = planner();
        planner.buffer_line(Position::new(10.0, 0.0, 0.0, 0.0), 50.0).unwrap();
        assert_eq!(planner.buffered(), 1);
        assert_eq!(planner.physical_position(), Position::default());
        assert_eq!(planner.current_position().x, 10.0);

        planner.synchronize().unwrap();
        assert_eq!(planner.buffered(), 0);
        assert_eq!(planner.physical_position().x, 10.0);
        assert_relative_eq!(planner.motion_time_s(), 0.2);
    }

    #[test]
    fn test_full_buffer_syncs_first() {
        let mut planner = planner();
        for i in 0..BLOCK_BUFFER_SIZE {
            planner
                .buffer_line(Position::new(i as f64 + 1.0, 0.0, 0.0, 0.0), 50.0)
                .unwrap();
        }
        assert_eq!(planner.syncs(), 0);
        planner.buffer_line(Position::new(100.0, 0.0, 0.0, 0.0), 50.0).unwrap();
        assert_eq!(planner.syncs(), 1);
        assert_eq!(planner.buffered(), 1);
        assert_eq!(planner.completed().len(), BLOCK_BUFFER_SIZE);
    }

    #[test]
    fn test_feedrate_limited_per_axis() {
        let mut planner = planner();
        planner.buffer_line(Position::new(0.0, 0.0, 10.0, 0.0), 100.0).unwrap();
        planner.synchronize().unwrap();
        let block = planner.completed()[0];
        assert_relative_eq!(block.feedrate_mm_s, 10.0);
        assert_relative_eq!(planner.motion_time_s(), 1.0);
    }

    #[test]
    fn test_out_of_bounds_halts() {
        let mut planner = planner();
        let target = Position::new(500.0, 0.0, 0.0, 0.0);
        assert_eq!(
            planner.buffer_line(target, 50.0),
            Err(MotionError::Unreachable { target })
        );
        assert!(planner.halted().is_some());
        assert!(matches!(planner.synchronize(), Err(MotionError::Halted(_))));

        planner.clear_halt();
        assert!(planner.synchronize().is_ok());
    }

    #[test]
    fn test_restore_e_syncs_plan_position() {
        let mut planner = planner();
        planner.buffer_line(Position::new(0.0, 0.0, 0.0, 5.0), 10.0).unwrap();
        planner.restore_e(2.0);
        assert_eq!(planner.current_position().e, 2.0);
        assert_eq!(planner.planned_position().e, 2.0);
    }
}
