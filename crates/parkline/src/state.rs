//! State captured for one pause bracket.

use crate::position::{AxisModes, Position};
use crate::queue::Command;

/// Machine state held between a pause and its resume.
///
/// `N` is the queue depth; the backup can never hold more commands than
/// the queue could.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PauseState<const N: usize> {
    position: Position,
    modes: AxisModes,
    backup: heapless::Vec<Command, N>,
}

impl<const N: usize> PauseState<N> {
    /// Empty state.
    pub fn new() -> Self {
        Self {
            position: Position::default(),
            modes: AxisModes::default(),
            backup: heapless::Vec::new(),
        }
    }

    /// Record the settled position and the addressing modes.
    pub fn capture(&mut self, position: Position, modes: AxisModes) {
        self.position = position;
        self.modes = modes;
    }

    /// Append a command to the backup. Returns the command when full.
    pub fn push_backup(&mut self, command: Command) -> Result<(), Command> {
        self.backup.push(command)
    }

    /// Position at pause time.
    pub fn position(&self) -> Position {
        self.position
    }

    /// Addressing modes at pause time.
    pub fn modes(&self) -> AxisModes {
        self.modes
    }

    /// Backed-up commands in original order.
    pub fn backup(&self) -> &[Command] {
        &self.backup
    }

    /// Number of backed-up commands.
    pub fn backup_size(&self) -> usize {
        self.backup.len()
    }

    /// Backup capacity.
    pub const fn capacity(&self) -> usize {
        N
    }
}
