//! Error types for pause/resume sequencing.

use thiserror::Error;

use crate::position::Position;

/// Errors from the command queue.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueueError {
    /// The ring (or the injected lane) has no free slot.
    #[error("command queue is full ({capacity} slots)")]
    Full {
        /// Capacity of the lane that rejected the command.
        capacity: usize,
    },

    /// Command text does not fit a queue slot.
    #[error("command too long: {len} bytes (max {max})")]
    CommandTooLong {
        /// Length of the rejected text.
        len: usize,
        /// Maximum slot length.
        max: usize,
    },
}

/// Errors from the motion layer. These are never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MotionError {
    /// Target lies outside the reachable volume.
    #[error("unreachable target {target}")]
    Unreachable {
        /// Requested position.
        target: Position,
    },

    /// Planner stopped after an earlier fault.
    #[error("planner halted: {0}")]
    Halted(String),
}

/// Configuration errors from the macro table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MacroError {
    /// No such slot.
    #[error("macro slot {index} out of range (0..{slots})")]
    SlotOutOfRange {
        /// Requested slot.
        index: usize,
        /// Number of slots.
        slots: usize,
    },

    /// Macro text exceeds the slot size.
    #[error("macro too long: {len} bytes (max {max})")]
    TooLong {
        /// Length of the rejected text.
        len: usize,
        /// Slot size.
        max: usize,
    },
}

/// Errors that can stop a pause or resume transition.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SequencerError {
    /// Queue operation failed.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Motion failed; the machine is halted.
    #[error(transparent)]
    Motion(#[from] MotionError),

    /// Macro lookup failed.
    #[error(transparent)]
    Macro(#[from] MacroError),

    /// More commands are queued than the backup can hold.
    #[error("cannot back up {occupied} queued commands (capacity {capacity})")]
    BackupOverflow {
        /// Commands in the ring at pause time.
        occupied: usize,
        /// Backup capacity.
        capacity: usize,
    },

    /// Not enough free queue slots to replay the backup.
    #[error("cannot replay {needed} commands, only {available} queue slots free")]
    ReplayOverflow {
        /// Backed-up commands.
        needed: usize,
        /// Free ring slots.
        available: usize,
    },

    /// Failure reported by a firmware collaborator.
    #[error("firmware error: {0}")]
    Firmware(String),
}

/// Result type for sequencer operations.
pub type Result<T> = std::result::Result<T, SequencerError>;
