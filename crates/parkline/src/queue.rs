//! Command queue contract and a bounded two-lane implementation.
//!
//! The queue has two lanes. The injected lane holds priority commands that
//! run before anything in the ring; the ring holds ordinary pending work
//! (job lines, host commands) in arrival order. Running the queue to
//! completion ("exhaust") needs a dispatcher, so it lives on
//! [`Firmware`](crate::Firmware) rather than here.

use std::fmt;

use heapless::Deque;

use crate::error::QueueError;

/// Maximum length of one command line in bytes.
pub const MAX_CMD_SIZE: usize = 96;

/// Default ring depth.
pub const BUFSIZE: usize = 4;

/// One G-code command line held in a fixed-size slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Command(heapless::String<MAX_CMD_SIZE>);

impl Command {
    /// Copy `text` into a slot. Surrounding whitespace is dropped.
    pub fn new(text: &str) -> Result<Self, QueueError> {
        let text = text.trim();
        let mut line = heapless::String::new();
        line.push_str(text).map_err(|_| QueueError::CommandTooLong {
            len: text.len(),
            max: MAX_CMD_SIZE,
        })?;
        Ok(Self(line))
    }

    /// Command text.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl AsRef<str> for Command {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pending-command queue as seen by the sequencer.
pub trait CommandQueue {
    /// Place a command in the priority lane, ahead of everything in the ring.
    fn inject(&mut self, command: Command) -> Result<(), QueueError>;

    /// Append a command to the back of the ring.
    fn enqueue_one_now(&mut self, command: Command) -> Result<(), QueueError>;

    /// Dispatch primitive: take the next command to run, injected lane first.
    fn next_command(&mut self) -> Option<Command>;

    /// Drain primitive: take the front of the ring, ignoring the injected lane.
    fn pop_next(&mut self) -> Option<Command>;

    /// Drop everything in both lanes.
    fn clear(&mut self);

    /// Commands waiting in the ring.
    fn occupied(&self) -> usize;

    /// Ring depth.
    fn capacity(&self) -> usize;

    /// Whether the command most recently returned by
    /// [`next_command`](Self::next_command) came from the injected lane.
    fn is_processing_injected(&self) -> bool;

    /// Free ring slots.
    fn free_slots(&self) -> usize {
        self.capacity().saturating_sub(self.occupied())
    }
}

/// Bounded queue with an `N`-deep ring and an `N`-deep injected lane.
#[derive(Debug, Clone)]
pub struct RingQueue<const N: usize> {
    ring: Deque<Command, N>,
    injected: Deque<Command, N>,
    processing_injected: bool,
}

impl<const N: usize> Default for RingQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RingQueue<N> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            ring: Deque::new(),
            injected: Deque::new(),
            processing_injected: false,
        }
    }

    /// Commands waiting in the ring, front first.
    pub fn pending(&self) -> impl Iterator<Item = &Command> {
        self.ring.iter()
    }

    /// Commands waiting in the injected lane.
    pub fn injected_len(&self) -> usize {
        self.injected.len()
    }

    /// True when both lanes are empty.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty() && self.injected.is_empty()
    }

    /// True when the ring has no free slot.
    pub fn is_full(&self) -> bool {
        self.ring.is_full()
    }
}

impl<const N: usize> CommandQueue for RingQueue<N> {
    fn inject(&mut self, command: Command) -> Result<(), QueueError> {
        self.injected
            .push_back(command)
            .map_err(|_| QueueError::Full { capacity: N })
    }

    fn enqueue_one_now(&mut self, command: Command) -> Result<(), QueueError> {
        self.ring
            .push_back(command)
            .map_err(|_| QueueError::Full { capacity: N })
    }

    fn next_command(&mut self) -> Option<Command> {
        if let Some(command) = self.injected.pop_front() {
            self.processing_injected = true;
            return Some(command);
        }
        self.processing_injected = false;
        self.ring.pop_front()
    }

    fn pop_next(&mut self) -> Option<Command> {
        self.ring.pop_front()
    }

    fn clear(&mut self) {
        self.ring.clear();
        self.injected.clear();
    }

    fn occupied(&self) -> usize {
        self.ring.len()
    }

    fn capacity(&self) -> usize {
        N
    }

    fn is_processing_injected(&self) -> bool {
        self.processing_injected
    }
}
