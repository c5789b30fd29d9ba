//! Fixed-size G-code macro slots (`M810`..`M819`).

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::error::MacroError;

/// Number of macro slots.
pub const MACRO_SLOTS: usize = 10;

/// Capacity of one slot in bytes.
pub const MACRO_SLOT_SIZE: usize = 50;

/// M-code of slot 0.
pub const MACRO_BASE_CODE: u16 = 810;

/// Slot run after the pause has captured state (park the head).
pub const PARK_SLOT: usize = 0;

/// Slot run before the resume move.
pub const RESUME_PRE_MOVE_SLOT: usize = 1;

/// Slot run after the resume move.
pub const RESUME_POST_MOVE_SLOT: usize = 2;

/// Line separator accepted in macro text.
pub const LINE_SURROGATE: char = '|';

/// Park coordinate used by the default slot-0 macro.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParkMove {
    /// Park X (mm).
    pub x: f64,
    /// Park Y (mm).
    pub y: f64,
    /// Feedrate (mm/min).
    pub feedrate: f64,
}

impl Default for ParkMove {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            feedrate: 4500.0,
        }
    }
}

/// Macro slot for an `M810`..`M819` code.
pub fn slot_for_code(code: u16) -> Option<usize> {
    let index = usize::from(code.checked_sub(MACRO_BASE_CODE)?);
    (index < MACRO_SLOTS).then_some(index)
}

/// Stored macro text per slot.
#[derive(Debug, Clone)]
pub struct MacroTable {
    slots: [heapless::String<MACRO_SLOT_SIZE>; MACRO_SLOTS],
    park: ParkMove,
}

impl Default for MacroTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MacroTable {
    /// Empty table parking at the default coordinate.
    pub fn new() -> Self {
        Self::with_park(ParkMove::default())
    }

    /// Empty table parking at `park`.
    pub fn with_park(park: ParkMove) -> Self {
        Self {
            slots: std::array::from_fn(|_| heapless::String::new()),
            park,
        }
    }

    /// Park coordinate of the default slot-0 macro.
    pub fn park(&self) -> ParkMove {
        self.park
    }

    /// Store `text` in a slot, translating `|` to newlines.
    ///
    /// Empty text clears the slot. On error the slot is left untouched.
    pub fn set(&mut self, index: usize, text: &str) -> Result<(), MacroError> {
        let slot = self.slot_mut(index)?;
        if text.len() > MACRO_SLOT_SIZE {
            return Err(MacroError::TooLong {
                len: text.len(),
                max: MACRO_SLOT_SIZE,
            });
        }

        let mut stored = heapless::String::new();
        for c in text.chars() {
            let c = if c == LINE_SURROGATE { '\n' } else { c };
            stored.push(c).map_err(|_| MacroError::TooLong {
                len: text.len(),
                max: MACRO_SLOT_SIZE,
            })?;
        }
        *slot = stored;
        Ok(())
    }

    /// Empty a slot.
    pub fn clear(&mut self, index: usize) -> Result<(), MacroError> {
        self.slot_mut(index)?.clear();
        Ok(())
    }

    /// Stored text of a slot (empty when undefined).
    pub fn get(&self, index: usize) -> Result<&str, MacroError> {
        self.slots
            .get(index)
            .map(|slot| slot.as_str())
            .ok_or(MacroError::SlotOutOfRange {
                index,
                slots: MACRO_SLOTS,
            })
    }

    /// Does the slot hold user text?
    pub fn is_defined(&self, index: usize) -> bool {
        self.get(index).is_ok_and(|text| !text.is_empty())
    }

    /// Commands to run for a slot.
    ///
    /// Undefined slots 0..=2 fall back to the pause/resume defaults; any
    /// other undefined slot yields an empty script.
    pub fn script(&self, index: usize) -> Result<Cow<'_, str>, MacroError> {
        let stored = self.get(index)?;
        if !stored.is_empty() {
            return Ok(Cow::Borrowed(stored));
        }

        Ok(match index {
            PARK_SLOT => Cow::Owned(format!(
                "G10\nG1 F{} X{} Y{}\nG11",
                self.park.feedrate, self.park.x, self.park.y
            )),
            RESUME_PRE_MOVE_SLOT => Cow::Borrowed("G10"),
            RESUME_POST_MOVE_SLOT => Cow::Borrowed("G11"),
            _ => Cow::Borrowed(""),
        })
    }

    fn slot_mut(
        &mut self,
        index: usize,
    ) -> Result<&mut heapless::String<MACRO_SLOT_SIZE>, MacroError> {
        self.slots.get_mut(index).ok_or(MacroError::SlotOutOfRange {
            index,
            slots: MACRO_SLOTS,
        })
    }
}
