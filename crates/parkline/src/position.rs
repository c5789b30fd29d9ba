//! Machine position and axis addressing modes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// X carriage.
    X,
    /// Y carriage.
    Y,
    /// Z carriage.
    Z,
    /// Extruder.
    E,
}

impl Axis {
    /// All axes in G-code parameter order.
    pub const ALL: [Axis; 4] = [Axis::X, Axis::Y, Axis::Z, Axis::E];

    /// G-code parameter letter for this axis.
    pub fn letter(self) -> char {
        match self {
            Axis::X => 'X',
            Axis::Y => 'Y',
            Axis::Z => 'Z',
            Axis::E => 'E',
        }
    }
}

/// Per-axis coordinates in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate.
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
    /// Extruder coordinate.
    pub e: f64,
}

impl Position {
    /// Create a position from its four components.
    pub fn new(x: f64, y: f64, z: f64, e: f64) -> Self {
        Self { x, y, z, e }
    }

    /// Coordinate on one axis.
    pub fn get(&self, axis: Axis) -> f64 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
            Axis::Z => self.z,
            Axis::E => self.e,
        }
    }

    /// Set the coordinate on one axis.
    pub fn set(&mut self, axis: Axis, value: f64) {
        match axis {
            Axis::X => self.x = value,
            Axis::Y => self.y = value,
            Axis::Z => self.z = value,
            Axis::E => self.e = value,
        }
    }

    /// Copy with a different extruder coordinate.
    pub fn with_e(mut self, e: f64) -> Self {
        self.e = e;
        self
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "X{:.3} Y{:.3} Z{:.3} E{:.3}",
            self.x, self.y, self.z, self.e
        )
    }
}

/// Relative/absolute addressing for the motion axes and the extruder.
///
/// `G90`/`G91` switch every axis, `M82`/`M83` switch only the extruder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AxisModes {
    /// X/Y/Z interpret coordinates relative to the current position.
    pub relative_xyz: bool,
    /// E interprets coordinates relative to the current position.
    pub relative_e: bool,
}

impl AxisModes {
    /// Absolute X/Y/Z with relative E, the mode park macros are written for.
    pub const PARKING: AxisModes = AxisModes {
        relative_xyz: false,
        relative_e: true,
    };

    /// Both groups absolute.
    pub const ABSOLUTE: AxisModes = AxisModes {
        relative_xyz: false,
        relative_e: false,
    };

    /// Switch every axis, extruder included (`G90`/`G91`).
    pub fn set_relative_mode(&mut self, relative: bool) {
        self.relative_xyz = relative;
        self.relative_e = relative;
    }

    /// Switch only the extruder (`M82`/`M83`).
    pub fn set_e_relative(&mut self, relative: bool) {
        self.relative_e = relative;
    }

    /// Is this axis addressed relatively?
    pub fn is_relative(&self, axis: Axis) -> bool {
        match axis {
            Axis::E => self.relative_e,
            _ => self.relative_xyz,
        }
    }
}
