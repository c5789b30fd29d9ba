//! Simulator configuration, loaded from TOML.
//!
//! ```toml
//! profile = "ender3"
//! resume_feedrate = 4500.0
//! recovery = true
//!
//! [park]
//! x = 0.0
//! y = 200.0
//! feedrate = 6000.0
//!
//! [[macros]]
//! slot = 0
//! text = "G91|G1 Z10|G90|G1 X0 Y200"
//! ```

use std::path::Path;

use parkline::{MacroTable, ParkMove, SequencerConfig, MACRO_SLOTS, MACRO_SLOT_SIZE};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::profile::MachineProfile;

/// A macro slot preset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MacroPreset {
    /// Slot index (0 is `M810`).
    pub slot: usize,
    /// Macro text, `|` separating lines.
    pub text: String,
}

/// Simulator settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Machine profile key.
    pub profile: String,
    /// Feedrate of the move back to the paused position (mm/min).
    pub resume_feedrate: f64,
    /// Park coordinate of the default pause macro.
    pub park: ParkMove,
    /// Firmware retract length (mm). Defaults to the profile's.
    pub retract_length: Option<f64>,
    /// Power-loss recovery enabled.
    pub recovery: bool,
    /// Open host prompts during pause/resume.
    pub host_prompts: bool,
    /// Macro slot presets.
    pub macros: Vec<MacroPreset>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            profile: "generic".into(),
            resume_feedrate: SequencerConfig::default().resume_feedrate,
            park: ParkMove::default(),
            retract_length: None,
            recovery: false,
            host_prompts: true,
            macros: Vec::new(),
        }
    }
}

impl SimConfig {
    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        let profile = self.machine_profile()?;
        if self.resume_feedrate <= 0.0 {
            return Err(SimError::InvalidConfig(
                "resume_feedrate must be positive".into(),
            ));
        }
        if self.park.feedrate <= 0.0 {
            return Err(SimError::InvalidConfig(
                "park feedrate must be positive".into(),
            ));
        }
        if !profile.in_bounds(self.park.x, self.park.y, 0.0) {
            return Err(SimError::InvalidConfig(format!(
                "park position X{} Y{} is outside the {} bed",
                self.park.x, self.park.y, profile.name
            )));
        }
        if self.retract_length.is_some_and(|len| len < 0.0) {
            return Err(SimError::InvalidConfig(
                "retract_length must not be negative".into(),
            ));
        }
        for preset in &self.macros {
            if preset.slot >= MACRO_SLOTS {
                return Err(SimError::InvalidConfig(format!(
                    "macro slot {} out of range (0..{MACRO_SLOTS})",
                    preset.slot
                )));
            }
            if preset.text.len() > MACRO_SLOT_SIZE {
                return Err(SimError::InvalidConfig(format!(
                    "macro slot {} text is {} bytes, limit {MACRO_SLOT_SIZE}",
                    preset.slot,
                    preset.text.len()
                )));
            }
        }
        Ok(())
    }

    /// Machine profile named by `profile`.
    pub fn machine_profile(&self) -> Result<MachineProfile> {
        MachineProfile::by_key(&self.profile)
            .ok_or_else(|| SimError::UnknownProfile(self.profile.clone()))
    }

    /// Sequencer settings.
    pub fn sequencer_config(&self) -> SequencerConfig {
        SequencerConfig {
            resume_feedrate: self.resume_feedrate,
        }
    }

    /// Macro table with the presets applied.
    pub fn macro_table(&self) -> Result<MacroTable> {
        let mut table = MacroTable::with_park(self.park);
        for preset in &self.macros {
            table
                .set(preset.slot, &preset.text)
                .map_err(|err| SimError::InvalidConfig(err.to_string()))?;
        }
        Ok(table)
    }

    /// Retract length for `profile`, honoring the override.
    pub fn retract_length_for(&self, profile: &MachineProfile) -> f64 {
        self.retract_length.unwrap_or(profile.retraction_distance)
    }
}
