//! Machine profile definitions.

use serde::{Deserialize, Serialize};

/// Machine profile with the limits the simulated planner enforces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MachineProfile {
    /// Lookup key (`ender3`, `voron_24`, ...).
    pub key: String,
    /// Profile name.
    pub name: String,
    /// Build volume X (mm).
    pub bed_x: f64,
    /// Build volume Y (mm).
    pub bed_y: f64,
    /// Build volume Z (mm).
    pub bed_z: f64,
    /// Maximum feedrate X (mm/s).
    pub max_feedrate_x: f64,
    /// Maximum feedrate Y (mm/s).
    pub max_feedrate_y: f64,
    /// Maximum feedrate Z (mm/s).
    pub max_feedrate_z: f64,
    /// Maximum feedrate E (mm/s).
    pub max_feedrate_e: f64,
    /// Firmware retract length (mm).
    pub retraction_distance: f64,
    /// Firmware retract speed (mm/s).
    pub retraction_speed: f64,
}

impl Default for MachineProfile {
    fn default() -> Self {
        Self::generic()
    }
}

impl MachineProfile {
    /// Generic Cartesian machine.
    pub fn generic() -> Self {
        Self {
            key: "generic".into(),
            name: "Generic".into(),
            bed_x: 220.0,
            bed_y: 220.0,
            bed_z: 250.0,
            max_feedrate_x: 500.0,
            max_feedrate_y: 500.0,
            max_feedrate_z: 10.0,
            max_feedrate_e: 60.0,
            retraction_distance: 5.0,
            retraction_speed: 45.0,
        }
    }

    /// Creality Ender 3 profile.
    pub fn ender3() -> Self {
        Self {
            key: "ender3".into(),
            name: "Creality Ender 3".into(),
            bed_x: 220.0,
            bed_y: 220.0,
            bed_z: 250.0,
            max_feedrate_x: 500.0,
            max_feedrate_y: 500.0,
            max_feedrate_z: 5.0,
            max_feedrate_e: 25.0,
            retraction_distance: 5.0,
            retraction_speed: 45.0,
        }
    }

    /// Prusa MK4 profile.
    pub fn prusa_mk4() -> Self {
        Self {
            key: "prusa_mk4".into(),
            name: "Prusa MK4".into(),
            bed_x: 250.0,
            bed_y: 210.0,
            bed_z: 220.0,
            max_feedrate_x: 200.0,
            max_feedrate_y: 200.0,
            max_feedrate_z: 12.0,
            max_feedrate_e: 120.0,
            retraction_distance: 0.8,
            retraction_speed: 35.0,
        }
    }

    /// Voron 2.4 profile.
    pub fn voron_24() -> Self {
        Self {
            key: "voron_24".into(),
            name: "Voron 2.4 (350mm)".into(),
            bed_x: 350.0,
            bed_y: 350.0,
            bed_z: 340.0,
            max_feedrate_x: 300.0,
            max_feedrate_y: 300.0,
            max_feedrate_z: 15.0,
            max_feedrate_e: 60.0,
            retraction_distance: 0.5,
            retraction_speed: 30.0,
        }
    }

    /// Get all built-in profiles.
    pub fn all_profiles() -> Vec<Self> {
        vec![
            Self::generic(),
            Self::ender3(),
            Self::prusa_mk4(),
            Self::voron_24(),
        ]
    }

    /// Built-in profile by key, ignoring case.
    pub fn by_key(key: &str) -> Option<Self> {
        Self::all_profiles()
            .into_iter()
            .find(|profile| profile.key.eq_ignore_ascii_case(key))
    }

    /// Check if a position is within build volume.
    pub fn in_bounds(&self, x: f64, y: f64, z: f64) -> bool {
        x >= 0.0 && x <= self.bed_x && y >= 0.0 && y <= self.bed_y && z >= 0.0 && z <= self.bed_z
    }

    /// Per-axis feedrate limits as `[x, y, z, e]`.
    pub fn max_feedrates(&self) -> [f64; 4] {
        [
            self.max_feedrate_x,
            self.max_feedrate_y,
            self.max_feedrate_z,
            self.max_feedrate_e,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles() {
        for profile in MachineProfile::all_profiles() {
            assert!(profile.bed_x > 0.0);
            assert!(profile.bed_y > 0.0);
            assert!(profile.bed_z > 0.0);
            assert!(profile.max_feedrates().iter().all(|f| *f > 0.0));
        }
    }

    #[test]
    fn test_in_bounds() {
        let profile = MachineProfile::voron_24();
        assert!(profile.in_bounds(100.0, 100.0, 100.0));
        assert!(!profile.in_bounds(-1.0, 100.0, 100.0));
        assert!(!profile.in_bounds(400.0, 100.0, 100.0));
    }

    #[test]
    fn test_by_key() {
        assert_eq!(MachineProfile::by_key("Ender3").unwrap().name, "Creality Ender 3");
        assert!(MachineProfile::by_key("cr10").is_none());
    }
}
