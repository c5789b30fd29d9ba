//! Error types for the simulator.

use parkline::SequencerError;
use thiserror::Error;

/// Errors from simulated printer operations.
#[derive(Error, Debug)]
pub enum SimError {
    /// Pause/resume or motion failure.
    #[error(transparent)]
    Sequencer(#[from] SequencerError),

    /// Invalid configuration.
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    /// Unknown machine profile.
    #[error("unknown machine profile: {0}")]
    UnknownProfile(String),

    /// Malformed G-code line.
    #[error("G-code error: {0}")]
    Gcode(String),

    /// The machine halted earlier and needs an operator.
    #[error("machine halted: {0}")]
    Halted(String),

    /// TOML parse error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// IO error.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Result type for simulator operations.
pub type Result<T> = std::result::Result<T, SimError>;
