//! # Simulation Error Types
//!
//! Startup failures. Everything that can go wrong once the simulation is
//! running is handled silently by the component layer.

use std::path::PathBuf;

use ligament_physics::PhysicsError;
use thiserror::Error;

/// Errors that can occur while setting up a simulation.
#[derive(Error, Debug)]
pub enum SimulationError {
    /// The physics world could not be built.
    #[error("physics initialization failed: {0}")]
    Physics(#[from] PhysicsError),

    /// The configuration text is not valid TOML for [`crate::SimulationConfig`].
    #[error("config parse error: {0}")]
    Parse(#[from] toml::de::Error),

    /// The configuration file could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration value is out of range.
    #[error("invalid simulation configuration: {0}")]
    InvalidConfig(String),
}

/// Result type for simulation setup.
pub type SimulationResult<T> = Result<T, SimulationError>;
