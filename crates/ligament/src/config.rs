//! # Configuration
//!
//! Everything the simulation reads at startup. Every table is optional in
//! TOML; missing fields keep their defaults.
//!
//! ```toml
//! fixed_timestep = 0.016666668
//! max_frame_time = 0.25
//! collision_steps = 4
//!
//! [physics]
//! max_bodies = 4096
//! worker_threads = 2
//!
//! [character]
//! capsule_radius = 0.4
//! ```

use std::path::Path;

use glam::Vec3;
use ligament_physics::{CharacterSettings, ExtendedUpdateSettings, PhysicsConfig};
use serde::{Deserialize, Serialize};

use crate::error::{SimulationError, SimulationResult};

/// Settings of a character controller.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CharacterControllerConfig {
    /// Capsule radius.
    pub capsule_radius: f32,
    /// Half height of the capsule's cylindrical part.
    pub capsule_half_height: f32,
    /// Steepest walkable slope, in radians.
    pub max_slope_angle: f32,
    /// Mass used to push bodies, in kg.
    pub mass: f32,
    /// Largest force the character exerts on bodies it stands on, in N.
    pub max_strength: f32,
    /// Distance at which contacts are picked up ahead of time.
    pub predictive_contact_distance: f32,
    /// Skin kept between the capsule and the world.
    pub character_padding: f32,
    /// Fraction of penetration resolved per update.
    pub penetration_recovery_speed: f32,
    /// Tallest step climbed automatically.
    pub step_height: f32,
    /// Forward distance probed when stepping up.
    pub step_forward_test: f32,
    /// Downward reach that keeps the character glued to the floor.
    pub stick_to_floor_distance: f32,
}

impl Default for CharacterControllerConfig {
    fn default() -> Self {
        Self {
            capsule_radius: 0.5,
            capsule_half_height: 0.5,
            max_slope_angle: 50.0_f32.to_radians(),
            mass: 70.0,
            max_strength: 100.0,
            predictive_contact_distance: 0.1,
            character_padding: 0.02,
            penetration_recovery_speed: 1.0,
            step_height: 0.4,
            step_forward_test: 0.15,
            stick_to_floor_distance: 0.5,
        }
    }
}

impl CharacterControllerConfig {
    /// Engine-side settings of the character.
    #[must_use]
    pub fn character_settings(&self) -> CharacterSettings {
        CharacterSettings {
            radius: self.capsule_radius,
            half_height: self.capsule_half_height,
            max_slope_angle: self.max_slope_angle,
            mass: self.mass,
            max_strength: self.max_strength,
            predictive_contact_distance: self.predictive_contact_distance,
            padding: self.character_padding,
            penetration_recovery_speed: self.penetration_recovery_speed,
            up: Vec3::Y,
        }
    }

    /// Stair and floor-stick settings of the extended update.
    #[must_use]
    pub const fn extended_update_settings(&self) -> ExtendedUpdateSettings {
        ExtendedUpdateSettings {
            step_height: self.step_height,
            step_forward_test: self.step_forward_test,
            stick_to_floor_distance: self.stick_to_floor_distance,
        }
    }
}

/// Top-level simulation settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Length of one tick, in seconds.
    pub fixed_timestep: f64,
    /// Longest frame fed into the accumulator, in seconds.
    pub max_frame_time: f64,
    /// Collision substeps per physics step.
    pub collision_steps: u32,
    /// Whether stay events reach the collision callback.
    pub report_stay_events: bool,
    /// Physics world sizing.
    pub physics: PhysicsConfig,
    /// Defaults for character controllers spawned from config.
    pub character: CharacterControllerConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            fixed_timestep: 1.0 / 60.0,
            max_frame_time: 0.25,
            collision_steps: 1,
            report_stay_events: false,
            physics: PhysicsConfig::default(),
            character: CharacterControllerConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Malformed TOML, or values rejected by [`Self::validate`].
    pub fn from_toml_str(text: &str) -> SimulationResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    ///
    /// # Errors
    ///
    /// The file cannot be read, or see [`Self::from_toml_str`].
    pub fn from_file(path: impl AsRef<Path>) -> SimulationResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| SimulationError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks timing values and the physics table.
    ///
    /// # Errors
    ///
    /// [`SimulationError::InvalidConfig`] for non-positive timing values,
    /// [`SimulationError::Physics`] for a bad physics table.
    pub fn validate(&self) -> SimulationResult<()> {
        check_timing(self.fixed_timestep, self.max_frame_time)?;
        if self.collision_steps == 0 {
            return Err(SimulationError::InvalidConfig(
                "collision_steps must be > 0".into(),
            ));
        }
        self.physics.validate()?;
        Ok(())
    }
}

/// Checks a tick length and frame-time cap.
pub(crate) fn check_timing(fixed_timestep: f64, max_frame_time: f64) -> SimulationResult<()> {
    if !(fixed_timestep > 0.0 && fixed_timestep.is_finite()) {
        return Err(SimulationError::InvalidConfig(
            "fixed_timestep must be positive".into(),
        ));
    }
    if !(max_frame_time > 0.0 && max_frame_time.is_finite()) {
        return Err(SimulationError::InvalidConfig(
            "max_frame_time must be positive".into(),
        ));
    }
    Ok(())
}
