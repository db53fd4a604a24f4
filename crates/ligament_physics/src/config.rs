//! # Physics Configuration
//!
//! Sizing of the physics world. Loaded once at startup, usually as the
//! `[physics]` table of the simulation config file.

use serde::{Deserialize, Serialize};

use crate::error::{PhysicsError, PhysicsResult};

/// World-level physics settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhysicsConfig {
    /// Maximum number of bodies the world accepts.
    pub max_bodies: u32,
    /// Maximum number of body pairs tracked by the broad phase.
    /// Also bounds the collision event queue.
    pub max_body_pairs: u32,
    /// Maximum number of contact constraints per step.
    pub max_contact_constraints: u32,
    /// Per-step scratch budget in bytes.
    pub scratch_bytes: usize,
    /// Worker thread count. Zero or negative means the default pool size.
    pub worker_threads: i32,
    /// World gravity applied to dynamic bodies.
    pub gravity: [f32; 3],
}

impl PhysicsConfig {
    /// Default body limit.
    pub const DEFAULT_MAX_BODIES: u32 = 10_240;
    /// Default body pair limit.
    pub const DEFAULT_MAX_BODY_PAIRS: u32 = 65_536;
    /// Default contact constraint limit.
    pub const DEFAULT_MAX_CONTACT_CONSTRAINTS: u32 = 10_240;
    /// Default scratch budget (10 MiB).
    pub const DEFAULT_SCRATCH_BYTES: usize = 10 * 1024 * 1024;

    /// Checks that every limit is usable.
    ///
    /// # Errors
    ///
    /// Returns [`PhysicsError::InvalidConfig`] naming the first bad field.
    pub fn validate(&self) -> PhysicsResult<()> {
        if self.max_bodies == 0 {
            return Err(PhysicsError::InvalidConfig("max_bodies must be > 0".into()));
        }
        if self.max_body_pairs == 0 {
            return Err(PhysicsError::InvalidConfig(
                "max_body_pairs must be > 0".into(),
            ));
        }
        if self.max_contact_constraints == 0 {
            return Err(PhysicsError::InvalidConfig(
                "max_contact_constraints must be > 0".into(),
            ));
        }
        if self.gravity.iter().any(|g| !g.is_finite()) {
            return Err(PhysicsError::InvalidConfig("gravity must be finite".into()));
        }
        Ok(())
    }

    /// Worker count to request from the thread pool builder.
    ///
    /// Zero tells the builder to pick its default.
    #[must_use]
    pub fn resolved_worker_threads(&self) -> usize {
        usize::try_from(self.worker_threads).unwrap_or(0)
    }

    /// Gravity as a vector.
    #[must_use]
    pub fn gravity_vec(&self) -> glam::Vec3 {
        glam::Vec3::from_array(self.gravity)
    }
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        Self {
            max_bodies: Self::DEFAULT_MAX_BODIES,
            max_body_pairs: Self::DEFAULT_MAX_BODY_PAIRS,
            max_contact_constraints: Self::DEFAULT_MAX_CONTACT_CONSTRAINTS,
            scratch_bytes: Self::DEFAULT_SCRATCH_BYTES,
            worker_threads: -1,
            gravity: [0.0, -9.81, 0.0],
        }
    }
}
