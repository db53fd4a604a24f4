//! # Transforms
//!
//! Position, rotation and scale of an entity, plus the matrix handed to
//! the renderer.

use glam::{EulerRot, Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

/// Position/rotation/scale triple.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// World-space position.
    pub position: Vec3,
    /// World-space rotation.
    pub rotation: Quat,
    /// Per-axis scale.
    pub scale: Vec3,
}

impl Transform {
    /// Origin, no rotation, unit scale.
    pub const IDENTITY: Self = Self {
        position: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    /// Identity transform moved to `position`.
    #[inline]
    #[must_use]
    pub const fn from_position(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    /// Sets rotation from XYZ euler angles in radians.
    pub fn set_rotation_euler(&mut self, euler: Vec3) {
        self.rotation = Quat::from_euler(EulerRot::XYZ, euler.x, euler.y, euler.z);
    }

    /// Moves by `offset` in world space.
    #[inline]
    pub fn translate(&mut self, offset: Vec3) {
        self.position += offset;
    }

    /// Rotates by `angle` radians about `axis` (local frame).
    ///
    /// A zero axis leaves the rotation untouched.
    pub fn rotate(&mut self, angle: f32, axis: Vec3) {
        let Some(axis) = axis.try_normalize() else {
            return;
        };
        self.rotation = (self.rotation * Quat::from_axis_angle(axis, angle)).normalize();
    }

    /// Scale, then rotate, then translate.
    #[inline]
    #[must_use]
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}
