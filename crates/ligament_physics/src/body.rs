//! # Bodies
//!
//! Body descriptors and every per-body operation. All body mutation goes
//! through [`PhysicsSystem`]; handles are generational, so a handle whose
//! body was removed simply stops resolving.

use glam::{Quat, Vec3};
use ligament_core::EntityId;
use rapier3d::dynamics::{RigidBody as EngineBody, RigidBodyBuilder, RigidBodyHandle, RigidBodyType};
use rapier3d::geometry::{ActiveCollisionTypes, ColliderBuilder};
use rapier3d::math::Isometry;
use rapier3d::pipeline::ActiveEvents;
use serde::{Deserialize, Serialize};

use crate::convert::{from_isometry, from_vector, to_isometry, to_point, to_rotation, to_vector};
use crate::error::{PhysicsError, PhysicsResult};
use crate::layers::ObjectLayer;
use crate::shape::Shape;
use crate::system::PhysicsSystem;

/// How a body moves.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MotionType {
    /// Immovable.
    Static,
    /// Driven from outside, pushes dynamic bodies.
    Kinematic,
    /// Fully simulated.
    Dynamic,
}

impl MotionType {
    /// Name used in logs and errors.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Kinematic => "kinematic",
            Self::Dynamic => "dynamic",
        }
    }

    fn from_engine(body_type: RigidBodyType) -> Self {
        match body_type {
            RigidBodyType::Fixed => Self::Static,
            RigidBodyType::Dynamic => Self::Dynamic,
            RigidBodyType::KinematicPositionBased | RigidBodyType::KinematicVelocityBased => {
                Self::Kinematic
            }
        }
    }

    const fn to_engine(self) -> RigidBodyType {
        match self {
            Self::Static => RigidBodyType::Fixed,
            Self::Kinematic => RigidBodyType::KinematicPositionBased,
            Self::Dynamic => RigidBodyType::Dynamic,
        }
    }
}

/// Surface and damping parameters.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyMaterial {
    /// Coulomb friction coefficient.
    pub friction: f32,
    /// Bounciness.
    pub restitution: f32,
    /// Linear velocity damping.
    pub linear_damping: f32,
    /// Angular velocity damping.
    pub angular_damping: f32,
    /// Multiplier on world gravity.
    pub gravity_factor: f32,
}

impl Default for BodyMaterial {
    fn default() -> Self {
        Self {
            friction: 0.5,
            restitution: 0.0,
            linear_damping: 0.05,
            angular_damping: 0.05,
            gravity_factor: 1.0,
        }
    }
}

/// Everything needed to create a body.
#[derive(Clone, Debug)]
pub struct BodyDesc {
    /// Collision shape.
    pub shape: Shape,
    /// Motion type.
    pub motion: MotionType,
    /// Object layer.
    pub layer: ObjectLayer,
    /// Initial position.
    pub position: Vec3,
    /// Initial rotation.
    pub rotation: Quat,
    /// Material parameters.
    pub material: BodyMaterial,
    /// Sensor bodies report overlaps but never push.
    pub is_sensor: bool,
    /// Whether the body may fall asleep when at rest.
    pub allow_sleep: bool,
    /// Owning entity, recovered later from the body.
    pub entity: EntityId,
}

impl BodyDesc {
    /// Descriptor with default material at the origin.
    #[must_use]
    pub fn new(shape: Shape, motion: MotionType, layer: ObjectLayer) -> Self {
        Self {
            shape,
            motion,
            layer,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            material: BodyMaterial::default(),
            is_sensor: false,
            allow_sleep: true,
            entity: EntityId::NULL,
        }
    }

    /// Sets the initial pose.
    #[must_use]
    pub fn at(mut self, position: Vec3, rotation: Quat) -> Self {
        self.position = position;
        self.rotation = rotation;
        self
    }

    /// Sets the owning entity.
    #[must_use]
    pub fn owned_by(mut self, entity: EntityId) -> Self {
        self.entity = entity;
        self
    }
}

/// Generational handle to a body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct BodyHandle(pub(crate) RigidBodyHandle);

impl BodyHandle {
    /// Slot index in the engine's body table.
    #[must_use]
    pub fn index(self) -> u32 {
        self.0.into_raw_parts().0
    }

    /// Generation of the slot when the handle was issued.
    #[must_use]
    pub fn generation(self) -> u32 {
        self.0.into_raw_parts().1
    }
}

impl PhysicsSystem {
    /// Creates a body with one collider and activates it.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::BodyLimit`] once `max_bodies` bodies exist.
    pub fn create_body(&mut self, desc: &BodyDesc) -> PhysicsResult<BodyHandle> {
        if self.bodies.len() >= self.max_bodies as usize {
            return Err(PhysicsError::BodyLimit {
                max: self.max_bodies,
            });
        }

        let body = RigidBodyBuilder::new(desc.motion.to_engine())
            .position(to_isometry(desc.position, desc.rotation))
            .linear_damping(desc.material.linear_damping)
            .angular_damping(desc.material.angular_damping)
            .gravity_scale(desc.material.gravity_factor)
            .can_sleep(desc.allow_sleep)
            .user_data(desc.entity.to_user_data())
            .build();
        let handle = self.bodies.insert(body);

        let mut collider = ColliderBuilder::new(desc.shape.shared().clone())
            .density(desc.shape.density())
            .friction(desc.material.friction)
            .restitution(desc.material.restitution)
            .sensor(desc.is_sensor)
            .collision_groups(self.layers.groups_for(desc.layer))
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .user_data(u128::from(desc.layer.index()));
        if desc.is_sensor {
            collider = collider.active_collision_types(ActiveCollisionTypes::all());
        }
        self.colliders
            .insert_with_parent(collider.build(), handle, &mut self.bodies);

        if desc.motion != MotionType::Static {
            if let Some(body) = self.bodies.get_mut(handle) {
                body.wake_up(true);
            }
        }
        self.mark_queries_dirty();

        tracing::debug!(
            motion = desc.motion.name(),
            layer = desc.layer.name(),
            entity = desc.entity.raw(),
            "body created"
        );
        Ok(BodyHandle(handle))
    }

    /// Removes a body, its collider and every constraint attached to it.
    ///
    /// # Returns
    ///
    /// `false` if the handle was already stale.
    pub fn remove_body(&mut self, handle: BodyHandle) -> bool {
        self.remove_constraints_for_body(handle);
        self.kinematic_targets.remove(&handle.0);
        let removed = self
            .bodies
            .remove(
                handle.0,
                &mut self.islands,
                &mut self.colliders,
                &mut self.impulse_joints,
                &mut self.multibody_joints,
                true,
            )
            .is_some();
        if removed {
            self.mark_queries_dirty();
        }
        removed
    }

    /// Checks if `handle` refers to a live body.
    #[must_use]
    pub fn contains_body(&self, handle: BodyHandle) -> bool {
        self.bodies.contains(handle.0)
    }

    /// Entity stored on the body at creation.
    #[must_use]
    pub fn entity_for_body(&self, handle: BodyHandle) -> Option<EntityId> {
        self.bodies
            .get(handle.0)
            .and_then(|body| EntityId::from_user_data(body.user_data))
    }

    /// Current motion type.
    #[must_use]
    pub fn motion_type(&self, handle: BodyHandle) -> Option<MotionType> {
        self.bodies
            .get(handle.0)
            .map(|body| MotionType::from_engine(body.body_type()))
    }

    /// Switches between dynamic and kinematic.
    ///
    /// # Errors
    ///
    /// [`PhysicsError::MotionChange`] if either side is static,
    /// [`PhysicsError::UnknownBody`] for stale handles.
    pub fn set_motion_type(&mut self, handle: BodyHandle, motion: MotionType) -> PhysicsResult<()> {
        let body = self.bodies.get_mut(handle.0).ok_or(PhysicsError::UnknownBody)?;
        let current = MotionType::from_engine(body.body_type());
        if current == motion {
            return Ok(());
        }
        if current == MotionType::Static || motion == MotionType::Static {
            return Err(PhysicsError::MotionChange {
                from: current.name(),
                to: motion.name(),
            });
        }
        body.set_body_type(motion.to_engine(), true);
        self.kinematic_targets.remove(&handle.0);
        Ok(())
    }

    /// Mass of a body, zero for static and kinematic ones.
    #[must_use]
    pub fn mass(&self, handle: BodyHandle) -> Option<f32> {
        self.bodies.get(handle.0).map(|body| {
            if body.is_dynamic() {
                body.mass()
            } else {
                0.0
            }
        })
    }

    /// Object layer the body's collider was created on.
    #[must_use]
    pub fn body_layer(&self, handle: BodyHandle) -> Option<ObjectLayer> {
        let body = self.bodies.get(handle.0)?;
        let collider = self.colliders.get(*body.colliders().first()?)?;
        u32::try_from(collider.user_data)
            .ok()
            .and_then(ObjectLayer::from_index)
    }

    /// World-space position and rotation.
    #[must_use]
    pub fn body_pose(&self, handle: BodyHandle) -> Option<(Vec3, Quat)> {
        self.bodies.get(handle.0).map(|body| from_isometry(body.position()))
    }

    /// Teleports a body. No velocity is derived from the jump.
    pub fn set_body_position(&mut self, handle: BodyHandle, position: Vec3) -> bool {
        let moved = self.with_body(handle, |body| body.set_translation(to_vector(position), true));
        if moved {
            self.place_colliders(handle);
        }
        moved
    }

    /// Sets a body's rotation directly.
    pub fn set_body_rotation(&mut self, handle: BodyHandle, rotation: Quat) -> bool {
        let rotated = self.with_body(handle, |body| body.set_rotation(to_rotation(rotation), true));
        if rotated {
            self.place_colliders(handle);
        }
        rotated
    }

    /// Tells a kinematic body where it must be at the end of the next step.
    ///
    /// The step spreads the move evenly across its collision substeps so
    /// the engine derives a velocity and pushes dynamic bodies on the way.
    /// A non-positive `dt` degrades to a teleport.
    pub fn move_kinematic(&mut self, handle: BodyHandle, position: Vec3, rotation: Quat, dt: f32) -> bool {
        if self.motion_type(handle) != Some(MotionType::Kinematic) {
            return false;
        }
        if dt <= 0.0 {
            return self.set_body_position(handle, position) && self.set_body_rotation(handle, rotation);
        }
        self.kinematic_targets
            .insert(handle.0, to_isometry(position, rotation));
        true
    }

    /// Linear velocity.
    #[must_use]
    pub fn linear_velocity(&self, handle: BodyHandle) -> Option<Vec3> {
        self.bodies.get(handle.0).map(|body| from_vector(body.linvel()))
    }

    /// Sets the linear velocity of a non-static body.
    pub fn set_linear_velocity(&mut self, handle: BodyHandle, velocity: Vec3) -> bool {
        self.with_moving(handle, |body| body.set_linvel(to_vector(velocity), true))
    }

    /// Angular velocity.
    #[must_use]
    pub fn angular_velocity(&self, handle: BodyHandle) -> Option<Vec3> {
        self.bodies.get(handle.0).map(|body| from_vector(body.angvel()))
    }

    /// Sets the angular velocity of a non-static body.
    pub fn set_angular_velocity(&mut self, handle: BodyHandle, velocity: Vec3) -> bool {
        self.with_moving(handle, |body| body.set_angvel(to_vector(velocity), true))
    }

    /// Velocity of the material point of a body at `point`.
    #[must_use]
    pub fn velocity_at_point(&self, handle: BodyHandle, point: Vec3) -> Option<Vec3> {
        self.bodies
            .get(handle.0)
            .map(|body| from_vector(&body.velocity_at_point(&to_point(point))))
    }

    /// Adds a force through the center of mass (dynamic only).
    pub fn add_force(&mut self, handle: BodyHandle, force: Vec3) -> bool {
        self.with_dynamic(handle, |body| body.add_force(to_vector(force), true))
    }

    /// Adds a force at a world-space point (dynamic only).
    pub fn add_force_at_point(&mut self, handle: BodyHandle, force: Vec3, point: Vec3) -> bool {
        self.with_dynamic(handle, |body| {
            body.add_force_at_point(to_vector(force), to_point(point), true);
        })
    }

    /// Applies an impulse through the center of mass (dynamic only).
    pub fn add_impulse(&mut self, handle: BodyHandle, impulse: Vec3) -> bool {
        self.with_dynamic(handle, |body| body.apply_impulse(to_vector(impulse), true))
    }

    /// Applies an impulse at a world-space point (dynamic only).
    pub fn add_impulse_at_point(&mut self, handle: BodyHandle, impulse: Vec3, point: Vec3) -> bool {
        self.with_dynamic(handle, |body| {
            body.apply_impulse_at_point(to_vector(impulse), to_point(point), true);
        })
    }

    /// Applies an angular impulse (dynamic only).
    pub fn add_angular_impulse(&mut self, handle: BodyHandle, impulse: Vec3) -> bool {
        self.with_dynamic(handle, |body| body.apply_torque_impulse(to_vector(impulse), true))
    }

    /// Adds a torque (dynamic only).
    pub fn add_torque(&mut self, handle: BodyHandle, torque: Vec3) -> bool {
        self.with_dynamic(handle, |body| body.add_torque(to_vector(torque), true))
    }

    /// Wakes a body up.
    pub fn activate_body(&mut self, handle: BodyHandle) -> bool {
        self.with_moving(handle, |body| body.wake_up(true))
    }

    /// Puts a body to sleep.
    pub fn deactivate_body(&mut self, handle: BodyHandle) -> bool {
        self.with_moving(handle, EngineBody::sleep)
    }

    /// Checks if a body is awake. Static bodies never are.
    #[must_use]
    pub fn is_body_active(&self, handle: BodyHandle) -> bool {
        self.bodies
            .get(handle.0)
            .is_some_and(|body| !body.is_fixed() && !body.is_sleeping())
    }

    /// Moves a teleported body's colliders along so queries see the new
    /// pose before the next step.
    fn place_colliders(&mut self, handle: BodyHandle) {
        let Some(body) = self.bodies.get(handle.0) else {
            return;
        };
        let pose = *body.position();
        for collider_handle in body.colliders() {
            if let Some(collider) = self.colliders.get_mut(*collider_handle) {
                let local = collider
                    .position_wrt_parent()
                    .copied()
                    .unwrap_or_else(Isometry::identity);
                collider.set_position(pose * local);
            }
        }
        self.mark_queries_dirty();
    }

    fn with_body(&mut self, handle: BodyHandle, f: impl FnOnce(&mut EngineBody)) -> bool {
        match self.bodies.get_mut(handle.0) {
            Some(body) => {
                f(body);
                true
            }
            None => {
                tracing::debug!(index = handle.index(), "stale body handle");
                false
            }
        }
    }

    fn with_moving(&mut self, handle: BodyHandle, f: impl FnOnce(&mut EngineBody)) -> bool {
        match self.bodies.get_mut(handle.0) {
            Some(body) if !body.is_fixed() => {
                f(body);
                true
            }
            _ => false,
        }
    }

    fn with_dynamic(&mut self, handle: BodyHandle, f: impl FnOnce(&mut EngineBody)) -> bool {
        match self.bodies.get_mut(handle.0) {
            Some(body) if body.is_dynamic() => {
                f(body);
                true
            }
            _ => false,
        }
    }
}
