//! # Rigid Body Component
//!
//! Wraps exactly one physics body. The body exists in the engine for as
//! long as `is_added` is true; that flag goes up once, when the component
//! is attached, and down once, when the component is destroyed (the body
//! and its constraints are removed in that order).
//!
//! Every operation goes through the component's [`WorldLink`]. Once the
//! world is gone, they all become silent no-ops.

use glam::{Quat, Vec3};
use ligament_core::{ComponentKind, EntityId};
use ligament_physics::{
    BodyDesc, BodyHandle, BodyMaterial, MotionType, ObjectLayer, PhysicsSystem, PhysicsWorld, Shape,
    ShapeDesc, WorldLink,
};

use crate::ecs::{ComponentData, Entity};

/// How to build a rigid body for an entity.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RigidBodyDesc {
    /// Collision shape.
    pub shape: ShapeDesc,
    /// Motion type.
    pub motion: MotionType,
    /// Object layer.
    pub layer: ObjectLayer,
    /// Material parameters.
    pub material: BodyMaterial,
    /// Sensor bodies report overlaps but never push.
    pub is_sensor: bool,
    /// Whether the body may sleep at rest.
    pub allow_sleep: bool,
}

impl RigidBodyDesc {
    /// Descriptor with default material, sleeping allowed, not a sensor.
    #[must_use]
    pub fn new(shape: ShapeDesc, motion: MotionType, layer: ObjectLayer) -> Self {
        Self {
            shape,
            motion,
            layer,
            material: BodyMaterial::default(),
            is_sensor: false,
            allow_sleep: true,
        }
    }

    /// Static body on the static layer.
    #[must_use]
    pub fn fixed(shape: ShapeDesc) -> Self {
        Self::new(shape, MotionType::Static, ObjectLayer::Static)
    }

    /// Dynamic body on the dynamic layer.
    #[must_use]
    pub fn dynamic(shape: ShapeDesc) -> Self {
        Self::new(shape, MotionType::Dynamic, ObjectLayer::Dynamic)
    }

    /// Kinematic body on the kinematic layer.
    #[must_use]
    pub fn kinematic(shape: ShapeDesc) -> Self {
        Self::new(shape, MotionType::Kinematic, ObjectLayer::Kinematic)
    }

    /// Replaces the material.
    #[must_use]
    pub const fn with_material(mut self, material: BodyMaterial) -> Self {
        self.material = material;
        self
    }

    /// Marks the body as a sensor.
    #[must_use]
    pub const fn sensor(mut self) -> Self {
        self.is_sensor = true;
        self
    }
}

/// Component owning one physics body.
#[derive(Debug)]
pub struct RigidBody {
    handle: BodyHandle,
    link: WorldLink,
    entity: EntityId,
    motion: MotionType,
    layer: ObjectLayer,
    material: BodyMaterial,
    is_sensor: bool,
    allow_sleep: bool,
    is_added: bool,
}

/// Creates a body at the entity's current pose and attaches it.
///
/// # Returns
///
/// `None` if the entity already has a rigid body, or if the shape or
/// body could not be created. The entity is left unchanged in that case.
pub fn attach_rigid_body<'e>(
    entity: &'e mut Entity,
    world: &PhysicsWorld,
    desc: &RigidBodyDesc,
) -> Option<&'e mut RigidBody> {
    if entity.has_component(ComponentKind::RigidBody) {
        tracing::debug!(entity = entity.id().raw(), "entity already has a rigid body");
        return None;
    }

    let shape = Shape::from_desc(&desc.shape)
        .map_err(|error| tracing::warn!(entity = entity.id().raw(), %error, "rigid body shape rejected"))
        .ok()?;
    let mut body = BodyDesc::new(shape, desc.motion, desc.layer)
        .at(entity.position(), entity.rotation())
        .owned_by(entity.id());
    body.material = desc.material;
    body.is_sensor = desc.is_sensor;
    body.allow_sleep = desc.allow_sleep;

    let handle = world
        .lock()
        .create_body(&body)
        .map_err(|error| tracing::warn!(entity = entity.id().raw(), %error, "rigid body creation failed"))
        .ok()?;

    let component = RigidBody {
        handle,
        link: world.link(),
        entity: entity.id(),
        motion: desc.motion,
        layer: desc.layer,
        material: desc.material,
        is_sensor: desc.is_sensor,
        allow_sleep: desc.allow_sleep,
        is_added: true,
    };
    entity.add_component(ComponentData::RigidBody(component));
    entity.rigid_body_mut()
}

/// Destroys the entity's rigid body, removing it from the world.
///
/// # Returns
///
/// `false` if the entity had none.
pub fn remove_rigid_body(entity: &mut Entity) -> bool {
    entity.remove_component(ComponentKind::RigidBody)
}

impl RigidBody {
    fn with<R>(&self, f: impl FnOnce(&mut PhysicsSystem) -> R) -> Option<R> {
        if !self.is_added {
            return None;
        }
        self.link.with(f)
    }

    /// Engine handle.
    #[inline]
    #[must_use]
    pub const fn handle(&self) -> BodyHandle {
        self.handle
    }

    /// Owning entity.
    #[inline]
    #[must_use]
    pub const fn entity(&self) -> EntityId {
        self.entity
    }

    /// Link to the world the body lives in.
    #[must_use]
    pub const fn world(&self) -> &WorldLink {
        &self.link
    }

    /// Motion type.
    #[inline]
    #[must_use]
    pub const fn motion_type(&self) -> MotionType {
        self.motion
    }

    /// Object layer.
    #[inline]
    #[must_use]
    pub const fn layer(&self) -> ObjectLayer {
        self.layer
    }

    /// Material the body was created with.
    #[must_use]
    pub const fn material(&self) -> &BodyMaterial {
        &self.material
    }

    /// Whether the body is a sensor.
    #[must_use]
    pub const fn is_sensor(&self) -> bool {
        self.is_sensor
    }

    /// Whether the body may sleep.
    #[must_use]
    pub const fn allow_sleep(&self) -> bool {
        self.allow_sleep
    }

    /// Whether the body is still in the engine.
    #[inline]
    #[must_use]
    pub const fn is_added(&self) -> bool {
        self.is_added
    }

    /// Switches between dynamic and kinematic.
    ///
    /// # Returns
    ///
    /// `false` if either side is static or the world is gone.
    pub fn set_motion_type(&mut self, motion: MotionType) -> bool {
        let handle = self.handle;
        let changed = self
            .with(|system| system.set_motion_type(handle, motion))
            .is_some_and(|result| {
                result
                    .map_err(|error| tracing::debug!(%error, "motion type unchanged"))
                    .is_ok()
            });
        if changed {
            self.motion = motion;
        }
        changed
    }

    // =========================================================================
    // Forces (dynamic only)
    // =========================================================================

    /// Adds a force through the center of mass.
    pub fn add_force(&self, force: Vec3) -> bool {
        self.with(|s| s.add_force(self.handle, force)).unwrap_or(false)
    }

    /// Adds a force at a world-space point.
    pub fn add_force_at_point(&self, force: Vec3, point: Vec3) -> bool {
        self.with(|s| s.add_force_at_point(self.handle, force, point))
            .unwrap_or(false)
    }

    /// Applies an impulse through the center of mass.
    pub fn add_impulse(&self, impulse: Vec3) -> bool {
        self.with(|s| s.add_impulse(self.handle, impulse)).unwrap_or(false)
    }

    /// Applies an impulse at a world-space point.
    pub fn add_impulse_at_point(&self, impulse: Vec3, point: Vec3) -> bool {
        self.with(|s| s.add_impulse_at_point(self.handle, impulse, point))
            .unwrap_or(false)
    }

    /// Applies an angular impulse.
    pub fn add_angular_impulse(&self, impulse: Vec3) -> bool {
        self.with(|s| s.add_angular_impulse(self.handle, impulse))
            .unwrap_or(false)
    }

    /// Adds a torque.
    pub fn add_torque(&self, torque: Vec3) -> bool {
        self.with(|s| s.add_torque(self.handle, torque)).unwrap_or(false)
    }

    // =========================================================================
    // Velocities
    // =========================================================================

    /// Linear velocity. Zero when the body is gone.
    #[must_use]
    pub fn linear_velocity(&self) -> Vec3 {
        self.with(|s| s.linear_velocity(self.handle))
            .flatten()
            .unwrap_or(Vec3::ZERO)
    }

    /// Sets the linear velocity.
    pub fn set_linear_velocity(&self, velocity: Vec3) -> bool {
        self.with(|s| s.set_linear_velocity(self.handle, velocity))
            .unwrap_or(false)
    }

    /// Angular velocity. Zero when the body is gone.
    #[must_use]
    pub fn angular_velocity(&self) -> Vec3 {
        self.with(|s| s.angular_velocity(self.handle))
            .flatten()
            .unwrap_or(Vec3::ZERO)
    }

    /// Sets the angular velocity.
    pub fn set_angular_velocity(&self, velocity: Vec3) -> bool {
        self.with(|s| s.set_angular_velocity(self.handle, velocity))
            .unwrap_or(false)
    }

    // =========================================================================
    // Pose
    // =========================================================================

    /// Pose as the engine sees it.
    #[must_use]
    pub fn pose(&self) -> Option<(Vec3, Quat)> {
        self.with(|s| s.body_pose(self.handle)).flatten()
    }

    /// Teleports the body.
    pub fn set_position(&self, position: Vec3) -> bool {
        self.with(|s| s.set_body_position(self.handle, position))
            .unwrap_or(false)
    }

    /// Sets the rotation directly.
    pub fn set_rotation(&self, rotation: Quat) -> bool {
        self.with(|s| s.set_body_rotation(self.handle, rotation))
            .unwrap_or(false)
    }

    /// Tells a kinematic body where to be at the end of the next step.
    pub fn move_kinematic(&self, position: Vec3, rotation: Quat, dt: f32) -> bool {
        self.with(|s| s.move_kinematic(self.handle, position, rotation, dt))
            .unwrap_or(false)
    }

    // =========================================================================
    // Activation
    // =========================================================================

    /// Wakes the body.
    pub fn activate(&self) -> bool {
        self.with(|s| s.activate_body(self.handle)).unwrap_or(false)
    }

    /// Puts the body to sleep.
    pub fn deactivate(&self) -> bool {
        self.with(|s| s.deactivate_body(self.handle)).unwrap_or(false)
    }

    /// Checks if the body is awake.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.with(|s| s.is_body_active(self.handle)).unwrap_or(false)
    }

    /// Checks if any enabled constraint references the body.
    #[must_use]
    pub fn is_constrained(&self) -> bool {
        self.with(|s| s.body_has_constraint(self.handle))
            .unwrap_or(false)
    }

    /// Removes the body from the world. Runs at most once.
    fn destroy(&mut self) {
        if !self.is_added {
            return;
        }
        let handle = self.handle;
        let removed = self.link.with(|system| system.remove_body(handle));
        self.is_added = false;
        tracing::debug!(
            entity = self.entity.raw(),
            removed = removed.unwrap_or(false),
            "rigid body destroyed"
        );
    }
}

impl Drop for RigidBody {
    fn drop(&mut self) {
        self.destroy();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::EntityManager;
    use ligament_physics::PhysicsConfig;

    fn world() -> PhysicsWorld {
        PhysicsWorld::new(&PhysicsConfig {
            worker_threads: 1,
            ..PhysicsConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_attach_uses_entity_pose() {
        let world = world();
        let mut manager = EntityManager::new();
        let entity = manager.create_entity(Some("box"));
        let id = entity.id();
        entity.set_position(Vec3::new(1.0, 2.0, 3.0));

        let body = attach_rigid_body(entity, &world, &RigidBodyDesc::dynamic(ShapeDesc::sphere(0.5))).unwrap();
        assert!(body.is_added());
        assert_eq!(body.entity(), id);
        let (position, _) = body.pose().unwrap();
        assert!((position - Vec3::new(1.0, 2.0, 3.0)).length() < 1e-5);
        assert_eq!(world.entity_for_body(body.handle()), Some(id));
    }

    #[test]
    fn test_second_attach_rejected() {
        let world = world();
        let mut manager = EntityManager::new();
        let entity = manager.create_entity(None);
        let desc = RigidBodyDesc::dynamic(ShapeDesc::sphere(0.5));

        let first = attach_rigid_body(entity, &world, &desc).unwrap().handle();
        assert!(attach_rigid_body(entity, &world, &desc).is_none());
        assert_eq!(entity.rigid_body().map(RigidBody::handle), Some(first));
        assert_eq!(world.body_count(), 1);
    }

    #[test]
    fn test_bad_shape_leaves_entity_untouched() {
        let world = world();
        let mut manager = EntityManager::new();
        let entity = manager.create_entity(None);

        assert!(attach_rigid_body(entity, &world, &RigidBodyDesc::dynamic(ShapeDesc::sphere(-1.0))).is_none());
        assert!(!entity.has_component(ComponentKind::RigidBody));
        assert_eq!(world.body_count(), 0);
    }

    #[test]
    fn test_remove_releases_body() {
        let world = world();
        let mut manager = EntityManager::new();
        let entity = manager.create_entity(None);
        attach_rigid_body(entity, &world, &RigidBodyDesc::fixed(ShapeDesc::cuboid(Vec3::ONE))).unwrap();
        assert_eq!(world.body_count(), 1);

        assert!(remove_rigid_body(entity));
        assert_eq!(world.body_count(), 0);
        assert!(!remove_rigid_body(entity));
    }

    #[test]
    fn test_forces_need_dynamic_body() {
        let world = world();
        let mut manager = EntityManager::new();
        let fixed = manager.create_entity(None);
        let fixed = attach_rigid_body(fixed, &world, &RigidBodyDesc::fixed(ShapeDesc::sphere(0.5))).unwrap();
        assert!(!fixed.add_impulse(Vec3::Y));
        assert!(!fixed.set_linear_velocity(Vec3::Y));

        let moving = manager.create_entity(None);
        let moving = attach_rigid_body(moving, &world, &RigidBodyDesc::dynamic(ShapeDesc::sphere(0.5))).unwrap();
        assert!(moving.add_impulse(Vec3::Y));
        assert!(moving.linear_velocity().y > 0.0);
    }

    #[test]
    fn test_motion_change() {
        let world = world();
        let mut manager = EntityManager::new();
        let entity = manager.create_entity(None);
        let body = attach_rigid_body(entity, &world, &RigidBodyDesc::dynamic(ShapeDesc::sphere(0.5))).unwrap();

        assert!(body.set_motion_type(MotionType::Kinematic));
        assert_eq!(body.motion_type(), MotionType::Kinematic);
        assert!(!body.set_motion_type(MotionType::Static));
        assert_eq!(body.motion_type(), MotionType::Kinematic);
    }

    #[test]
    fn test_outliving_the_world_is_harmless() {
        let world = world();
        let mut manager = EntityManager::new();
        let entity = manager.create_entity(None);
        attach_rigid_body(entity, &world, &RigidBodyDesc::dynamic(ShapeDesc::sphere(0.5))).unwrap();

        drop(world);
        let body = entity.rigid_body().unwrap();
        assert!(!body.add_force(Vec3::Y));
        assert_eq!(body.linear_velocity(), Vec3::ZERO);
        assert!(remove_rigid_body(entity));
    }
}
