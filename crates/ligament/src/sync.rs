//! # Synchronization Passes
//!
//! The per-tick passes that move transforms across the physics boundary.
//! Direction is fixed by motion type:
//!
//! | Motion    | Entity -> physics   | Physics -> entity |
//! |-----------|---------------------|-------------------|
//! | static    | never               | never             |
//! | kinematic | move-to-target      | never             |
//! | dynamic   | never               | pose overwritten  |
//!
//! Characters are their own direction: the engine-side character is the
//! source of truth and its pose is copied onto the entity after the step.

use glam::Vec3;
use ligament_core::{ComponentKind, ComponentMask, VisualSink};
use ligament_physics::MotionType;

use crate::ecs::EntityManager;

/// Pushes every kinematic entity's transform into physics as the target
/// pose for the coming step.
///
/// # Returns
///
/// Number of bodies given a target.
pub fn sync_entities_to_physics(manager: &mut EntityManager, dt: f32) -> usize {
    let mut moved = 0;
    manager.for_each_with(ComponentMask::of(ComponentKind::RigidBody), |entity| {
        let (position, rotation) = (entity.position(), entity.rotation());
        let Some(body) = entity.rigid_body() else {
            return;
        };
        if body.motion_type() != MotionType::Kinematic {
            return;
        }
        if body.move_kinematic(position, rotation, dt) {
            moved += 1;
        }
    });
    moved
}

/// Copies the post-step pose of every dynamic body onto its entity.
///
/// Idempotent between steps.
///
/// # Returns
///
/// Number of entities updated.
pub fn sync_physics_to_entities(manager: &mut EntityManager) -> usize {
    let mut updated = 0;
    manager.for_each_with(ComponentMask::of(ComponentKind::RigidBody), |entity| {
        let pose = entity
            .rigid_body()
            .filter(|body| body.motion_type() == MotionType::Dynamic)
            .and_then(|body| body.pose());
        if let Some((position, rotation)) = pose {
            entity.set_position(position);
            entity.set_rotation(rotation);
            updated += 1;
        }
    });
    updated
}

/// Runs the extended update of every enabled character controller.
pub fn update_all_character_controllers(manager: &mut EntityManager, dt: f32, gravity: Vec3) {
    manager.for_each_with(ComponentMask::of(ComponentKind::Character), |entity| {
        if let Some(character) = entity.character_mut() {
            character.update(dt, gravity);
        }
    });
}

/// Copies every character's pose onto its entity.
pub fn sync_character_controllers_to_entities(manager: &mut EntityManager) {
    manager.for_each_with(ComponentMask::of(ComponentKind::Character), |entity| {
        let Some(character) = entity.character() else {
            return;
        };
        let (position, rotation) = (character.position(), character.rotation());
        entity.set_position(position);
        entity.set_rotation(rotation);
    });
}

/// Writes the matrix of every active entity with a visual node.
///
/// # Returns
///
/// Number of matrices the sink accepted.
pub fn sync_entity_transforms(manager: &mut EntityManager, sink: &mut dyn VisualSink) -> usize {
    let mut written = 0;
    manager.for_each(|entity| {
        if let Some(node) = entity.node() {
            if sink.write_transform(node, entity.transform_matrix()) {
                written += 1;
            }
        }
    });
    written
}
