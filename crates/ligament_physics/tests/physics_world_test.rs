//! # Physics World Integration Tests
//!
//! End-to-end behaviour of the world: construction, raycasts, kinematic
//! moves, collision events, constraints and the virtual character.

use std::sync::Arc;

use glam::{Quat, Vec3};
use ligament_core::EntityId;
use ligament_physics::{
    BodyDesc, BodyHandle, CharacterSettings, CharacterVirtual, CollisionKind, ConstraintDesc,
    ConstraintKind, ContactEvent, ContactResponse, ExtendedUpdateSettings, HingeDesc, MotionType,
    MotorState, ObjectLayer, PhysicsConfig, PhysicsError, PhysicsWorld, Shape, ShapeDesc,
    SupportState,
};
use parking_lot::Mutex;

const DT: f32 = 1.0 / 60.0;

fn world() -> PhysicsWorld {
    PhysicsWorld::new(&PhysicsConfig {
        worker_threads: 2,
        ..PhysicsConfig::default()
    })
    .expect("default world")
}

fn floor(world: &PhysicsWorld, entity: u32) -> BodyHandle {
    let shape = Shape::from_desc(&ShapeDesc::cuboid(Vec3::new(25.0, 0.5, 25.0))).unwrap();
    let desc = BodyDesc::new(shape, MotionType::Static, ObjectLayer::Static)
        .at(Vec3::new(0.0, -0.5, 0.0), Quat::IDENTITY)
        .owned_by(EntityId::from_raw(entity));
    world.lock().create_body(&desc).unwrap()
}

fn dynamic_box(world: &PhysicsWorld, position: Vec3, entity: u32) -> BodyHandle {
    let shape = Shape::from_desc(&ShapeDesc::cuboid(Vec3::splat(0.5))).unwrap();
    let desc = BodyDesc::new(shape, MotionType::Dynamic, ObjectLayer::Dynamic)
        .at(position, Quat::IDENTITY)
        .owned_by(EntityId::from_raw(entity));
    world.lock().create_body(&desc).unwrap()
}

/// Test: the documented raycast scenario through the world facade.
#[test]
fn test_raycast_against_floor() {
    let world = world();
    floor(&world, 1);
    world.optimize_broad_phase();

    let hit = world
        .raycast(Vec3::new(0.0, 2.0, 0.0), Vec3::NEG_Y, 50.0)
        .expect("floor hit");
    assert!((hit.distance - 2.0).abs() < 1e-3, "distance {}", hit.distance);
    assert!(hit.position.length() < 1e-3);
    assert_eq!(hit.entity, Some(EntityId::from_raw(1)));
}

/// Test: invalid configurations never yield a world.
#[test]
fn test_construction_is_all_or_nothing() {
    let bad = [
        PhysicsConfig {
            max_bodies: 0,
            ..PhysicsConfig::default()
        },
        PhysicsConfig {
            scratch_bytes: 0,
            ..PhysicsConfig::default()
        },
        PhysicsConfig {
            gravity: [0.0, f32::NAN, 0.0],
            ..PhysicsConfig::default()
        },
    ];
    for config in &bad {
        assert!(PhysicsWorld::new(config).is_err());
    }
}

/// Test: body creation stops at the configured limit.
#[test]
fn test_body_limit() {
    let world = PhysicsWorld::new(&PhysicsConfig {
        max_bodies: 1,
        ..PhysicsConfig::default()
    })
    .unwrap();
    floor(&world, 1);

    let shape = Shape::from_desc(&ShapeDesc::sphere(0.5)).unwrap();
    let desc = BodyDesc::new(shape, MotionType::Dynamic, ObjectLayer::Dynamic);
    assert_eq!(
        world.lock().create_body(&desc),
        Err(PhysicsError::BodyLimit { max: 1 })
    );
}

/// Test: a kinematic target is reached in one step and queries see it.
#[test]
fn test_kinematic_move_reaches_target() {
    let mut world = world();
    let shape = Shape::from_desc(&ShapeDesc::cuboid(Vec3::splat(0.5))).unwrap();
    let desc = BodyDesc::new(shape, MotionType::Kinematic, ObjectLayer::Kinematic)
        .at(Vec3::new(0.0, 5.0, 0.0), Quat::IDENTITY)
        .owned_by(EntityId::from_raw(3));
    let platform = world.lock().create_body(&desc).unwrap();

    let target = Vec3::new(3.0, 5.0, 0.0);
    assert!(world
        .lock()
        .move_kinematic(platform, target, Quat::IDENTITY, DT));
    assert_eq!(world.step(DT, 2), 2);

    let (position, _) = world.lock().body_pose(platform).unwrap();
    assert!((position - target).length() < 1e-3, "position {position}");

    let hit = world
        .raycast(Vec3::new(3.0, 10.0, 0.0), Vec3::NEG_Y, 20.0)
        .expect("platform hit");
    assert_eq!(hit.entity, Some(EntityId::from_raw(3)));
    assert!((hit.position.y - 5.5).abs() < 1e-3);
}

/// Test: motion-mismatched operations are silent no-ops.
#[test]
fn test_forces_ignore_non_dynamic_bodies() {
    let world = world();
    let ground = floor(&world, 1);
    let mut system = world.lock();

    assert!(!system.add_force(ground, Vec3::Y));
    assert!(!system.add_impulse(ground, Vec3::Y));
    assert!(!system.set_linear_velocity(ground, Vec3::Y));
    assert!(!system.is_body_active(ground));
    assert!(system.set_motion_type(ground, MotionType::Dynamic).is_err());
}

/// Test: a falling box starts a contact with the floor.
#[test]
fn test_collision_begin_reaches_callback() {
    let mut world = world();
    floor(&world, 1);
    let crate_ = dynamic_box(&world, Vec3::new(0.0, 2.0, 0.0), 2);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    world.set_collision_callback(move |event| sink.lock().push(*event));

    for _ in 0..120 {
        world.step(DT, 1);
        world.process_collisions();
    }

    let events = seen.lock();
    let begin = events
        .iter()
        .find(|e| e.kind == CollisionKind::Begin)
        .expect("begin event");
    assert!(begin.involves(EntityId::from_raw(1)));
    assert!(begin.involves(EntityId::from_raw(2)));
    assert_eq!(world.active_contact_pairs(), 1);

    let (position, _) = world.lock().body_pose(crate_).unwrap();
    assert!(position.y > 0.0 && position.y < 2.0);
}

/// Test: a batch larger than the scratch budget is still delivered whole.
#[test]
fn test_collision_batch_over_scratch_budget() {
    let mut world = PhysicsWorld::new(&PhysicsConfig {
        worker_threads: 1,
        scratch_bytes: 1,
        ..PhysicsConfig::default()
    })
    .expect("tiny scratch world");
    floor(&world, 1);
    for i in 0..3_u8 {
        dynamic_box(&world, Vec3::new(f32::from(i) * 3.0 - 3.0, 1.0, 0.0), 10 + u32::from(i));
    }

    let mut begins = 0;
    for _ in 0..120 {
        world.step(DT, 1);
        begins += world
            .drain_collision_events()
            .iter()
            .filter(|e| e.kind == CollisionKind::Begin)
            .count();
    }

    assert!(begins >= 3, "begins {begins}");
    assert_eq!(world.active_contact_pairs(), 3);
    assert!(world.scratch_peak() > 1);
}

/// Test: removing a body ends its contacts and drops its constraints.
#[test]
fn test_remove_body_cleans_up() {
    let mut world = world();
    let frame = floor(&world, 1);
    let door = dynamic_box(&world, Vec3::new(0.0, 1.0, 0.0), 2);

    let desc = ConstraintDesc {
        kind: ConstraintKind::Hinge(HingeDesc::default()),
        anchor_a: Vec3::new(0.0, 0.5, 0.0),
        anchor_b: Vec3::new(0.0, -0.5, 0.0),
    };
    world.create_constraint(frame, door, &desc).unwrap();
    assert!(world.body_has_constraint(door));
    assert!(world.body_has_constraint(frame));

    assert!(world.lock().remove_body(door));
    assert!(!world.body_has_constraint(frame));
    assert_eq!(world.lock().constraint_count(), 0);
    assert!(world.entity_for_body(door).is_none());
    assert_eq!(world.step(DT, 1), 1);
}

/// Test: a constraint cannot join a body to itself or to a stale handle.
#[test]
fn test_invalid_constraints_rejected() {
    let world = world();
    let a = dynamic_box(&world, Vec3::new(0.0, 1.0, 0.0), 1);
    let b = dynamic_box(&world, Vec3::new(2.0, 1.0, 0.0), 2);
    let desc = ConstraintDesc {
        kind: ConstraintKind::Fixed,
        anchor_a: Vec3::ZERO,
        anchor_b: Vec3::ZERO,
    };

    assert!(world.create_constraint(a, a, &desc).is_err());
    world.lock().remove_body(b);
    assert_eq!(
        world.create_constraint(a, b, &desc),
        Err(PhysicsError::UnknownBody)
    );
}

/// Test: a hinge motor swings a door around its axis.
#[test]
fn test_hinge_motor_turns_door() {
    let mut world = world();
    let frame = floor(&world, 1);
    let shape = Shape::from_desc(&ShapeDesc::cuboid(Vec3::new(0.5, 1.0, 0.05))).unwrap();
    let desc = BodyDesc::new(shape, MotionType::Dynamic, ObjectLayer::Dynamic)
        .at(Vec3::new(0.5, 1.5, 0.0), Quat::IDENTITY)
        .owned_by(EntityId::from_raw(2));
    let door = world.lock().create_body(&desc).unwrap();

    let hinge = world
        .create_constraint(
            frame,
            door,
            &ConstraintDesc {
                kind: ConstraintKind::Hinge(HingeDesc::default()),
                anchor_a: Vec3::new(0.0, 2.0, 0.0),
                anchor_b: Vec3::new(-0.5, 0.0, 0.0),
            },
        )
        .unwrap();
    assert_eq!(world.lock().motor_state(hinge), Some(MotorState::Off));

    assert!(world.set_motor_state(hinge, MotorState::Velocity));
    assert!(world.set_motor_target_velocity(hinge, 2.0));
    for _ in 0..30 {
        world.step(DT, 1);
    }

    let angle = world.constraint_position(hinge).unwrap();
    assert!(angle.abs() > 0.1, "angle {angle}");

    assert!(world.body_has_constraint(door));
    assert!(world.set_constraint_enabled(hinge, false));
    assert!(!world.lock().is_constraint_enabled(hinge));
    assert!(!world.body_has_constraint(door));
    assert!(world.remove_constraint(hinge));
    assert!(!world.remove_constraint(hinge));
}

/// Test: a character starts in the air and settles onto the floor.
#[test]
fn test_character_lands_on_floor() {
    let world = world();
    floor(&world, 1);
    world.optimize_broad_phase();

    let settings = CharacterSettings::default();
    let start = Vec3::new(0.0, settings.half_height + settings.radius + 0.01, 0.0);
    let mut system = world.lock();
    let mut character =
        CharacterVirtual::new(&mut system, settings, start, Quat::IDENTITY, EntityId::from_raw(5))
            .unwrap();
    assert_eq!(character.support_state(), SupportState::InAir);

    let gravity = system.gravity();
    let mut accept = |_: &ContactEvent| ContactResponse::Accept;
    for _ in 0..10 {
        let velocity = character.linear_velocity() + gravity * DT;
        character.set_linear_velocity(velocity);
        character.extended_update(&mut system, DT, gravity, &ExtendedUpdateSettings::default(), &mut accept);
    }

    assert_eq!(character.support_state(), SupportState::OnGround);
    assert!(character.ground().normal.y > 0.9);
    assert!(character.linear_velocity().y.abs() < 1e-3);
    assert!(character.position().y > 0.9 && character.position().y < 1.1);

    let inner = character.inner_body();
    character.destroy(&mut system);
    assert!(!system.contains_body(inner));
}

/// Test: a validate veto lets the character sweep through a body, which is
/// still reported with real contact geometry but never solved.
#[test]
fn test_character_validate_ignore() {
    let world = world();
    floor(&world, 1);
    let obstacle = dynamic_box(&world, Vec3::new(1.2, 1.0, 0.0), 9);
    world.optimize_broad_phase();

    let mut system = world.lock();
    let start = Vec3::new(0.0, 1.2, 0.0);
    let mut character = CharacterVirtual::new(
        &mut system,
        CharacterSettings::default(),
        start,
        Quat::IDENTITY,
        EntityId::from_raw(5),
    )
    .unwrap();

    let mut validated = Vec::new();
    let mut added = Vec::new();
    let mut solved = 0;
    let mut listener = |event: &ContactEvent| match event {
        ContactEvent::Validate { body } if body.handle == obstacle => {
            validated.push(body.entity);
            ContactResponse::Ignore
        }
        ContactEvent::Added { body, normal, .. } if body.handle == obstacle => {
            added.push((body.entity, *normal));
            ContactResponse::Accept
        }
        ContactEvent::Solve { body, .. } if body.handle == obstacle => {
            solved += 1;
            ContactResponse::Accept
        }
        _ => ContactResponse::Accept,
    };

    character.set_linear_velocity(Vec3::new(3.0, 0.0, 0.0));
    for _ in 0..20 {
        let gravity = Vec3::ZERO;
        character.extended_update(&mut system, DT, gravity, &ExtendedUpdateSettings::default(), &mut listener);
    }

    assert!(!validated.is_empty());
    assert!(validated.iter().all(|e| *e == Some(EntityId::from_raw(9))));
    assert!(character.position().x > 0.9, "x {}", character.position().x);

    assert!(!added.is_empty());
    for (entity, normal) in &added {
        assert_eq!(*entity, Some(EntityId::from_raw(9)));
        assert!((normal.length() - 1.0).abs() < 1e-3, "normal {normal}");
    }
    assert_eq!(solved, 0);
}
