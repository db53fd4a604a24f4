//! # Simulation Integration Test
//!
//! Entities, components, the synchronization passes and the fixed-step
//! loop running against a real physics world.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use glam::{Quat, Vec3};
use ligament::core::{SceneNodes, VisualSink};
use ligament::physics::{ConstraintDesc, ConstraintKind, HingeDesc, PhysicsConfig};
use ligament::{
    attach_character_controller, attach_rigid_body, push_impulse, sync_entities_to_physics,
    sync_physics_to_entities, update_all_character_controllers, CharacterContact,
    CharacterControllerConfig, CollisionKind, ComponentData, ComponentKind, ContactStage, EntityManager,
    GroundState, NoGameplay, PhysicsWorld, RigidBodyDesc, ShapeDesc, Simulation, SimulationConfig,
    TickContext,
};
use parking_lot::Mutex;

const DT: f32 = 1.0 / 60.0;

fn physics_config() -> PhysicsConfig {
    PhysicsConfig {
        worker_threads: 1,
        ..PhysicsConfig::default()
    }
}

fn world() -> PhysicsWorld {
    PhysicsWorld::new(&physics_config()).expect("default world")
}

fn simulation() -> Simulation {
    Simulation::new(SimulationConfig {
        physics: physics_config(),
        ..SimulationConfig::default()
    })
    .expect("default simulation")
}

fn spawn_floor(manager: &mut EntityManager, world: &PhysicsWorld) {
    let floor = manager.create_entity(Some("floor"));
    floor.set_position(Vec3::new(0.0, -0.5, 0.0));
    attach_rigid_body(floor, world, &RigidBodyDesc::fixed(ShapeDesc::cuboid(Vec3::new(25.0, 0.5, 25.0))))
        .expect("floor body");
}

fn counting_destructor(counter: &Arc<AtomicUsize>) -> impl FnOnce(ComponentData) + Send + 'static {
    let counter = Arc::clone(counter);
    move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

/// Test: replacing a component runs the old destructor exactly once.
#[test]
fn test_replacing_component_destroys_previous() {
    let mut manager = EntityManager::new();
    let destroyed = Arc::new(AtomicUsize::new(0));

    let entity = manager.create_entity(Some("animated"));
    entity.add_component(ComponentData::Animator(Box::new(1_u32)));
    assert!(entity.set_component_destructor(ComponentKind::Animator, counting_destructor(&destroyed)));

    entity.add_component(ComponentData::Animator(Box::new(2_u32)));
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    assert_eq!(entity.animator::<u32>(), Some(&2));

    // The replacement has no destructor of its own.
    entity.add_component(ComponentData::Animator(Box::new(3_u32)));
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
}

/// Test: destroying an entity shrinks the manager by one and runs each
/// component destructor once.
#[test]
fn test_destroy_entity_runs_destructors_once() {
    let world = world();
    let mut manager = EntityManager::new();
    let destroyed = Arc::new(AtomicUsize::new(0));

    manager.create_entity(Some("keep"));
    let doomed = manager.create_entity(Some("doomed"));
    let id = doomed.id();
    attach_rigid_body(doomed, &world, &RigidBodyDesc::dynamic(ShapeDesc::sphere(0.5))).expect("body");
    doomed.add_component(ComponentData::AudioSource(Box::new("hum")));
    doomed.set_component_destructor(ComponentKind::RigidBody, counting_destructor(&destroyed));
    doomed.set_component_destructor(ComponentKind::AudioSource, counting_destructor(&destroyed));
    assert_eq!(world.body_count(), 1);

    let before = manager.len();
    assert!(manager.destroy_entity(id));
    assert_eq!(manager.len(), before - 1);
    assert_eq!(destroyed.load(Ordering::SeqCst), 2);
    assert_eq!(world.body_count(), 0);

    assert!(!manager.destroy_entity(id));
    assert_eq!(destroyed.load(Ordering::SeqCst), 2);
}

/// Test: a kinematic target reaches physics within one step and is never
/// written back.
#[test]
fn test_kinematic_target_visible_to_raycasts() {
    let mut world = world();
    let mut manager = EntityManager::new();

    let platform = manager.create_entity(Some("platform"));
    platform.set_position(Vec3::new(0.0, 5.0, 0.0));
    let id = platform.id();
    attach_rigid_body(platform, &world, &RigidBodyDesc::kinematic(ShapeDesc::cuboid(Vec3::splat(0.5))))
        .expect("platform body");

    let target = Vec3::new(10.0, 5.0, 0.0);
    manager.get_mut(id).expect("platform").set_position(target);
    assert_eq!(sync_entities_to_physics(&mut manager, DT), 1);
    world.step(DT, 1);

    let hit = world
        .raycast(Vec3::new(10.0, 10.0, 0.0), Vec3::NEG_Y, 50.0)
        .expect("platform hit at its new position");
    assert_eq!(hit.entity, Some(id));
    assert!((hit.distance - 4.5).abs() < 1e-2, "distance {}", hit.distance);
    assert!(world.raycast(Vec3::new(0.0, 10.0, 0.0), Vec3::NEG_Y, 50.0).is_none());

    assert_eq!(sync_physics_to_entities(&mut manager), 0);
    assert_eq!(manager.get(id).expect("platform").position(), target);
}

/// Test: reading dynamic poses back twice without a step changes nothing.
#[test]
fn test_physics_to_entities_is_idempotent() {
    let mut world = world();
    let mut manager = EntityManager::new();

    let ball = manager.create_entity(Some("ball"));
    ball.set_position(Vec3::new(0.0, 10.0, 0.0));
    let id = ball.id();
    attach_rigid_body(ball, &world, &RigidBodyDesc::dynamic(ShapeDesc::sphere(0.5))).expect("ball");

    for _ in 0..5 {
        world.step(DT, 1);
    }
    sync_physics_to_entities(&mut manager);
    let first = *manager.get(id).expect("ball").transform();
    sync_physics_to_entities(&mut manager);
    let second = *manager.get(id).expect("ball").transform();

    assert_eq!(first, second);
    assert!(first.position.y < 10.0);
}

/// Test: the floor raycast resolves to the floor entity's name.
#[test]
fn test_raycast_resolves_entity_name() {
    let world = world();
    let mut manager = EntityManager::new();
    spawn_floor(&mut manager, &world);
    world.optimize_broad_phase();

    let hit = world
        .raycast(Vec3::new(0.0, 2.0, 0.0), Vec3::NEG_Y, 50.0)
        .expect("floor hit");
    // Top face of the floor sits at y = 0.
    assert!((hit.distance - 2.0).abs() < 1e-3);
    assert!(hit.position.length() < 1e-3);

    let entity = hit.entity.and_then(|id| manager.get(id)).expect("owning entity");
    assert_eq!(entity.name(), "floor");
    assert!(entity.rigid_body().is_some());
}

/// Test: a fresh character reports in-air with a zero velocity.
#[test]
fn test_fresh_character_is_in_air() {
    let world = world();
    let mut manager = EntityManager::new();
    let player = manager.create_entity(Some("player"));
    player.set_position(Vec3::new(0.0, 5.0, 0.0));

    let controller =
        attach_character_controller(player, &world, &CharacterControllerConfig::default()).expect("character");
    assert_eq!(controller.ground_state(), GroundState::InAir);
    assert!(!controller.is_grounded());
    assert_eq!(controller.velocity(), Vec3::ZERO);
    assert!((controller.position() - Vec3::new(0.0, 5.0, 0.0)).length() < 1e-5);
}

/// Test: a hinged door is offered at the validate stage with zero geometry,
/// a free body reports real contact geometry, and walking into the door
/// still reports it as added with its real geometry.
#[test]
fn test_contact_arbitration_for_constrained_and_free_bodies() {
    let world = world();
    let mut manager = EntityManager::new();
    spawn_floor(&mut manager, &world);

    let post = manager.create_entity(Some("post"));
    post.set_position(Vec3::new(2.0, 1.0, 0.0));
    let post_body = attach_rigid_body(post, &world, &RigidBodyDesc::fixed(ShapeDesc::cuboid(Vec3::new(0.1, 1.0, 0.1))))
        .expect("post")
        .handle();

    let door = manager.create_entity(Some("door"));
    door.set_position(Vec3::new(1.0, 1.0, 0.0));
    let door_id = door.id();
    let door_body = attach_rigid_body(door, &world, &RigidBodyDesc::dynamic(ShapeDesc::cuboid(Vec3::new(0.3, 1.0, 0.3))))
        .expect("door")
        .handle();
    world
        .create_constraint(
            post_body,
            door_body,
            &ConstraintDesc {
                kind: ConstraintKind::Hinge(HingeDesc::default()),
                anchor_a: Vec3::new(-0.1, 0.0, 0.0),
                anchor_b: Vec3::new(0.3, 0.0, 0.0),
            },
        )
        .expect("hinge");

    let ball = manager.create_entity(Some("ball"));
    ball.set_position(Vec3::new(-1.0, 1.0, 0.0));
    let ball_id = ball.id();
    attach_rigid_body(ball, &world, &RigidBodyDesc::dynamic(ShapeDesc::sphere(0.5))).expect("ball");

    let player = manager.create_entity(Some("player"));
    player.set_position(Vec3::new(0.0, 1.01, 0.0));
    let player_id = player.id();
    let contacts: Arc<Mutex<Vec<CharacterContact>>> = Arc::default();
    {
        let contacts = Arc::clone(&contacts);
        attach_character_controller(player, &world, &CharacterControllerConfig::default())
            .expect("character")
            .set_contact_callback(move |contact| contacts.lock().push(*contact));
    }
    world.optimize_broad_phase();

    update_all_character_controllers(&mut manager, DT, world.gravity());

    {
        let contacts = contacts.lock();
        let door_contacts: Vec<_> = contacts.iter().filter(|c| c.hit == Some(door_id)).collect();
        assert_eq!(door_contacts.len(), 1, "{contacts:?}");
        assert_eq!(door_contacts[0].stage, ContactStage::Validate);
        assert_eq!(door_contacts[0].position, Vec3::ZERO);
        assert_eq!(door_contacts[0].normal, Vec3::ZERO);

        let ball_contact = contacts
            .iter()
            .find(|c| c.hit == Some(ball_id))
            .expect("ball contact");
        assert_eq!(ball_contact.stage, ContactStage::Added);
        assert!(ball_contact.position.length() > 0.5);
        // Normal points from the ball towards the character.
        assert!(ball_contact.normal.x > 0.5, "normal {:?}", ball_contact.normal);
    }

    contacts.lock().clear();
    manager
        .get_mut(player_id)
        .and_then(|e| e.character_mut())
        .expect("controller")
        .set_velocity(Vec3::new(2.0, 0.0, 0.0));
    for _ in 0..10 {
        update_all_character_controllers(&mut manager, DT, Vec3::ZERO);
    }

    let contacts = contacts.lock();
    let validated = contacts
        .iter()
        .filter(|c| c.hit == Some(door_id) && c.stage == ContactStage::Validate)
        .count();
    let added: Vec<_> = contacts
        .iter()
        .filter(|c| c.hit == Some(door_id) && c.stage == ContactStage::Added)
        .collect();
    assert_eq!(validated, 10);
    assert!(!added.is_empty(), "{contacts:?}");
    for contact in added {
        assert!(contact.position.length() > 0.5);
        // Normal points from the door back towards the character.
        assert!(contact.normal.x < -0.5, "normal {:?}", contact.normal);
    }
}

/// Test: the push impulse grows with speed and mass and vanishes when
/// moving away.
#[test]
fn test_push_impulse_monotonic() {
    let normal = Vec3::NEG_Z;
    let mut previous = 0.0;
    for speed in [0.5_f32, 1.0, 2.0, 4.0] {
        let impulse = push_impulse(Vec3::new(0.0, 0.0, speed), normal, 70.0).expect("moving into body");
        assert!(impulse.length() > previous);
        assert!(impulse.z > 0.0);
        previous = impulse.length();
    }
    assert!(push_impulse(Vec3::new(0.0, 0.0, -1.0), normal, 70.0).is_none());
}

fn pushed_box_speed(character_speed: f32, character_mass: f32) -> f32 {
    let world = world();
    let mut manager = EntityManager::new();
    spawn_floor(&mut manager, &world);

    let crate_box = manager.create_entity(Some("box"));
    crate_box.set_position(Vec3::new(1.0, 0.5, 0.0));
    let crate_id = crate_box.id();
    attach_rigid_body(crate_box, &world, &RigidBodyDesc::dynamic(ShapeDesc::cuboid(Vec3::splat(0.5))))
        .expect("box");

    let player = manager.create_entity(Some("player"));
    player.set_position(Vec3::new(0.0, 1.01, 0.0));
    let config = CharacterControllerConfig {
        mass: character_mass,
        ..CharacterControllerConfig::default()
    };
    attach_character_controller(player, &world, &config)
        .expect("character")
        .set_velocity(Vec3::new(character_speed, 0.0, 0.0));
    world.optimize_broad_phase();

    update_all_character_controllers(&mut manager, DT, Vec3::ZERO);

    manager
        .get(crate_id)
        .and_then(|e| e.rigid_body())
        .expect("box body")
        .linear_velocity()
        .x
}

/// Test: walking into a free box pushes it along the walk direction,
/// harder with more speed or mass, and not at all when walking away.
#[test]
fn test_character_pushes_free_box() {
    let slow = pushed_box_speed(1.0, 70.0);
    let fast = pushed_box_speed(3.0, 70.0);
    let heavy = pushed_box_speed(1.0, 140.0);
    let away = pushed_box_speed(-1.0, 70.0);

    assert!(slow > 0.0, "slow {slow}");
    assert!(fast > slow, "fast {fast} slow {slow}");
    assert!(heavy > slow, "heavy {heavy} slow {slow}");
    assert!(away.abs() < 1e-6, "away {away}");
}

/// Test: a dropped crate settles on the floor and its matrix reaches the
/// visual node.
#[test]
fn test_simulation_drops_crate_onto_floor() {
    let mut sim = simulation();
    let mut nodes = SceneNodes::new(4);
    let begins = Arc::new(AtomicUsize::new(0));
    {
        let begins = Arc::clone(&begins);
        sim.physics_mut().set_collision_callback(move |event| {
            if event.kind == CollisionKind::Begin {
                begins.fetch_add(1, Ordering::SeqCst);
            }
        });
    }

    let (entities, physics) = sim.parts_mut();
    spawn_floor(entities, physics);
    let crate_box = entities.create_entity(Some("crate"));
    crate_box.set_position(Vec3::new(0.0, 3.0, 0.0));
    crate_box.set_node(nodes.create_node());
    let crate_id = crate_box.id();
    attach_rigid_body(crate_box, physics, &RigidBodyDesc::dynamic(ShapeDesc::cuboid(Vec3::splat(0.5))))
        .expect("crate");
    physics.optimize_broad_phase();

    let dt = sim.fixed_timestep();
    for _ in 0..180 {
        sim.advance(dt, &mut NoGameplay, &mut nodes);
    }
    assert_eq!(sim.tick_count(), 180);

    let entity = sim.entities().get(crate_id).expect("crate");
    let position = entity.position();
    assert!((position.y - 0.5).abs() < 0.1, "crate at {position:?}");
    assert!(begins.load(Ordering::SeqCst) >= 1);

    let node = entity.node().expect("node");
    let matrix = nodes.matrix(node).expect("matrix");
    assert!((matrix.w_axis.truncate() - position).length() < 1e-5);
}

/// Test: gameplay gravity brings the character down onto the floor.
#[test]
fn test_simulation_character_lands() {
    let mut sim = simulation();
    let (entities, physics) = sim.parts_mut();
    spawn_floor(entities, physics);
    let player = entities.create_entity(Some("player"));
    player.set_position(Vec3::new(0.0, 2.0, 0.0));
    let id = player.id();
    attach_character_controller(player, physics, &CharacterControllerConfig::default()).expect("character");
    physics.optimize_broad_phase();

    let mut gameplay = |ctx: &mut TickContext<'_>| {
        let dt = ctx.dt as f32;
        if let Some(character) = ctx.entities.get_mut(id).and_then(|e| e.character_mut()) {
            character.add_velocity(Vec3::new(0.0, -20.0 * dt, 0.0));
        }
    };
    let mut sink = NullSink;
    let dt = sim.fixed_timestep();
    for _ in 0..120 {
        sim.advance(dt, &mut gameplay, &mut sink);
    }

    let entity = sim.entities().get(id).expect("player");
    let character = entity.character().expect("controller");
    assert!(character.is_grounded(), "{:?}", character.ground_state());
    let y = entity.position().y;
    assert!(y > 0.9 && y < 1.2, "player at {y}");
    assert_eq!(entity.rotation(), Quat::IDENTITY);
}

struct NullSink;

impl VisualSink for NullSink {
    fn write_transform(&mut self, _node: ligament::core::NodeHandle, _matrix: glam::Mat4) -> bool {
        false
    }
}
