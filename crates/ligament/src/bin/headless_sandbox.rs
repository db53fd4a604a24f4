//! # Headless Sandbox
//!
//! A scripted scene without a window:
//! floor, a player capsule walking into a hinged door, and crates
//! dropped from above at seeded random positions.
//!
//! The player's contact callback never touches the door directly. It
//! posts a request on a channel and the next tick's gameplay drives the
//! hinge motor, opening the door while it is pushed and closing it once
//! the player stops touching it.
//!
//! Usage: `headless_sandbox [config.toml]`

use std::sync::Arc;

use crossbeam_channel::{Receiver, Sender};
use glam::{Quat, Vec3};
use ligament::core::SceneNodes;
use ligament::physics::{ConstraintDesc, ConstraintHandle, ConstraintKind, HingeDesc, MotorState};
use ligament::{
    attach_character_controller, attach_rigid_body, CharacterContact, CharacterControllerConfig,
    CollisionKind, EntityId, RigidBodyDesc, ShapeDesc, Simulation, SimulationConfig, SimulationResult,
    TickContext,
};
use parking_lot::Mutex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const SEED: u64 = 42;
const INITIAL_CRATES: usize = 5;
const SECONDS: u32 = 8;
const WALK_SECONDS: f64 = 3.0;

const WALK_SPEED: f32 = 4.0;
const PLAYER_GRAVITY: f32 = 20.0;
const DOOR_OPEN_SPEED: f32 = 6.0;
const DOOR_CLOSE_SPEED: f32 = 3.0;
const DOOR_CLOSED_ANGLE: f32 = 0.05;

const DOOR_WIDTH: f32 = 4.0;
const DOOR_HEIGHT: f32 = 6.0;
const DOOR_THICKNESS: f32 = 0.3;
const FRAME_HALF_WIDTH: f32 = 0.2;

/// Posted by the player's contact callback.
#[derive(Clone, Copy, Debug)]
struct DoorTouched;

/// Counters shared with the callbacks.
#[derive(Debug, Default)]
struct SandboxCounters {
    door_touches: u64,
    collisions_begun: u64,
}

struct Door {
    entity: EntityId,
    hinge: ConstraintHandle,
}

fn spawn_floor(sim: &mut Simulation) {
    let (entities, physics) = sim.parts_mut();
    let floor = entities.create_entity(Some("floor"));
    floor.set_position(Vec3::new(0.0, -0.5, 0.0));
    attach_rigid_body(floor, physics, &RigidBodyDesc::fixed(ShapeDesc::cuboid(Vec3::new(25.0, 0.5, 25.0))));
}

fn spawn_player(sim: &mut Simulation, config: &CharacterControllerConfig, door_tx: Sender<DoorTouched>, door: EntityId) -> Option<EntityId> {
    let (entities, physics) = sim.parts_mut();
    let player = entities.create_entity(Some("player"));
    player.set_position(Vec3::new(0.0, 2.0, 0.0));
    let id = player.id();

    let controller = attach_character_controller(player, physics, config)?;
    controller.set_contact_callback(move |contact: &CharacterContact| {
        if contact.hit == Some(door) {
            // Receiver outlives the simulation loop.
            let _ = door_tx.try_send(DoorTouched);
        }
    });
    Some(id)
}

fn spawn_door(sim: &mut Simulation, position: Vec3) -> Option<Door> {
    let (entities, physics) = sim.parts_mut();

    let frame = entities.create_entity(Some("door_frame"));
    frame.set_position(Vec3::new(position.x, DOOR_HEIGHT / 2.0, position.z));
    let frame_body = attach_rigid_body(
        frame,
        physics,
        &RigidBodyDesc::fixed(ShapeDesc::cuboid(Vec3::new(FRAME_HALF_WIDTH, DOOR_HEIGHT / 2.0, FRAME_HALF_WIDTH))),
    )?
    .handle();

    let door = entities.create_entity(Some("door"));
    door.set_position(Vec3::new(
        position.x + FRAME_HALF_WIDTH + DOOR_WIDTH / 2.0,
        DOOR_HEIGHT / 2.0,
        position.z,
    ));
    let door_entity = door.id();
    let shape = ShapeDesc {
        density: 4.0,
        ..ShapeDesc::cuboid(Vec3::new(DOOR_WIDTH / 2.0, DOOR_HEIGHT / 2.0, DOOR_THICKNESS / 2.0))
    };
    let door_body = attach_rigid_body(door, physics, &RigidBodyDesc::dynamic(shape))?.handle();

    let hinge = physics
        .create_constraint(
            frame_body,
            door_body,
            &ConstraintDesc {
                kind: ConstraintKind::Hinge(HingeDesc {
                    axis: Vec3::Y,
                    limits: Some([-std::f32::consts::PI * 0.6, std::f32::consts::PI * 0.6]),
                    max_friction_torque: 0.5,
                    ..HingeDesc::default()
                }),
                anchor_a: Vec3::new(FRAME_HALF_WIDTH, 0.0, 0.0),
                anchor_b: Vec3::new(-DOOR_WIDTH / 2.0, 0.0, 0.0),
            },
        )
        .map_err(|error| tracing::warn!(%error, "door hinge rejected"))
        .ok()?;

    Some(Door {
        entity: door_entity,
        hinge,
    })
}

fn spawn_crate(sim: &mut Simulation, rng: &mut ChaCha8Rng, index: usize) {
    let name = format!("crate_{index}");
    let position = Vec3::new(
        rng.gen_range(-10.0..10.0),
        rng.gen_range(15.0..20.0),
        rng.gen_range(-10.0..10.0),
    );
    let half = rng.gen_range(0.5..1.5);

    let (entities, physics) = sim.parts_mut();
    let entity = entities.create_entity(Some(&name));
    entity.set_position(position);
    entity.set_rotation(Quat::from_rotation_y(rng.gen_range(0.0..std::f32::consts::TAU)));
    let shape = ShapeDesc {
        density: 50.0,
        ..ShapeDesc::cuboid(Vec3::splat(half))
    };
    if attach_rigid_body(entity, physics, &RigidBodyDesc::dynamic(shape)).is_some() {
        println!("  spawned {name} at ({:.1}, {:.1}, {:.1})", position.x, position.y, position.z);
    }
}

/// Per-tick gameplay of the sandbox.
struct SandboxGameplay {
    player: EntityId,
    door: Door,
    door_rx: Receiver<DoorTouched>,
    counters: Arc<Mutex<SandboxCounters>>,
}

impl SandboxGameplay {
    fn drive_door(&mut self, ctx: &mut TickContext<'_>) {
        let touched = self.door_rx.try_iter().count() > 0;
        if touched {
            self.counters.lock().door_touches += 1;
        }

        let physics = &*ctx.physics;
        if touched {
            let direction = ctx
                .entities
                .get(self.player)
                .and_then(|player| player.character())
                .map_or(1.0, |character| character.velocity().x.signum());
            physics.set_motor_state(self.door.hinge, MotorState::Velocity);
            physics.set_motor_target_velocity(self.door.hinge, -direction * DOOR_OPEN_SPEED);
        } else {
            let angle = physics.constraint_position(self.door.hinge).unwrap_or(0.0);
            if angle.abs() > DOOR_CLOSED_ANGLE {
                physics.set_motor_state(self.door.hinge, MotorState::Velocity);
                physics.set_motor_target_velocity(self.door.hinge, -angle.signum() * DOOR_CLOSE_SPEED);
            } else {
                physics.set_motor_state(self.door.hinge, MotorState::Position);
                physics.set_motor_target_position(self.door.hinge, 0.0);
            }
        }

        if let Some(door) = ctx.entities.get(self.door.entity).and_then(|door| door.rigid_body()) {
            door.activate();
        }
    }

    fn drive_player(&self, ctx: &mut TickContext<'_>) {
        let walking = ctx.time < WALK_SECONDS;
        let dt = ctx.dt as f32;
        let Some(character) = ctx.entities.get_mut(self.player).and_then(|player| player.character_mut()) else {
            return;
        };

        let mut velocity = character.velocity();
        velocity.x = if walking { WALK_SPEED } else { 0.0 };
        velocity.z = 0.0;
        velocity.y -= PLAYER_GRAVITY * dt;
        if character.is_grounded() && velocity.y < 0.0 {
            velocity.y = 0.0;
        }
        character.set_velocity(velocity);
    }
}

impl ligament::Gameplay for SandboxGameplay {
    fn update(&mut self, ctx: &mut TickContext<'_>) {
        self.drive_door(ctx);
        self.drive_player(ctx);
    }
}

fn run() -> SimulationResult<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => SimulationConfig::from_file(path)?,
        None => SimulationConfig::default(),
    };
    let player_config = CharacterControllerConfig {
        max_strength: 200.0,
        ..config.character
    };

    let mut sim = Simulation::new(config)?;
    let counters = Arc::new(Mutex::new(SandboxCounters::default()));
    {
        let counters = Arc::clone(&counters);
        sim.physics_mut().set_collision_callback(move |event| {
            if event.kind == CollisionKind::Begin {
                counters.lock().collisions_begun += 1;
            }
        });
    }

    spawn_floor(&mut sim);
    let Some(door) = spawn_door(&mut sim, Vec3::new(5.0, 0.0, 0.0)) else {
        println!("door could not be built");
        return Ok(());
    };
    let (door_tx, door_rx) = crossbeam_channel::bounded(64);
    let Some(player) = spawn_player(&mut sim, &player_config, door_tx, door.entity) else {
        println!("player could not be built");
        return Ok(());
    };

    let mut rng = ChaCha8Rng::seed_from_u64(SEED);
    for index in 0..INITIAL_CRATES {
        spawn_crate(&mut sim, &mut rng, index);
    }
    sim.physics().optimize_broad_phase();

    let mut nodes = SceneNodes::new(sim.entities().len());
    for entity in sim.entities_mut().iter_mut() {
        entity.set_node(nodes.create_node());
    }

    let mut gameplay = SandboxGameplay {
        player,
        door,
        door_rx,
        counters: Arc::clone(&counters),
    };

    let dt = sim.fixed_timestep();
    let ticks = (f64::from(SECONDS) / dt).round() as u64;
    for _ in 0..ticks {
        sim.advance(dt, &mut gameplay, &mut nodes);
    }

    println!();
    sim.stats().print_summary();
    println!();

    let door_angle = sim.physics().constraint_position(gameplay.door.hinge).unwrap_or(0.0);
    let counters = counters.lock();
    println!("┌─ SCENE ──────────────────────────────────────────────────────────┐");
    println!("│ Simulated:          {:.2} s ({} ticks)", sim.time(), sim.tick_count());
    println!("│ Entities:           {}", sim.entities().len());
    println!("│ Bodies:             {}", sim.physics().body_count());
    println!("│ Door touches:       {}", counters.door_touches);
    println!("│ Door angle:         {door_angle:.3} rad");
    println!("│ Collisions begun:   {}", counters.collisions_begun);
    println!("│ Matrix writes:      {}", nodes.write_count());
    if let Some(player) = sim.entities().get(gameplay.player) {
        let position = player.position();
        let ground = player.character().map(|c| c.ground_state());
        println!("│ Player:             ({:.2}, {:.2}, {:.2}) {ground:?}", position.x, position.y, position.z);
        if let Some(hit) = sim.physics().raycast(position, Vec3::NEG_Y, 50.0) {
            let below = hit
                .entity
                .and_then(|id| sim.entities().get(id))
                .map_or("unknown", |entity| entity.name());
            println!("│ Below player:       {below} at {:.2}", hit.distance);
        }
    }
    println!("└──────────────────────────────────────────────────────────────────┘");
    Ok(())
}

fn main() {
    println!("╔══════════════════════════════════════════════════════════════════╗");
    println!("║                    LIGAMENT HEADLESS SANDBOX                     ║");
    println!("╠══════════════════════════════════════════════════════════════════╣");
    println!("║  Floor, player capsule, motorised door, falling crates           ║");
    println!("╚══════════════════════════════════════════════════════════════════╝");
    println!();

    if let Err(error) = run() {
        eprintln!("sandbox failed: {error}");
        std::process::exit(1);
    }
}
