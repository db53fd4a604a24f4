//! # LIGAMENT
//!
//! Game objects on top of a rigid-body physics engine.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                           SIMULATION                              │
//! ├───────────────────────────────────────────────────────────────────┤
//! │                                                                   │
//! │  ┌───────────────┐   sync in    ┌───────────────────────────┐     │
//! │  │ EntityManager │ ───────────> │ PhysicsWorld              │     │
//! │  │               │              │                           │     │
//! │  │ • Entity      │   sync out   │ • bodies and constraints  │     │
//! │  │ • RigidBody   │ <─────────── │ • virtual characters      │     │
//! │  │ • Character   │              │ • raycasts and events     │     │
//! │  └───────┬───────┘              └───────────────────────────┘     │
//! │          │ matrices                                               │
//! │          v                                                        │
//! │  ┌───────────────┐                                                │
//! │  │  VisualSink   │                                                │
//! │  └───────────────┘                                                │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Architecture Rules
//!
//! 1. **Direction by motion type** - kinematic in, dynamic out, static never
//! 2. **Release once** - every physics handle is freed exactly once, in drop
//! 3. **No globals** - the world is reached through the component's link
//! 4. **Silent at runtime** - component operations on a dead body are no-ops
//!
//! ## Example
//!
//! ```rust,no_run
//! use ligament::{attach_rigid_body, NoGameplay, RigidBodyDesc, ShapeDesc, Simulation, SimulationConfig};
//! use ligament::core::SceneNodes;
//! use glam::Vec3;
//!
//! let mut sim = Simulation::new(SimulationConfig::default())?;
//! let (entities, physics) = sim.parts_mut();
//! let crate_box = entities.create_entity(Some("crate"));
//! crate_box.set_position(Vec3::new(0.0, 5.0, 0.0));
//! attach_rigid_body(crate_box, physics, &RigidBodyDesc::dynamic(ShapeDesc::cuboid(Vec3::splat(0.5))));
//!
//! let mut nodes = SceneNodes::new(16);
//! sim.advance(1.0 / 60.0, &mut NoGameplay, &mut nodes);
//! # Ok::<(), ligament::SimulationError>(())
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod character;
pub mod config;
pub mod ecs;
pub mod error;
pub mod rigid_body;
pub mod simulation;
pub mod sync;

pub use ligament_core as core;
pub use ligament_physics as physics;

pub use character::{
    attach_character_controller, push_impulse, remove_character_controller, CharacterContact,
    CharacterContactCallback, CharacterController, ContactStage, GroundState,
};
pub use config::{CharacterControllerConfig, SimulationConfig};
pub use ecs::{Component, ComponentData, Entity, EntityManager};
pub use error::{SimulationError, SimulationResult};
pub use rigid_body::{attach_rigid_body, remove_rigid_body, RigidBody, RigidBodyDesc};
pub use simulation::{
    FixedTimestep, FrameStats, FrameStatsAccumulator, Gameplay, NoGameplay, Simulation, TickContext,
};
pub use sync::{
    sync_character_controllers_to_entities, sync_entities_to_physics, sync_entity_transforms,
    sync_physics_to_entities, update_all_character_controllers,
};

pub use ligament_core::{ComponentKind, ComponentMask, EntityId, Transform};
pub use ligament_physics::{
    BodyMaterial, CollisionEvent, CollisionKind, MotionType, ObjectLayer, PhysicsWorld, RaycastHit,
    ShapeDesc, WorldLink,
};
