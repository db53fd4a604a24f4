//! # LIGAMENT Physics
//!
//! The rigid-body engine as seen by the entity layer: world creation and
//! stepping, bodies, shapes, constraints, raycasts, collision events and
//! the virtual character.
//!
//! ## Architecture Rules
//!
//! 1. **All-or-nothing construction** - a world either builds completely or not at all
//! 2. **One mutation path** - every body operation goes through [`PhysicsSystem`]
//! 3. **Weak links** - components reach the world through [`WorldLink`]
//! 4. **Callbacks run unlocked** - user code never runs under the world lock
//!
//! ## Example
//!
//! ```rust,no_run
//! use ligament_physics::{BodyDesc, MotionType, ObjectLayer, PhysicsConfig, PhysicsWorld, Shape, ShapeDesc};
//! use glam::{Quat, Vec3};
//!
//! let mut world = PhysicsWorld::new(&PhysicsConfig::default())?;
//! let floor = Shape::from_desc(&ShapeDesc::cuboid(Vec3::new(25.0, 0.5, 25.0)))?;
//! let desc = BodyDesc::new(floor, MotionType::Static, ObjectLayer::Static)
//!     .at(Vec3::new(0.0, -0.5, 0.0), Quat::IDENTITY);
//! world.lock().create_body(&desc)?;
//! world.optimize_broad_phase();
//! world.step(1.0 / 60.0, 1);
//! # Ok::<(), ligament_physics::PhysicsError>(())
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod body;
pub mod character;
pub mod config;
pub mod constraint;
mod convert;
pub mod error;
pub mod events;
pub mod layers;
pub mod query;
pub mod shape;
pub mod system;
pub mod world;

pub use body::{BodyDesc, BodyHandle, BodyMaterial, MotionType};
pub use character::{
    CharacterContactListener, CharacterSettings, CharacterVirtual, ContactBody, ContactEvent,
    ContactResponse, ExtendedUpdateSettings, GroundInfo, SupportState,
};
pub use config::PhysicsConfig;
pub use constraint::{
    ConstraintDesc, ConstraintHandle, ConstraintKind, HingeDesc, MotorState, SliderDesc, DEFAULT_MOTOR_VELOCITY_GAIN,
};
pub use error::{PhysicsError, PhysicsResult};
pub use events::{CollisionCallback, CollisionEvent, CollisionKind};
pub use layers::{LayerFilter, LayerMask, ObjectLayer};
pub use query::RaycastHit;
pub use shape::{Shape, ShapeDesc, ShapeKind};
pub use system::PhysicsSystem;
pub use world::{PhysicsWorld, WorldLink};
