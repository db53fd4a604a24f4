//! # LIGAMENT Core
//!
//! Leaf types shared by the physics bridge and the entity layer:
//! - Entity identifiers (monotonic, never reused)
//! - The fixed component kind registry and its bitmask
//! - Transforms and the 4x4 matrix handed to visual nodes
//! - Scratch and pool allocators
//!
//! ## Architecture Rules
//!
//! 1. **No hidden globals** - every context is passed explicitly
//! 2. **Handles carry generations** - stale handles are detected, never aliased
//! 3. **Plain data at the seams** - matrices go out as bytes, ids go in as integers
//!
//! ## Example
//!
//! ```rust
//! use ligament_core::{ComponentKind, ComponentMask, Transform};
//!
//! let mask = ComponentMask::EMPTY.with(ComponentKind::RigidBody);
//! assert!(mask.contains(ComponentKind::RigidBody));
//! assert_eq!(Transform::IDENTITY.matrix(), glam::Mat4::IDENTITY);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod ecs;
pub mod memory;
pub mod scene;
pub mod transform;

pub use ecs::{ComponentKind, ComponentMask, EntityId};
pub use memory::{PoolAllocator, PoolHandle, ScratchArena};
pub use scene::{NodeHandle, SceneNodes, VisualSink};
pub use transform::Transform;

/// Re-exported math types used across the public API.
pub use glam::{Mat4, Quat, Vec3};
