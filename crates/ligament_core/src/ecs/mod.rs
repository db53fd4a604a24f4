//! # Entity Identity & Component Kinds
//!
//! The pieces of the entity model every crate needs to agree on.
//!
//! ## Design Philosophy
//!
//! - Entity IDs are assigned monotonically and never reused
//! - The set of component kinds is closed, so a bitmask covers all of them
//! - Payloads live in the entity layer; only the tags live here

mod component;
mod entity;

pub use component::{ComponentKind, ComponentMask};
pub use entity::EntityId;
