//! # Entities & Components
//!
//! Entities own one slot per component kind. The manager owns the
//! entities. Components own their payloads, and dropping a component
//! releases whatever physics handle the payload holds.
//!
//! ## Design Philosophy
//!
//! - Component payloads are a closed sum type; the slot follows the variant
//! - Invalid requests are silent: lookups return `None`, removals `false`
//! - No entity operation reaches into another entity

mod component;
mod entity;
mod manager;

pub use component::{Component, ComponentData, Destructor, OpaquePayload};
pub use entity::{Entity, MAX_NAME_LEN};
pub use manager::{EntityManager, INITIAL_CAPACITY};
