//! # Components
//!
//! The payload an entity slot holds. Each variant maps to exactly one
//! [`ComponentKind`], so the slot index is derived from the payload and a
//! mismatched kind tag cannot be expressed.
//!
//! A component may carry a custom destructor. It receives the payload by
//! value when the component is destroyed (replaced, removed, or dropped
//! with its entity) and runs exactly once.

use std::any::Any;
use std::fmt;

use ligament_core::{ComponentKind, NodeHandle};

use crate::character::CharacterController;
use crate::rigid_body::RigidBody;

/// Opaque payload for kinds the entity layer does not interpret.
pub type OpaquePayload = Box<dyn Any + Send>;

/// Custom destructor run on the payload when a component is destroyed.
pub type Destructor = Box<dyn FnOnce(ComponentData) + Send>;

/// Payload of one component slot.
pub enum ComponentData {
    /// Link to a visual node.
    MeshLink(NodeHandle),
    /// Physics body.
    RigidBody(RigidBody),
    /// Virtual character.
    Character(CharacterController),
    /// Animation state, owned by the animation system.
    Animator(OpaquePayload),
    /// Audio emitter, owned by the audio system.
    AudioSource(OpaquePayload),
}

impl ComponentData {
    /// Kind tag, and therefore slot, of this payload.
    #[must_use]
    pub const fn kind(&self) -> ComponentKind {
        match self {
            Self::MeshLink(_) => ComponentKind::MeshLink,
            Self::RigidBody(_) => ComponentKind::RigidBody,
            Self::Character(_) => ComponentKind::Character,
            Self::Animator(_) => ComponentKind::Animator,
            Self::AudioSource(_) => ComponentKind::AudioSource,
        }
    }
}

impl fmt::Debug for ComponentData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MeshLink(node) => f.debug_tuple("MeshLink").field(node).finish(),
            Self::RigidBody(body) => f.debug_tuple("RigidBody").field(body).finish(),
            Self::Character(character) => f.debug_tuple("Character").field(character).finish(),
            Self::Animator(_) => f.write_str("Animator(..)"),
            Self::AudioSource(_) => f.write_str("AudioSource(..)"),
        }
    }
}

/// A payload plus its optional destructor.
pub struct Component {
    // Only `None` while the component is being destroyed.
    data: Option<ComponentData>,
    destructor: Option<Destructor>,
}

impl Component {
    /// Wraps a payload with no custom destructor.
    #[must_use]
    pub const fn new(data: ComponentData) -> Self {
        Self {
            data: Some(data),
            destructor: None,
        }
    }

    /// Kind of the payload.
    #[must_use]
    pub fn kind(&self) -> Option<ComponentKind> {
        self.data.as_ref().map(ComponentData::kind)
    }

    /// The payload.
    #[must_use]
    pub const fn data(&self) -> Option<&ComponentData> {
        self.data.as_ref()
    }

    /// The payload, mutably.
    pub fn data_mut(&mut self) -> Option<&mut ComponentData> {
        self.data.as_mut()
    }

    /// Installs a destructor, replacing any previous one.
    pub fn set_destructor(&mut self, destructor: impl FnOnce(ComponentData) + Send + 'static) {
        self.destructor = Some(Box::new(destructor));
    }

    /// Checks if a custom destructor is installed.
    #[must_use]
    pub const fn has_destructor(&self) -> bool {
        self.destructor.is_some()
    }
}

impl Drop for Component {
    fn drop(&mut self) {
        if let (Some(data), Some(destructor)) = (self.data.take(), self.destructor.take()) {
            destructor(data);
        }
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("data", &self.data)
            .field("has_destructor", &self.destructor.is_some())
            .finish()
    }
}
