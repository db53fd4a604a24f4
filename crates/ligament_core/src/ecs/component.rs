//! # Component Kinds
//!
//! The closed set of component kinds an entity can carry, and the bitmask
//! that records which of them are present.

use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Kind tag for every component an entity can carry.
///
/// Each kind owns exactly one slot in an entity's component array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum ComponentKind {
    /// Link to a visual node in the external scene graph.
    MeshLink = 0,
    /// Rigid body wrapping one physics-engine body.
    RigidBody = 1,
    /// Virtual character controller.
    Character = 2,
    /// Skeletal animation state.
    Animator = 3,
    /// Positional audio emitter.
    AudioSource = 4,
}

impl ComponentKind {
    /// Number of component kinds (and of slots per entity).
    pub const COUNT: usize = 5;

    /// All kinds in slot order.
    pub const ALL: [Self; Self::COUNT] = [
        Self::MeshLink,
        Self::RigidBody,
        Self::Character,
        Self::Animator,
        Self::AudioSource,
    ];

    /// Slot index for this kind.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Bit for this kind inside a [`ComponentMask`].
    #[inline]
    #[must_use]
    pub const fn bit(self) -> u32 {
        1 << (self as u32)
    }

    /// Looks a kind up by slot index.
    #[inline]
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        if index < Self::COUNT {
            Some(Self::ALL[index])
        } else {
            None
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::MeshLink => "mesh_link",
            Self::RigidBody => "rigid_body",
            Self::Character => "character",
            Self::Animator => "animator",
            Self::AudioSource => "audio_source",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Bitmask of present component kinds.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ComponentMask(u32);

impl ComponentMask {
    /// No components.
    pub const EMPTY: Self = Self(0);

    /// Mask containing exactly one kind.
    #[inline]
    #[must_use]
    pub const fn of(kind: ComponentKind) -> Self {
        Self(kind.bit())
    }

    /// Returns this mask with `kind` added.
    #[inline]
    #[must_use]
    pub const fn with(self, kind: ComponentKind) -> Self {
        Self(self.0 | kind.bit())
    }

    /// Raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Checks if `kind` is present.
    #[inline]
    #[must_use]
    pub const fn contains(self, kind: ComponentKind) -> bool {
        self.0 & kind.bit() != 0
    }

    /// Checks if every kind in `required` is present.
    #[inline]
    #[must_use]
    pub const fn is_superset_of(self, required: Self) -> bool {
        self.0 & required.0 == required.0
    }

    /// Checks if no kind is present.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of kinds present.
    #[inline]
    #[must_use]
    pub const fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Sets the bit for `kind`.
    #[inline]
    pub fn insert(&mut self, kind: ComponentKind) {
        self.0 |= kind.bit();
    }

    /// Clears the bit for `kind`.
    #[inline]
    pub fn remove(&mut self, kind: ComponentKind) {
        self.0 &= !kind.bit();
    }

    /// Iterates over the kinds present, in slot order.
    pub fn iter(self) -> impl Iterator<Item = ComponentKind> {
        ComponentKind::ALL
            .into_iter()
            .filter(move |kind| self.contains(*kind))
    }
}

impl From<ComponentKind> for ComponentMask {
    fn from(kind: ComponentKind) -> Self {
        Self::of(kind)
    }
}

impl BitOr for ComponentMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOr<ComponentKind> for ComponentMask {
    type Output = Self;

    fn bitor(self, rhs: ComponentKind) -> Self {
        self.with(rhs)
    }
}

impl BitOrAssign<ComponentKind> for ComponentMask {
    fn bitor_assign(&mut self, rhs: ComponentKind) {
        self.insert(rhs);
    }
}

impl BitAnd for ComponentMask {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}
