//! # Collision Layers
//!
//! Four object layers and the pair filter between them:
//! - static never collides with static
//! - trigger never collides with trigger
//! - every other pair collides
//!
//! Each layer maps onto one engine collision group. A collider is a member
//! of its layer's group and filters on every layer it may touch.

use rapier3d::geometry::{Group, InteractionGroups};
use serde::{Deserialize, Serialize};

/// Object layer of a body.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ObjectLayer {
    /// Level geometry that never moves.
    Static = 0,
    /// Freely moving simulated objects.
    Dynamic = 1,
    /// Externally driven bodies.
    Kinematic = 2,
    /// Sensors and trigger volumes.
    Trigger = 3,
}

impl ObjectLayer {
    /// Number of object layers.
    pub const COUNT: usize = 4;

    /// All layers in index order.
    pub const ALL: [Self; Self::COUNT] = [Self::Static, Self::Dynamic, Self::Kinematic, Self::Trigger];

    /// Layer index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> u32 {
        self as u32
    }

    /// Recovers a layer from its index.
    #[inline]
    #[must_use]
    pub const fn from_index(index: u32) -> Option<Self> {
        match index {
            0 => Some(Self::Static),
            1 => Some(Self::Dynamic),
            2 => Some(Self::Kinematic),
            3 => Some(Self::Trigger),
            _ => None,
        }
    }

    /// Name used in logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Static => "static",
            Self::Dynamic => "dynamic",
            Self::Kinematic => "kinematic",
            Self::Trigger => "trigger",
        }
    }
}

/// Bit set of object layers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(transparent)]
pub struct LayerMask(u32);

impl LayerMask {
    /// No layer.
    pub const NONE: Self = Self(0);
    /// Every layer.
    pub const ALL: Self = Self((1 << ObjectLayer::COUNT) - 1);

    /// Mask with a single layer.
    #[inline]
    #[must_use]
    pub const fn of(layer: ObjectLayer) -> Self {
        Self(1 << layer.index())
    }

    /// Mask from raw bits. Bits above the last layer are dropped.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Returns this mask with `layer` added.
    #[inline]
    #[must_use]
    pub const fn with(self, layer: ObjectLayer) -> Self {
        Self(self.0 | (1 << layer.index()))
    }

    /// Checks if `layer` is in the mask.
    #[inline]
    #[must_use]
    pub const fn contains(self, layer: ObjectLayer) -> bool {
        self.0 & (1 << layer.index()) != 0
    }

    /// Raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }
}

/// Broad-phase layer table and pair filter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LayerFilter {
    /// Layers each layer may collide with.
    collides_with: [LayerMask; ObjectLayer::COUNT],
}

impl LayerFilter {
    /// Builds the table from the pair rules.
    #[must_use]
    pub fn new() -> Self {
        let mut collides_with = [LayerMask::NONE; ObjectLayer::COUNT];
        for a in ObjectLayer::ALL {
            for b in ObjectLayer::ALL {
                if Self::should_collide(a, b) {
                    collides_with[a.index() as usize] = collides_with[a.index() as usize].with(b);
                }
            }
        }
        Self { collides_with }
    }

    /// The pair rule.
    #[inline]
    #[must_use]
    pub const fn should_collide(a: ObjectLayer, b: ObjectLayer) -> bool {
        !matches!(
            (a, b),
            (ObjectLayer::Static, ObjectLayer::Static) | (ObjectLayer::Trigger, ObjectLayer::Trigger)
        )
    }

    /// Layers `layer` may collide with.
    #[inline]
    #[must_use]
    pub const fn mask_for(&self, layer: ObjectLayer) -> LayerMask {
        self.collides_with[layer.index() as usize]
    }

    /// Engine collision groups for a collider on `layer`.
    #[must_use]
    pub fn groups_for(&self, layer: ObjectLayer) -> InteractionGroups {
        InteractionGroups::new(
            Group::from_bits_truncate(LayerMask::of(layer).bits()),
            Group::from_bits_truncate(self.mask_for(layer).bits()),
        )
    }
}

impl Default for LayerFilter {
    fn default() -> Self {
        Self::new()
    }
}
