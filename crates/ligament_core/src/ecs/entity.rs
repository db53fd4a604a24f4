//! # Entity Identifiers
//!
//! Entities are identified by a plain counter handed out by the manager.
//! The value 0 is reserved as the null id.

use std::fmt;

/// Unique identifier for an entity.
///
/// IDs start at 1 and increase monotonically for the lifetime of the
/// manager that issued them. They are never recycled, so an id that no
/// longer resolves always means "destroyed", never "someone else".
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(transparent)]
pub struct EntityId(u32);

impl EntityId {
    /// Null/invalid entity ID.
    pub const NULL: Self = Self(0);

    /// First id handed out by a fresh manager.
    pub const FIRST: Self = Self(1);

    /// Creates an entity ID from its raw value.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw numeric value.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Checks if this entity ID is null/invalid.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Returns the id that follows this one.
    ///
    /// # Returns
    ///
    /// `None` once the id space is used up.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }

    /// Encodes the id as physics-engine user data.
    #[inline]
    #[must_use]
    pub const fn to_user_data(self) -> u128 {
        self.0 as u128
    }

    /// Decodes an id stored as physics-engine user data.
    ///
    /// # Returns
    ///
    /// `None` for the null id or for values that never came from an entity.
    #[inline]
    #[must_use]
    pub fn from_user_data(data: u128) -> Option<Self> {
        match u32::try_from(data) {
            Ok(0) | Err(_) => None,
            Ok(raw) => Some(Self(raw)),
        }
    }
}

impl Default for EntityId {
    fn default() -> Self {
        Self::NULL
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
