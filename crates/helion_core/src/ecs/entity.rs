//! # Entity Identity
//!
//! Entities are opaque integer handles with no payload. A scene-level free
//! list recycles ids; a recycled id carries no memory of its previous
//! component data, so nothing here tracks generations.

use bytemuck::{Pod, Zeroable};

/// Opaque identifier for an entity.
///
/// Identity only: every relation (parent/child, handle -> resource) is
/// resolved by id lookup, never by owning pointer.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Pod, Zeroable)]
pub struct Entity(pub(crate) u32);

impl Entity {
    /// Sentinel meaning "invalid / no entity".
    pub const INVALID: Self = Self(u32::MAX);

    /// Creates an entity handle from a raw id.
    ///
    /// Intended for tests and tooling; live handles come from
    /// [`Scene::create`](crate::Scene::create).
    #[inline]
    #[must_use]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u32 {
        self.0
    }

    /// Checks if this handle is the invalid sentinel.
    #[inline]
    #[must_use]
    pub const fn is_invalid(self) -> bool {
        self.0 == u32::MAX
    }

    /// Index form of the id, for table lookups.
    #[inline]
    #[must_use]
    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl Default for Entity {
    fn default() -> Self {
        Self::INVALID
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_invalid() {
            write!(f, "entity(invalid)")
        } else {
            write!(f, "entity({})", self.0)
        }
    }
}

/// Per-entity bitset recording which component types are currently attached.
///
/// Bit `i` is set iff the entity has a live value in the store that the
/// registry assigned bit `i`. The all-ones pattern is the removed/recycled
/// sentinel, which is why registration stops at [`MAX_COMPONENT_TYPES`].
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct ComponentMask(u64);

/// Maximum number of registrable component types.
///
/// One below the mask width so a live mask can never equal
/// [`ComponentMask::INVALID`].
pub const MAX_COMPONENT_TYPES: usize = 63;

impl ComponentMask {
    /// Mask with no bits set: a live entity with no components.
    pub const EMPTY: Self = Self(0);

    /// Sentinel for a removed (recycle-pending) entity.
    ///
    /// Distinct from "never created", which is an index past the end of the
    /// scene's mask array.
    pub const INVALID: Self = Self(u64::MAX);

    /// Mask with exactly `bit` set.
    #[inline]
    #[must_use]
    pub(crate) const fn single(bit: u8) -> Self {
        Self(1 << bit)
    }

    /// Checks whether every bit of `other` is set in `self`.
    #[inline]
    #[must_use]
    pub const fn contains_all(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Checks whether any bit of `other` is set in `self`.
    #[inline]
    #[must_use]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Checks if this mask is the removed sentinel.
    #[inline]
    #[must_use]
    pub const fn is_invalid(self) -> bool {
        self.0 == u64::MAX
    }

    /// Union of two masks.
    #[inline]
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Sets every bit of `other`.
    #[inline]
    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    /// Clears every bit of `other`.
    #[inline]
    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Iterates the indices of the set bits, lowest first.
    #[inline]
    pub fn bits(self) -> impl Iterator<Item = u8> {
        let mut word = self.0;
        std::iter::from_fn(move || {
            if word == 0 {
                return None;
            }
            let bit = word.trailing_zeros() as u8;
            word &= word - 1;
            Some(bit)
        })
    }
}

impl Default for ComponentMask {
    fn default() -> Self {
        Self::EMPTY
    }
}

/// Per-entity tag word, matched by the view's optional tag filter.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Tag(pub u32);

impl Tag {
    /// The default tag carried by every freshly created entity.
    pub const NONE: Self = Self(0);
}
