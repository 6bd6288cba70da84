//! # Views
//!
//! Borrowed iteration over scene data. [`SubtreeView`] walks a contiguous
//! pre-order slice of the hierarchy; [`ComponentView`] walks the entities
//! holding a requested combination of component types, yielding references
//! into the dense stores.
//!
//! The component view is the one place this crate uses `unsafe`: a query for
//! `(&mut A, &B)` needs live references into two stores at once, which the
//! borrow checker cannot see through the type-erased registry. Soundness
//! rests on two facts checked at view construction: the requested component
//! types are pairwise distinct (so no two pointers alias), and the view holds
//! the registry's `&mut` borrow for its whole lifetime (so nothing else can
//! touch the stores while references into them are live). Within one store,
//! each entity is fetched at most once because the lead store's dense entity
//! list contains no duplicates.
#![allow(unsafe_code)]

use std::any::TypeId;
use std::marker::PhantomData;

use crate::ecs::component::Component;
use crate::ecs::entity::{ComponentMask, Entity, Tag};
use crate::ecs::registry::SparseSetMap;
use crate::ecs::sparse::SparseSet;

// ============================================================================
// Subtree views
// ============================================================================

/// A borrowed pre-order view of one subtree.
///
/// Produced by the hierarchy index. For a tracked entity this is a contiguous
/// slice of the dense arrays with the root first; an untracked entity views
/// itself alone. The view borrows the hierarchy, so no structural edit can
/// happen while it is alive.
#[derive(Debug, Clone, Copy)]
pub struct SubtreeView<'a> {
    kind: SubtreeKind<'a>,
}

#[derive(Debug, Clone, Copy)]
enum SubtreeKind<'a> {
    Slice(&'a [Entity]),
    Single(Entity),
}

impl<'a> SubtreeView<'a> {
    pub(crate) fn over(entities: &'a [Entity]) -> Self {
        debug_assert!(!entities.is_empty());
        Self {
            kind: SubtreeKind::Slice(entities),
        }
    }

    pub(crate) fn single(entity: Entity) -> Self {
        Self {
            kind: SubtreeKind::Single(entity),
        }
    }

    /// The subtree root. Always the first entity yielded.
    #[must_use]
    pub fn root(&self) -> Entity {
        match self.kind {
            SubtreeKind::Slice(s) => s[0],
            SubtreeKind::Single(e) => e,
        }
    }

    /// Number of entities in the subtree, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        match self.kind {
            SubtreeKind::Slice(s) => s.len(),
            SubtreeKind::Single(_) => 1,
        }
    }

    /// A subtree always contains at least its root.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Iterates the subtree in pre-order, root first.
    #[must_use]
    pub fn iter(&self) -> SubtreeIter<'a> {
        match self.kind {
            SubtreeKind::Slice(s) => SubtreeIter {
                entities: s.iter(),
                single: None,
            },
            SubtreeKind::Single(e) => SubtreeIter {
                entities: (&[] as &[Entity]).iter(),
                single: Some(e),
            },
        }
    }
}

impl<'a> IntoIterator for &SubtreeView<'a> {
    type Item = Entity;
    type IntoIter = SubtreeIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a> IntoIterator for SubtreeView<'a> {
    type Item = Entity;
    type IntoIter = SubtreeIter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over a [`SubtreeView`].
#[derive(Debug)]
pub struct SubtreeIter<'a> {
    entities: std::slice::Iter<'a, Entity>,
    single: Option<Entity>,
}

impl Iterator for SubtreeIter<'_> {
    type Item = Entity;

    #[inline]
    fn next(&mut self) -> Option<Entity> {
        if let Some(entity) = self.single.take() {
            return Some(entity);
        }
        self.entities.next().copied()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let n = self.entities.len() + usize::from(self.single.is_some());
        (n, Some(n))
    }
}

impl ExactSizeIterator for SubtreeIter<'_> {}

// ============================================================================
// Component fetches
// ============================================================================

/// One element of a component query: a shared or exclusive reference to a
/// component type.
///
/// # Safety
///
/// `fetch` dereferences a raw store pointer handed out by [`Query::ptrs`].
/// Implementations must not retain the pointer beyond the returned reference.
pub unsafe trait Fetch<'w>: Sized {
    /// The component type this fetch resolves.
    type Component: Component;

    /// Resolves the fetch for `entity`.
    ///
    /// # Safety
    ///
    /// `store` must be valid for `'w`, `entity` must be present in it, and
    /// for exclusive fetches no other reference to the same slot may exist.
    unsafe fn fetch(store: *mut SparseSet<Self::Component>, entity: Entity) -> Self;
}

// SAFETY: resolves to a shared reference; aliasing shared reads are fine.
unsafe impl<'w, T: Component> Fetch<'w> for &'w T {
    type Component = T;

    #[inline]
    unsafe fn fetch(store: *mut SparseSet<T>, entity: Entity) -> Self {
        // SAFETY: caller guarantees the store outlives 'w and holds `entity`.
        unsafe { &*store }.get(entity)
    }
}

// SAFETY: the view yields each (store, entity) pair at most once, so this
// exclusive reference never aliases another fetch from the same view.
unsafe impl<'w, T: Component> Fetch<'w> for &'w mut T {
    type Component = T;

    #[inline]
    unsafe fn fetch(store: *mut SparseSet<T>, entity: Entity) -> Self {
        // SAFETY: caller guarantees validity, presence, and exclusivity.
        unsafe { &mut *store }.get_mut(entity)
    }
}

/// A tuple of [`Fetch`] elements forming one component query.
///
/// Implemented for tuples of one to four fetches. The first element is the
/// *lead*: iteration walks the lead store's dense array and the view yields
/// matches in that store's dense order.
///
/// # Safety
///
/// `ptrs` must return pointers that stay valid while the borrow of the
/// registry it was given lives, and `conjunction` must cover every component
/// type the tuple fetches.
pub unsafe trait Query<'w>: Sized {
    /// Raw pointers to every participating store, lead first.
    type Ptrs: Copy;

    /// Mask with one bit per requested component type.
    fn conjunction(registry: &SparseSetMap) -> ComponentMask;

    /// Captures store pointers. Panics if the tuple requests the same type
    /// twice or requests the hierarchy type.
    fn ptrs(registry: &mut SparseSetMap) -> Self::Ptrs;

    /// Dense length of the lead store.
    ///
    /// # Safety
    ///
    /// The pointers must still be valid.
    unsafe fn lead_len(ptrs: &Self::Ptrs) -> usize;

    /// Entity at `dense` in the lead store.
    ///
    /// # Safety
    ///
    /// The pointers must still be valid and `dense` in bounds.
    unsafe fn lead_entity(ptrs: &Self::Ptrs, dense: usize) -> Entity;

    /// Resolves every fetch in the tuple for `entity`.
    ///
    /// # Safety
    ///
    /// The pointers must still be valid, `entity` must hold every requested
    /// component, and `(store, entity)` must not have been fetched before by
    /// the same view.
    unsafe fn fetch(ptrs: &Self::Ptrs, entity: Entity) -> Self;
}

fn assert_distinct(ids: &[TypeId]) {
    for i in 0..ids.len() {
        for j in i + 1..ids.len() {
            if ids[i] == ids[j] {
                tracing::error!("component view requests the same type twice");
                panic!("a component view must not request the same component type twice");
            }
        }
    }
}

macro_rules! impl_query {
    ($(($fetch:ident, $idx:tt)),+) => {
        // SAFETY: pointers come from `&mut SparseSetMap` and are valid as
        // long as that borrow; distinctness is asserted in `ptrs`.
        unsafe impl<'w, $($fetch: Fetch<'w>),+> Query<'w> for ($($fetch,)+) {
            type Ptrs = ($(*mut SparseSet<$fetch::Component>,)+);

            fn conjunction(registry: &SparseSetMap) -> ComponentMask {
                ComponentMask::EMPTY
                    $(.union(registry.mask_of::<$fetch::Component>()))+
            }

            fn ptrs(registry: &mut SparseSetMap) -> Self::Ptrs {
                assert_distinct(&[$(TypeId::of::<$fetch::Component>()),+]);
                ($(registry.store_ptr::<$fetch::Component>(),)+)
            }

            #[inline]
            unsafe fn lead_len(ptrs: &Self::Ptrs) -> usize {
                // SAFETY: caller keeps the pointers valid.
                unsafe { &*ptrs.0 }.len()
            }

            #[inline]
            unsafe fn lead_entity(ptrs: &Self::Ptrs, dense: usize) -> Entity {
                // SAFETY: caller keeps the pointers valid and `dense` in bounds.
                unsafe { &*ptrs.0 }.entities()[dense]
            }

            #[inline]
            unsafe fn fetch(ptrs: &Self::Ptrs, entity: Entity) -> Self {
                // SAFETY: forwarded from the caller, element by element.
                unsafe { ($($fetch::fetch(ptrs.$idx, entity),)+) }
            }
        }
    };
}

impl_query!((A, 0));
impl_query!((A, 0), (B, 1));
impl_query!((A, 0), (B, 1), (C, 2));
impl_query!((A, 0), (B, 1), (C, 2), (D, 3));

// ============================================================================
// Component views
// ============================================================================

/// Iterator over every live entity holding a requested component
/// combination.
///
/// Walks the dense array of the first requested type and skips entities
/// whose component mask lacks any requested bit, so the per-candidate test
/// is a single mask comparison. Yields `(entity, fetches)` in the lead
/// store's dense order. Put the rarest component first for the smallest
/// candidate set.
pub struct ComponentView<'w, Q: Query<'w>> {
    ptrs: Q::Ptrs,
    masks: &'w [ComponentMask],
    tags: &'w [Tag],
    conjunction: ComponentMask,
    tag_filter: Option<Tag>,
    cursor: usize,
    len: usize,
    // Holds the registry borrow so the stores cannot be touched while
    // references into them are live.
    _registry: PhantomData<&'w mut SparseSetMap>,
}

impl<'w, Q: Query<'w>> ComponentView<'w, Q> {
    pub(crate) fn new(
        registry: &'w mut SparseSetMap,
        masks: &'w [ComponentMask],
        tags: &'w [Tag],
    ) -> Self {
        let conjunction = Q::conjunction(registry);
        let ptrs = Q::ptrs(registry);
        // SAFETY: the pointers were captured a moment ago from a registry we
        // hold exclusively for 'w.
        let len = unsafe { Q::lead_len(&ptrs) };
        Self {
            ptrs,
            masks,
            tags,
            conjunction,
            tag_filter: None,
            cursor: 0,
            len,
            _registry: PhantomData,
        }
    }

    /// Restricts the view to entities carrying exactly this tag.
    #[must_use]
    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tag_filter = Some(tag);
        self
    }
}

impl<'w, Q: Query<'w>> Iterator for ComponentView<'w, Q> {
    type Item = (Entity, Q);

    fn next(&mut self) -> Option<Self::Item> {
        while self.cursor < self.len {
            // SAFETY: the registry is exclusively borrowed for 'w and
            // `cursor < len`, the lead store's dense length at construction;
            // nothing can have shrunk it since.
            let entity = unsafe { Q::lead_entity(&self.ptrs, self.cursor) };
            self.cursor += 1;
            if !self.masks[entity.index()].contains_all(self.conjunction) {
                continue;
            }
            if let Some(tag) = self.tag_filter {
                if self.tags[entity.index()] != tag {
                    continue;
                }
            }
            // SAFETY: the mask says `entity` holds every requested type, the
            // types are pairwise distinct, and the lead store's entity list
            // has no duplicates, so this (store, entity) pair is fresh.
            let fetched = unsafe { Q::fetch(&self.ptrs, entity) };
            return Some((entity, fetched));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn e(id: u32) -> Entity {
        Entity::from_raw(id)
    }

    #[test]
    fn test_slice_view_yields_in_order() {
        let entities = [e(3), e(1), e(2)];
        let view = SubtreeView::over(&entities);
        assert_eq!(view.root(), e(3));
        assert_eq!(view.len(), 3);
        assert_eq!(view.iter().collect::<Vec<_>>(), vec![e(3), e(1), e(2)]);
    }

    #[test]
    fn test_single_view_yields_once() {
        let view = SubtreeView::single(e(7));
        assert_eq!(view.root(), e(7));
        assert_eq!(view.len(), 1);
        assert_eq!(view.iter().len(), 1);
        assert_eq!(view.iter().collect::<Vec<_>>(), vec![e(7)]);
    }
}
