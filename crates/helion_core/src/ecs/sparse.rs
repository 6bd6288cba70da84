//! # Dense Component Storage
//!
//! One [`SparseSet`] per component type: a dense value array, a parallel
//! array of owning entities, and a paged lookup table from entity id to
//! dense index. Iteration touches only the dense arrays, so it is
//! cache-coherent; the paging bounds worst-case memory when entity ids are
//! sparse and large.
//!
//! Dense order is NOT stable: removal swaps the last element into the hole.
//! Never assume index alignment between two different stores; resolve by
//! entity id through the lookup table.

use super::component::Component;
use super::entity::Entity;

/// Entries per lookup page.
const PAGE_SIZE: usize = 4096;

/// Empty-slot sentinel inside a page.
const EMPTY: u32 = u32::MAX;

/// Paged map from entity id to dense index.
///
/// Pages are allocated on first touch, so a scene whose entity ids span a
/// huge range only pays for the pages it actually uses.
#[derive(Debug, Default)]
pub(crate) struct PageTable {
    pages: Vec<Option<Box<[u32]>>>,
}

impl PageTable {
    /// Dense index of `entity`, if it has one.
    #[inline]
    pub(crate) fn get(&self, entity: Entity) -> Option<u32> {
        let page = entity.index() / PAGE_SIZE;
        let slot = entity.index() % PAGE_SIZE;
        match self.pages.get(page) {
            Some(Some(p)) if p[slot] != EMPTY => Some(p[slot]),
            _ => None,
        }
    }

    /// Maps `entity` to `dense`, allocating its page if needed.
    pub(crate) fn set(&mut self, entity: Entity, dense: u32) {
        let page = entity.index() / PAGE_SIZE;
        let slot = entity.index() % PAGE_SIZE;
        if page >= self.pages.len() {
            self.pages.resize_with(page + 1, || None);
        }
        let p = self.pages[page].get_or_insert_with(|| vec![EMPTY; PAGE_SIZE].into_boxed_slice());
        p[slot] = dense;
    }

    /// Clears the mapping for `entity`. The page stays allocated.
    pub(crate) fn clear(&mut self, entity: Entity) {
        let page = entity.index() / PAGE_SIZE;
        let slot = entity.index() % PAGE_SIZE;
        if let Some(Some(p)) = self.pages.get_mut(page) {
            p[slot] = EMPTY;
        }
    }
}

/// Dense storage for a single component type.
///
/// Invariants: `entities[lookup[e]] == e` for every live entity `e`, and the
/// dense arrays always have equal length.
///
/// All entity-validity violations abort: this sits on the per-frame hot path
/// and a defensive check-and-return would be paid every frame for an error
/// class correct calling code never hits.
pub struct SparseSet<T: Component> {
    data: Vec<T>,
    entities: Vec<Entity>,
    lookup: PageTable,
}

impl<T: Component> Default for SparseSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Component> SparseSet<T> {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Vec::new(),
            entities: Vec::new(),
            lookup: PageTable::default(),
        }
    }


    /// Number of live values.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Checks if the store holds no values.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Checks whether `entity` has a live value of this type.
    ///
    /// This is the expected-absence query; use it instead of letting
    /// [`get`](Self::get) abort.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.lookup.get(entity).is_some()
    }

    /// Dense index of `entity`, if it has a value here.
    #[inline]
    #[must_use]
    pub fn dense_index(&self, entity: Entity) -> Option<u32> {
        self.lookup.get(entity)
    }

    /// Attaches `value` to `entity` at the end of the dense array.
    ///
    /// # Panics
    ///
    /// If `entity` already has a live value of this type, or is the invalid
    /// sentinel.
    pub fn add(&mut self, entity: Entity, value: T) {
        assert!(!entity.is_invalid(), "cannot add a component to {entity}");
        if self.contains(entity) {
            tracing::error!(%entity, component = std::any::type_name::<T>(), "double add");
            panic!(
                "{entity} already has a {} component",
                std::any::type_name::<T>()
            );
        }
        let dense = self.data.len() as u32;
        self.data.push(value);
        self.entities.push(entity);
        self.lookup.set(entity, dense);
    }

    /// Value attached to `entity`.
    ///
    /// # Panics
    ///
    /// If `entity` has no live value of this type.
    #[inline]
    #[must_use]
    pub fn get(&self, entity: Entity) -> &T {
        match self.lookup.get(entity) {
            Some(dense) => &self.data[dense as usize],
            None => missing::<T>(entity),
        }
    }

    /// Mutable value attached to `entity`.
    ///
    /// # Panics
    ///
    /// If `entity` has no live value of this type.
    #[inline]
    pub fn get_mut(&mut self, entity: Entity) -> &mut T {
        match self.lookup.get(entity) {
            Some(dense) => &mut self.data[dense as usize],
            None => missing::<T>(entity),
        }
    }

    /// Positional accessor used by iteration; `dense` must be `< len()`.
    #[inline]
    #[must_use]
    pub fn get_raw(&self, dense: usize) -> &T {
        debug_assert!(dense < self.data.len());
        &self.data[dense]
    }

    /// Mutable positional accessor; `dense` must be `< len()`.
    #[inline]
    pub fn get_raw_mut(&mut self, dense: usize) -> &mut T {
        debug_assert!(dense < self.data.len());
        &mut self.data[dense]
    }

    /// Detaches and returns `entity`'s value by swapping the last dense slot
    /// into its place.
    ///
    /// # Panics
    ///
    /// If `entity` has no live value of this type.
    pub fn remove(&mut self, entity: Entity) -> T {
        let Some(dense) = self.lookup.get(entity) else {
            missing::<T>(entity)
        };
        let dense = dense as usize;
        let value = self.data.swap_remove(dense);
        self.entities.swap_remove(dense);
        self.lookup.clear(entity);
        // The previous tail now lives at `dense`; repoint its lookup entry.
        if dense < self.entities.len() {
            self.lookup.set(self.entities[dense], dense as u32);
        }
        value
    }

    /// Owning entity of every dense slot, in dense order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// All values in dense order.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// All values in dense order, mutable.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Iterates `(entity, &value)` pairs in dense order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &T)> {
        self.entities.iter().copied().zip(self.data.iter())
    }
}

#[cold]
#[inline(never)]
fn missing<T>(entity: Entity) -> ! {
    tracing::error!(
        %entity,
        component = std::any::type_name::<T>(),
        "non-existing component"
    );
    panic!(
        "{entity} has no {} component",
        std::any::type_name::<T>()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::Velocity;

    fn e(id: u32) -> Entity {
        Entity::from_raw(id)
    }

    #[test]
    fn test_add_get_roundtrip() {
        let mut set = SparseSet::<Velocity>::new();
        set.add(e(3), Velocity::new(1.0, 2.0, 3.0));

        assert!(set.contains(e(3)));
        assert_eq!(*set.get(e(3)), Velocity::new(1.0, 2.0, 3.0));
        assert_eq!(set.len(), 1);
    }

    #[test]
    #[should_panic(expected = "already has a")]
    fn test_double_add_is_fatal() {
        let mut set = SparseSet::<Velocity>::new();
        set.add(e(1), Velocity::default());
        set.add(e(1), Velocity::default());
    }

    #[test]
    #[should_panic(expected = "has no")]
    fn test_get_after_remove_is_fatal() {
        let mut set = SparseSet::<Velocity>::new();
        set.add(e(1), Velocity::default());
        set.remove(e(1));
        let _ = set.get(e(1));
    }

    #[test]
    fn test_swap_remove_fixes_moved_lookup() {
        let mut set = SparseSet::<Velocity>::new();
        set.add(e(0), Velocity::new(0.0, 0.0, 0.0));
        set.add(e(1), Velocity::new(1.0, 0.0, 0.0));
        set.add(e(2), Velocity::new(2.0, 0.0, 0.0));

        // Removing the head swaps entity 2 into slot 0.
        set.remove(e(0));
        assert_eq!(set.len(), 2);
        assert_eq!(*set.get(e(2)), Velocity::new(2.0, 0.0, 0.0));
        assert_eq!(*set.get(e(1)), Velocity::new(1.0, 0.0, 0.0));
        assert_eq!(set.entities()[0], e(2));
    }

    #[test]
    fn test_paged_lookup_handles_sparse_ids() {
        let mut set = SparseSet::<Velocity>::new();
        // Ids three pages apart must not allocate one giant table.
        set.add(e(1), Velocity::new(1.0, 0.0, 0.0));
        set.add(e(3 * 4096 + 7), Velocity::new(2.0, 0.0, 0.0));

        assert!(set.contains(e(3 * 4096 + 7)));
        assert!(!set.contains(e(2 * 4096)));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_dense_iteration_matches_entities() {
        let mut set = SparseSet::<Velocity>::new();
        for id in 0..8 {
            set.add(e(id), Velocity::new(id as f32, 0.0, 0.0));
        }
        for (entity, vel) in set.iter() {
            assert_eq!(vel.0.x, entity.id() as f32);
        }
    }
}
