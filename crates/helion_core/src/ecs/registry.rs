//! # Component Registry
//!
//! Maps component types to their dense stores and routes typed operations.
//! Plain component types live in [`SparseSet`]s behind a minimal erased
//! interface; the hierarchy relation is a dedicated field with its own
//! ordering invariants and is special-cased wherever a typed operation
//! names [`Parent`].
//!
//! Every type gets its mask bit when the registry is built, so bit layout is
//! deterministic: register components in the same order and two runs agree
//! on every mask. Bit 0 always belongs to the hierarchy.

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::ecs::component::{Component, Parent};
use crate::ecs::entity::{ComponentMask, Entity, MAX_COMPONENT_TYPES};
use crate::ecs::hierarchy::{HierarchySparseSet, OrphanPolicy};
use crate::ecs::sparse::SparseSet;
use crate::error::{RegistryError, RegistryResult};
use crate::memory::HierarchyScratch;

/// Mask bit reserved for the hierarchy relation.
const HIERARCHY_BIT: u8 = 0;

/// The erased face of a dense store. Deliberately narrow: bulk teardown is
/// the only operation that needs to touch a store without knowing its type,
/// so that is all the interface offers. Anything typed goes through a
/// downcast.
trait ErasedStore: Any + Send + Sync {
    /// Removes `entity`'s component. Fatal if absent.
    fn remove_entity(&mut self, entity: Entity);

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component> ErasedStore for SparseSet<T> {
    fn remove_entity(&mut self, entity: Entity) {
        let _ = self.remove(entity);
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

struct StoreSlot {
    name: &'static str,
    /// Mask bit for this type; slot `i` always holds bit `i + 1`.
    bit: u8,
    store: Box<dyn ErasedStore>,
}

impl StoreSlot {
    fn typed<T: Component>(&self) -> &SparseSet<T> {
        match self.store.as_any().downcast_ref() {
            Some(store) => store,
            None => store_type_mismatch::<T>(self.name),
        }
    }

    fn typed_mut<T: Component>(&mut self) -> &mut SparseSet<T> {
        match self.store.as_any_mut().downcast_mut() {
            Some(store) => store,
            None => store_type_mismatch::<T>(self.name),
        }
    }
}

/// Type-indexed collection of dense component stores plus the hierarchy
/// index.
///
/// Built once by the scene builder; the set of registered types never
/// changes afterwards.
pub struct SparseSetMap {
    slots: Vec<StoreSlot>,
    by_type: HashMap<TypeId, usize>,
    hierarchy: HierarchySparseSet,
}

impl SparseSetMap {
    pub(crate) fn new(policy: OrphanPolicy) -> Self {
        Self {
            slots: Vec::new(),
            by_type: HashMap::new(),
            hierarchy: HierarchySparseSet::new(policy),
        }
    }

    /// Registers `T` and assigns it the next free mask bit.
    pub(crate) fn register<T: Component>(&mut self) -> RegistryResult<()> {
        let id = TypeId::of::<T>();
        let name = std::any::type_name::<T>();
        if id == TypeId::of::<Parent>() {
            return Err(RegistryError::Reserved(name));
        }
        if self.by_type.contains_key(&id) {
            return Err(RegistryError::AlreadyRegistered(name));
        }
        // Bit 0 is the hierarchy's; user types start at 1.
        let bit = self.slots.len() + 1;
        if bit >= MAX_COMPONENT_TYPES {
            return Err(RegistryError::TooManyComponents {
                limit: MAX_COMPONENT_TYPES,
            });
        }
        self.by_type.insert(id, self.slots.len());
        self.slots.push(StoreSlot {
            name,
            bit: bit as u8,
            store: Box::new(SparseSet::<T>::new()),
        });
        Ok(())
    }

    /// Returns `true` if `T` can be stored: registered, or the built-in
    /// hierarchy type.
    #[must_use]
    pub fn is_registered<T: Component>(&self) -> bool {
        TypeId::of::<T>() == TypeId::of::<Parent>()
            || self.by_type.contains_key(&TypeId::of::<T>())
    }

    /// The single-bit mask assigned to `T`.
    ///
    /// # Panics
    ///
    /// Fatal if `T` was never registered; component sets are fixed at scene
    /// construction.
    #[must_use]
    pub fn mask_of<T: Component>(&self) -> ComponentMask {
        if TypeId::of::<T>() == TypeId::of::<Parent>() {
            return ComponentMask::single(HIERARCHY_BIT);
        }
        ComponentMask::single(self.slots[self.slot_index::<T>()].bit)
    }

    /// The mask bit reserved for the hierarchy relation.
    #[inline]
    #[must_use]
    pub fn hierarchy_mask() -> ComponentMask {
        ComponentMask::single(HIERARCHY_BIT)
    }

    /// Adds `entity`'s `T` component. A [`Parent`] value routes to the
    /// hierarchy index, registering the named parent as a root if it is not
    /// tracked yet.
    ///
    /// # Panics
    ///
    /// Fatal if `entity` already has a `T`, or if `T` was never registered.
    pub fn add<T: Component>(&mut self, entity: Entity, value: T, scratch: &mut HierarchyScratch) {
        if let Some(parent) = (&value as &dyn Any).downcast_ref::<Parent>() {
            if self.hierarchy.contains(entity) {
                tracing::error!(%entity, "double hierarchy add");
                panic!("{entity} is already tracked by the hierarchy");
            }
            self.hierarchy.set_parent(entity, parent.0, scratch);
            return;
        }
        self.store_mut::<T>().add(entity, value);
    }

    /// Shared access to `entity`'s `T` component. The hierarchy type reads
    /// through to the parent link.
    ///
    /// # Panics
    ///
    /// Fatal if `entity` has no `T`.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> &T {
        if TypeId::of::<T>() == TypeId::of::<Parent>() {
            let parent: &dyn Any = self.hierarchy.get(entity);
            return match parent.downcast_ref() {
                Some(parent) => parent,
                None => store_type_mismatch::<T>("Parent"),
            };
        }
        self.store::<T>().get(entity)
    }

    /// Exclusive access to `entity`'s `T` component.
    ///
    /// # Panics
    ///
    /// Fatal if `entity` has no `T`, or if `T` is the hierarchy type: a
    /// parent link written directly would bypass the ordering maintenance,
    /// so reparenting goes through [`HierarchySparseSet::set_parent`].
    #[must_use]
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> &mut T {
        if TypeId::of::<T>() == TypeId::of::<Parent>() {
            tracing::error!(%entity, "mutable access to a parent link");
            panic!("parent links cannot be written directly; reparent instead");
        }
        self.store_mut::<T>().get_mut(entity)
    }

    /// Removes `entity`'s `T` component. Removing the hierarchy type
    /// detaches instead of erasing: a leaf leaves the index, an interior
    /// node becomes a root so its descendants keep their structure.
    ///
    /// # Panics
    ///
    /// Fatal if `entity` has no `T`.
    pub fn remove<T: Component>(&mut self, entity: Entity, scratch: &mut HierarchyScratch) {
        if TypeId::of::<T>() == TypeId::of::<Parent>() {
            if !self.hierarchy.contains(entity) {
                tracing::error!(%entity, "hierarchy remove on an untracked entity");
                panic!("{entity} is not tracked by the hierarchy");
            }
            self.hierarchy.set_parent(entity, Entity::INVALID, scratch);
            return;
        }
        let _ = self.store_mut::<T>().remove(entity);
    }

    /// Removes every component named by `mask` from `entity`. The hierarchy
    /// bit follows the same detach semantics as [`remove`].
    ///
    /// [`remove`]: SparseSetMap::remove
    pub fn remove_mask(
        &mut self,
        entity: Entity,
        mask: ComponentMask,
        scratch: &mut HierarchyScratch,
    ) {
        for bit in mask.bits() {
            if bit == HIERARCHY_BIT {
                self.hierarchy.set_parent(entity, Entity::INVALID, scratch);
            } else {
                self.slots[bit as usize - 1].store.remove_entity(entity);
            }
        }
    }

    /// The hierarchy index.
    #[inline]
    #[must_use]
    pub fn hierarchy(&self) -> &HierarchySparseSet {
        &self.hierarchy
    }

    /// Exclusive access to the hierarchy index. Crate-internal: the scene
    /// keeps its mask array in step with structural edits, so edits from
    /// outside would desynchronise the two.
    #[inline]
    pub(crate) fn hierarchy_mut(&mut self) -> &mut HierarchySparseSet {
        &mut self.hierarchy
    }

    /// Splits the borrow so a subtree walk can read the hierarchy while
    /// writing one component store.
    pub(crate) fn hierarchy_and_store_mut<T: Component>(
        &mut self,
    ) -> (&HierarchySparseSet, &mut SparseSet<T>) {
        let index = self.slot_index::<T>();
        (&self.hierarchy, self.slots[index].typed_mut())
    }

    /// The dense store for `T`.
    pub(crate) fn store<T: Component>(&self) -> &SparseSet<T> {
        self.slots[self.slot_index::<T>()].typed()
    }

    /// The dense store for `T`, exclusively.
    pub(crate) fn store_mut<T: Component>(&mut self) -> &mut SparseSet<T> {
        let index = self.slot_index::<T>();
        self.slots[index].typed_mut()
    }

    /// Raw pointer to the dense store for `T`, for view construction. The
    /// pointer is only as valid as the `&mut self` borrow it came from.
    pub(crate) fn store_ptr<T: Component>(&mut self) -> *mut SparseSet<T> {
        self.store_mut::<T>() as *mut SparseSet<T>
    }

    fn slot_index<T: Component>(&self) -> usize {
        if TypeId::of::<T>() == TypeId::of::<Parent>() {
            tracing::error!("plain store access for the hierarchy type");
            panic!("parent links have no plain dense store; use the hierarchy index");
        }
        match self.by_type.get(&TypeId::of::<T>()) {
            Some(&index) => index,
            None => unregistered::<T>(),
        }
    }
}

#[cold]
#[inline(never)]
fn unregistered<T>() -> ! {
    let name = std::any::type_name::<T>();
    tracing::error!(component = name, "component type was never registered");
    panic!("component type {name} is not registered; register it on the scene builder");
}

#[cold]
#[inline(never)]
fn store_type_mismatch<T>(name: &'static str) -> ! {
    tracing::error!(
        slot = name,
        requested = std::any::type_name::<T>(),
        "component store type mismatch"
    );
    panic!("component store for {name} does not hold {}", std::any::type_name::<T>());
}

// ============================================================================
// Tests
// ============================================================================
