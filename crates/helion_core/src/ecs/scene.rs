//! # Scene
//!
//! The facade the rest of the engine talks to. A scene owns the component
//! registry, the per-entity mask and tag arrays, the recycled-id free list,
//! and one traversal scratch; callers never touch a store or the hierarchy
//! index directly.
//!
//! The per-entity mask mirrors store membership exactly: a bit is set if and
//! only if the matching store (or the hierarchy index) holds the entity.
//! Views rely on that mirror for their one-comparison candidate test, so
//! every mutation here maintains it.

use std::any::{Any, TypeId};

use helion_shared::{Quaternion, Transform, Vec3};

use crate::ecs::component::{Component, Parent};
use crate::ecs::entity::{ComponentMask, Entity, Tag};
use crate::ecs::hierarchy::OrphanPolicy;
use crate::ecs::registry::SparseSetMap;
use crate::ecs::view::{ComponentView, Query, SubtreeView};
use crate::error::RegistryResult;
use crate::memory::HierarchyScratch;

// ============================================================================
// Bundles and sets
// ============================================================================

/// A group of component values attached to an entity in one call.
///
/// Implemented for tuples of up to four components and for `()`, which
/// attaches nothing.
pub trait ComponentBundle {
    /// Attaches every value in the bundle to `entity`.
    fn attach(self, scene: &mut Scene, entity: Entity);
}

impl ComponentBundle for () {
    fn attach(self, _scene: &mut Scene, _entity: Entity) {}
}

macro_rules! impl_bundle {
    ($($ty:ident),+) => {
        impl<$($ty: Component),+> ComponentBundle for ($($ty,)+) {
            fn attach(self, scene: &mut Scene, entity: Entity) {
                #[allow(non_snake_case)]
                let ($($ty,)+) = self;
                $(scene.add_component(entity, $ty);)+
            }
        }
    };
}

impl_bundle!(A);
impl_bundle!(A, B);
impl_bundle!(A, B, C);
impl_bundle!(A, B, C, D);

/// A group of component *types* named without values, for membership checks
/// and bulk clearing.
pub trait ComponentSet {
    /// Mask with one bit per named type.
    fn mask(registry: &SparseSetMap) -> ComponentMask;

    /// Removes every named component from `entity`.
    fn clear(scene: &mut Scene, entity: Entity);
}

macro_rules! impl_component_set {
    ($($ty:ident),+) => {
        impl<$($ty: Component),+> ComponentSet for ($($ty,)+) {
            fn mask(registry: &SparseSetMap) -> ComponentMask {
                ComponentMask::EMPTY $(.union(registry.mask_of::<$ty>()))+
            }

            fn clear(scene: &mut Scene, entity: Entity) {
                $(scene.remove_component::<$ty>(entity);)+
            }
        }
    };
}

impl_component_set!(A);
impl_component_set!(A, B);
impl_component_set!(A, B, C);
impl_component_set!(A, B, C, D);

// ============================================================================
// Builder
// ============================================================================

/// Configures and builds a [`Scene`].
///
/// Component types must all be registered here; registration order decides
/// mask bit layout, so keep it stable if masks are ever compared across
/// runs.
pub struct SceneBuilder {
    registry: SparseSetMap,
    policy: OrphanPolicy,
    scratch_depth: usize,
}

impl SceneBuilder {
    fn new() -> Self {
        Self {
            registry: SparseSetMap::new(OrphanPolicy::default()),
            policy: OrphanPolicy::default(),
            scratch_depth: 0,
        }
    }

    /// Registers component type `T`, assigning it the next mask bit.
    pub fn register<T: Component>(mut self) -> RegistryResult<Self> {
        self.registry.register::<T>()?;
        Ok(self)
    }

    /// Sets what happens to parents orphaned by a reparent. Defaults to
    /// [`OrphanPolicy::Prune`].
    #[must_use]
    pub fn orphan_policy(mut self, policy: OrphanPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Pre-sizes the traversal scratch for trees up to `depth` levels deep,
    /// so the first subtree walks allocate nothing.
    #[must_use]
    pub fn scratch_depth(mut self, depth: usize) -> Self {
        self.scratch_depth = depth;
        self
    }

    /// Builds the scene.
    #[must_use]
    pub fn build(self) -> Scene {
        let mut registry = self.registry;
        registry.hierarchy_mut().set_policy(self.policy);
        Scene {
            registry,
            masks: Vec::new(),
            tags: Vec::new(),
            free: Vec::new(),
            scratch: HierarchyScratch::with_depth(self.scratch_depth),
        }
    }
}

// ============================================================================
// Scene
// ============================================================================

/// Entity population, component storage, and scene hierarchy behind one
/// interface.
pub struct Scene {
    registry: SparseSetMap,
    /// Component mask per entity id. [`ComponentMask::INVALID`] marks a
    /// removed id awaiting recycling.
    masks: Vec<ComponentMask>,
    /// Tag per entity id.
    tags: Vec<Tag>,
    /// Removed ids, reused LIFO.
    free: Vec<Entity>,
    scratch: HierarchyScratch,
}

impl Scene {
    /// Starts building a scene.
    #[must_use]
    pub fn builder() -> SceneBuilder {
        SceneBuilder::new()
    }

    /// Creates an entity carrying `bundle`, recycling a removed id when one
    /// is available.
    pub fn create<B: ComponentBundle>(&mut self, bundle: B) -> Entity {
        let entity = match self.free.pop() {
            Some(entity) => {
                debug_assert!(self.masks[entity.index()].is_invalid());
                self.masks[entity.index()] = ComponentMask::EMPTY;
                self.tags[entity.index()] = Tag::NONE;
                entity
            }
            None => {
                let entity = Entity::from_raw(self.masks.len() as u32);
                self.masks.push(ComponentMask::EMPTY);
                self.tags.push(Tag::NONE);
                entity
            }
        };
        tracing::trace!(%entity, "create");
        bundle.attach(self, entity);
        entity
    }

    /// Attaches every component in `bundle` to `entity`.
    ///
    /// # Panics
    ///
    /// Fatal if `entity` is not live or already has one of the components.
    pub fn add<B: ComponentBundle>(&mut self, entity: Entity, bundle: B) {
        self.assert_live(entity);
        bundle.attach(self, entity);
    }

    /// Attaches one component to `entity`. A [`Parent`] value registers the
    /// entity in the hierarchy under the named parent.
    ///
    /// # Panics
    ///
    /// Fatal if `entity` is not live, already has a `T`, or `T` was never
    /// registered.
    pub fn add_component<T: Component>(&mut self, entity: Entity, value: T) {
        self.assert_live(entity);
        let parent_target = (&value as &dyn Any)
            .downcast_ref::<Parent>()
            .map(|parent| parent.0);
        if let Some(parent) = parent_target {
            if !parent.is_invalid() {
                self.assert_live(parent);
            }
        }
        let bit = self.registry.mask_of::<T>();
        self.registry.add(entity, value, &mut self.scratch);
        self.masks[entity.index()].insert(bit);
        if let Some(parent) = parent_target {
            if !parent.is_invalid() {
                // The parent may have been registered as a root on the fly.
                self.sync_hierarchy_bit(parent);
            }
        }
    }

    /// Removes one component from `entity`. Removing [`Parent`] detaches:
    /// a leaf leaves the hierarchy, an interior node becomes a root.
    ///
    /// # Panics
    ///
    /// Fatal if `entity` is not live or has no `T`.
    pub fn remove_component<T: Component>(&mut self, entity: Entity) {
        self.assert_live(entity);
        if TypeId::of::<T>() == TypeId::of::<Parent>() {
            let old_parent = self.registry.hierarchy().try_parent(entity);
            self.registry.remove::<T>(entity, &mut self.scratch);
            self.sync_hierarchy_bit(entity);
            if let Some(parent) = old_parent {
                if !parent.is_invalid() {
                    self.sync_hierarchy_bit(parent);
                }
            }
        } else {
            let bit = self.registry.mask_of::<T>();
            self.registry.remove::<T>(entity, &mut self.scratch);
            self.masks[entity.index()].remove(bit);
        }
    }

    /// Removes every component named by the set `S` from `entity`.
    ///
    /// # Panics
    ///
    /// Fatal if `entity` is not live or lacks any component in `S`.
    pub fn clear_components<S: ComponentSet>(&mut self, entity: Entity) {
        self.assert_live(entity);
        let mask = S::mask(&self.registry);
        if !self.masks[entity.index()].contains_all(mask) {
            tracing::error!(%entity, "clearing components the entity does not have");
            panic!("{entity} does not have every component being cleared");
        }
        S::clear(self, entity);
    }

    /// Returns `true` if `entity` is live and has every component named by
    /// `S`. Never fatal on dead or never-created entities.
    #[must_use]
    pub fn check_components<S: ComponentSet>(&self, entity: Entity) -> bool {
        if !self.is_live(entity) {
            return false;
        }
        self.masks[entity.index()].contains_all(S::mask(&self.registry))
    }

    /// Shared access to `entity`'s `T` component.
    ///
    /// # Panics
    ///
    /// Fatal if `entity` is not live or has no `T`.
    #[must_use]
    pub fn get<T: Component>(&self, entity: Entity) -> &T {
        self.assert_live(entity);
        self.registry.get(entity)
    }

    /// Exclusive access to `entity`'s `T` component. Parent links are
    /// read-only here; reparent through [`set_parent`].
    ///
    /// # Panics
    ///
    /// Fatal if `entity` is not live, has no `T`, or `T` is [`Parent`].
    ///
    /// [`set_parent`]: Scene::set_parent
    #[must_use]
    pub fn get_mut<T: Component>(&mut self, entity: Entity) -> &mut T {
        self.assert_live(entity);
        self.registry.get_mut(entity)
    }

    /// Removes `entity` and every component it holds, returning its id to
    /// the free list. Children are detached to roots first; destroying a
    /// parent never destroys its descendants. Use [`remove_subtree`] for
    /// that.
    ///
    /// # Panics
    ///
    /// Fatal if `entity` is not live.
    ///
    /// [`remove_subtree`]: Scene::remove_subtree
    pub fn remove(&mut self, entity: Entity) {
        self.assert_live(entity);
        while let Some(child) = self.registry.hierarchy().first_child(entity) {
            self.set_parent(child, Entity::INVALID);
        }
        let old_parent = self.registry.hierarchy().try_parent(entity);
        // Read after the detach loop: pruning may have dropped our own
        // hierarchy entry already.
        let mask = self.masks[entity.index()];
        self.registry.remove_mask(entity, mask, &mut self.scratch);
        if let Some(parent) = old_parent {
            if !parent.is_invalid() {
                self.sync_hierarchy_bit(parent);
            }
        }
        self.masks[entity.index()] = ComponentMask::INVALID;
        self.tags[entity.index()] = Tag::NONE;
        self.free.push(entity);
        tracing::trace!(%entity, "remove");
    }

    /// Removes `entity` together with every descendant.
    ///
    /// # Panics
    ///
    /// Fatal if `entity` is not live.
    pub fn remove_subtree(&mut self, entity: Entity) {
        self.assert_live(entity);
        if !self.registry.hierarchy().contains(entity) {
            // Its own trivial subtree.
            self.remove(entity);
            return;
        }
        let drained = self
            .registry
            .hierarchy_mut()
            .remove_subtree(entity, &mut self.scratch);
        for &removed in &drained {
            let mut mask = self.masks[removed.index()];
            // The hierarchy entries are already gone.
            mask.remove(SparseSetMap::hierarchy_mask());
            self.registry.remove_mask(removed, mask, &mut self.scratch);
            self.masks[removed.index()] = ComponentMask::INVALID;
            self.tags[removed.index()] = Tag::NONE;
            self.free.push(removed);
        }
        tracing::debug!(%entity, count = drained.len(), "remove_subtree");
        self.scratch.restore_drained(drained);
    }

    /// Returns `true` if `entity` names a live entity in this scene.
    #[must_use]
    pub fn is_live(&self, entity: Entity) -> bool {
        !entity.is_invalid()
            && entity.index() < self.masks.len()
            && !self.masks[entity.index()].is_invalid()
    }

    /// Number of live entities.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.masks.len() - self.free.len()
    }

    // ------------------------------------------------------------------
    // Tags
    // ------------------------------------------------------------------

    /// Sets `entity`'s tag.
    ///
    /// # Panics
    ///
    /// Fatal if `entity` is not live.
    pub fn set_tag(&mut self, entity: Entity, tag: Tag) {
        self.assert_live(entity);
        self.tags[entity.index()] = tag;
    }

    /// `entity`'s tag. [`Tag::NONE`] when never set.
    ///
    /// # Panics
    ///
    /// Fatal if `entity` is not live.
    #[must_use]
    pub fn tag(&self, entity: Entity) -> Tag {
        self.assert_live(entity);
        self.tags[entity.index()]
    }

    // ------------------------------------------------------------------
    // Hierarchy
    // ------------------------------------------------------------------

    /// Moves `entity` (with its whole subtree) under `parent`, or detaches
    /// it if `parent` is invalid. Both endpoints join the hierarchy on the
    /// fly if they are not in it yet.
    ///
    /// # Panics
    ///
    /// Fatal if either live endpoint check fails, or if `parent` lies inside
    /// `entity`'s subtree.
    pub fn set_parent(&mut self, entity: Entity, parent: Entity) {
        self.assert_live(entity);
        if !parent.is_invalid() {
            self.assert_live(parent);
        }
        let old_parent = self.registry.hierarchy().try_parent(entity);
        self.registry
            .hierarchy_mut()
            .set_parent(entity, parent, &mut self.scratch);
        self.sync_hierarchy_bit(entity);
        if !parent.is_invalid() {
            self.sync_hierarchy_bit(parent);
        }
        if let Some(previous) = old_parent {
            if !previous.is_invalid() {
                self.sync_hierarchy_bit(previous);
            }
        }
    }

    /// `entity`'s parent, or [`Entity::INVALID`] for roots and entities
    /// outside the hierarchy.
    ///
    /// # Panics
    ///
    /// Fatal if `entity` is not live.
    #[must_use]
    pub fn parent(&self, entity: Entity) -> Entity {
        self.assert_live(entity);
        self.registry
            .hierarchy()
            .try_parent(entity)
            .unwrap_or(Entity::INVALID)
    }

    /// The subtree rooted at `entity`, in pre-order. An entity outside the
    /// hierarchy is its own one-element subtree.
    ///
    /// # Panics
    ///
    /// Fatal if `entity` is not live.
    #[must_use]
    pub fn subtree(&mut self, entity: Entity) -> SubtreeView<'_> {
        self.assert_live(entity);
        self.registry.hierarchy().subtree(entity, &mut self.scratch)
    }

    /// Translates the local transform of every entity in `entity`'s subtree
    /// that has one.
    ///
    /// # Panics
    ///
    /// Fatal if `entity` is not live or [`Transform`] was never registered.
    pub fn translate_subtree(&mut self, entity: Entity, delta: Vec3) {
        self.assert_live(entity);
        let (hierarchy, transforms) = self.registry.hierarchy_and_store_mut::<Transform>();
        for member in hierarchy.subtree(entity, &mut self.scratch).iter() {
            if transforms.contains(member) {
                transforms.get_mut(member).position += delta;
            }
        }
    }

    /// Applies `rotation` on top of the local rotation of every entity in
    /// `entity`'s subtree that has a transform.
    ///
    /// # Panics
    ///
    /// Fatal if `entity` is not live or [`Transform`] was never registered.
    pub fn rotate_subtree(&mut self, entity: Entity, rotation: Quaternion) {
        self.assert_live(entity);
        let (hierarchy, transforms) = self.registry.hierarchy_and_store_mut::<Transform>();
        for member in hierarchy.subtree(entity, &mut self.scratch).iter() {
            if transforms.contains(member) {
                let transform = transforms.get_mut(member);
                transform.rotation = rotation.mul(transform.rotation);
            }
        }
    }

    /// Scales the local transform of every entity in `entity`'s subtree
    /// that has one.
    ///
    /// # Panics
    ///
    /// Fatal if `entity` is not live or [`Transform`] was never registered.
    pub fn scale_subtree(&mut self, entity: Entity, factor: f32) {
        self.assert_live(entity);
        let (hierarchy, transforms) = self.registry.hierarchy_and_store_mut::<Transform>();
        for member in hierarchy.subtree(entity, &mut self.scratch).iter() {
            if transforms.contains(member) {
                transforms.get_mut(member).scale *= factor;
            }
        }
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    /// Iterates every live entity holding the component combination `Q`,
    /// in the dense order of the first requested type.
    ///
    /// ```
    /// # use helion_core::{Scene, Velocity};
    /// # use helion_shared::Transform;
    /// # let mut scene = Scene::builder()
    /// #     .register::<Transform>().unwrap()
    /// #     .register::<Velocity>().unwrap()
    /// #     .build();
    /// # let dt = 0.016_f32;
    /// for (_entity, (transform, velocity)) in scene.view::<(&mut Transform, &Velocity)>() {
    ///     transform.position += velocity.0 * dt;
    /// }
    /// ```
    ///
    /// # Panics
    ///
    /// Fatal if `Q` names an unregistered type, the same type twice, or the
    /// hierarchy type.
    pub fn view<'w, Q: Query<'w>>(&'w mut self) -> ComponentView<'w, Q> {
        ComponentView::new(&mut self.registry, &self.masks, &self.tags)
    }

    // ------------------------------------------------------------------

    fn sync_hierarchy_bit(&mut self, entity: Entity) {
        let bit = SparseSetMap::hierarchy_mask();
        if self.registry.hierarchy().contains(entity) {
            self.masks[entity.index()].insert(bit);
        } else {
            self.masks[entity.index()].remove(bit);
        }
    }

    fn assert_live(&self, entity: Entity) {
        if !self.is_live(entity) {
            dead_entity(entity);
        }
    }
}

#[cold]
#[inline(never)]
fn dead_entity(entity: Entity) -> ! {
    tracing::error!(%entity, "operation on a dead or never-created entity");
    panic!("{entity} is not live in this scene");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::component::{RenderComponent, Velocity};

    fn scene() -> Scene {
        Scene::builder()
            .register::<Transform>()
            .unwrap()
            .register::<Velocity>()
            .unwrap()
            .register::<RenderComponent>()
            .unwrap()
            .build()
    }

    #[test]
    fn test_builder_presizes_traversal_scratch() {
        let scene = Scene::builder().scratch_depth(64).build();
        assert!(scene.scratch.capacity() >= 64);
    }

    #[test]
    fn test_create_recycles_removed_ids() {
        let mut scene = scene();
        let a = scene.create(());
        let b = scene.create(());
        assert_ne!(a, b);
        scene.remove(a);
        let c = scene.create(());
        assert_eq!(a, c);
        assert_eq!(scene.live_count(), 2);
    }

    #[test]
    fn test_component_roundtrip_through_bundle() {
        let mut scene = scene();
        let entity = scene.create((
            Transform::from_position(Vec3::new(1.0, 2.0, 3.0)),
            Velocity::new(0.0, 1.0, 0.0),
        ));
        assert!(scene.check_components::<(Transform, Velocity)>(entity));
        assert!(!scene.check_components::<(RenderComponent,)>(entity));
        assert_eq!(scene.get::<Transform>(entity).position.y, 2.0);
        scene.get_mut::<Velocity>(entity).0.x = 5.0;
        assert_eq!(scene.get::<Velocity>(entity).0.x, 5.0);
    }

    #[test]
    fn test_check_components_is_false_for_dead_entities() {
        let mut scene = scene();
        let entity = scene.create((Transform::IDENTITY,));
        scene.remove(entity);
        assert!(!scene.check_components::<(Transform,)>(entity));
        assert!(!scene.check_components::<(Transform,)>(Entity::INVALID));
        assert!(!scene.check_components::<(Transform,)>(Entity::from_raw(999)));
    }

    #[test]
    fn test_clear_components_removes_named_types_only() {
        let mut scene = scene();
        let entity = scene.create((
            Transform::IDENTITY,
            Velocity::new(1.0, 0.0, 0.0),
            RenderComponent::default(),
        ));
        scene.clear_components::<(Transform, Velocity)>(entity);
        assert!(!scene.check_components::<(Transform,)>(entity));
        assert!(scene.check_components::<(RenderComponent,)>(entity));
    }

    #[test]
    #[should_panic(expected = "does not have every component")]
    fn test_clear_missing_components_is_fatal() {
        let mut scene = scene();
        let entity = scene.create((Transform::IDENTITY,));
        scene.clear_components::<(Transform, Velocity)>(entity);
    }

    #[test]
    fn test_parent_bundle_registers_in_hierarchy() {
        let mut scene = scene();
        let root = scene.create((Transform::IDENTITY,));
        let child = scene.create((Transform::IDENTITY, Parent(root)));
        assert!(scene.check_components::<(Parent,)>(child));
        // The parent was pulled into the hierarchy as a root.
        assert!(scene.check_components::<(Parent,)>(root));
        assert_eq!(scene.parent(child), root);
        assert_eq!(scene.parent(root), Entity::INVALID);
    }

    #[test]
    fn test_removing_parent_of_interior_node_keeps_membership() {
        let mut scene = scene();
        let root = scene.create(());
        let mid = scene.create((Parent(root),));
        let _leaf = scene.create((Parent(mid),));
        scene.remove_component::<Parent>(mid);
        // Detached to a root, still tracked because of its child.
        assert!(scene.check_components::<(Parent,)>(mid));
        assert_eq!(scene.parent(mid), Entity::INVALID);
    }

    #[test]
    fn test_removed_root_leaves_no_stale_hierarchy_entry() {
        let mut scene = Scene::builder()
            .register::<Transform>()
            .unwrap()
            .orphan_policy(OrphanPolicy::Keep)
            .build();
        let root = scene.create(());
        let child = scene.create((Parent(root),));
        scene.remove(child);
        // `root` is now a tracked childless root; destroying it must clear
        // its entry so the recycled id starts clean.
        scene.remove(root);
        let recycled = scene.create(());
        assert_eq!(recycled, root);
        assert!(!scene.check_components::<(Parent,)>(recycled));
        let anchor = scene.create(());
        scene.add_component(recycled, Parent(anchor));
        assert_eq!(scene.parent(recycled), anchor);
    }

    #[test]
    fn test_remove_detaches_children_to_roots() {
        let mut scene = scene();
        let root = scene.create(());
        let a = scene.create((Parent(root),));
        let b = scene.create((Parent(root),));
        let under_a = scene.create((Parent(a),));
        scene.remove(root);
        assert!(!scene.is_live(root));
        assert!(scene.is_live(a));
        assert!(scene.is_live(b));
        assert_eq!(scene.parent(a), Entity::INVALID);
        assert_eq!(scene.parent(under_a), a);
    }

    #[test]
    fn test_remove_subtree_destroys_descendants() {
        let mut scene = scene();
        let root = scene.create(());
        let mid = scene.create((Transform::IDENTITY, Parent(root)));
        let leaf = scene.create((Velocity::new(1.0, 0.0, 0.0), Parent(mid)));
        let sibling = scene.create((Parent(root),));
        scene.remove_subtree(mid);
        assert!(!scene.is_live(mid));
        assert!(!scene.is_live(leaf));
        assert!(scene.is_live(root));
        assert!(scene.is_live(sibling));
        // Ids go back into circulation.
        let recycled = scene.create(());
        assert!(recycled == leaf || recycled == mid);
    }

    #[test]
    fn test_subtree_walk_yields_preorder() {
        let mut scene = scene();
        let root = scene.create(());
        let a = scene.create((Parent(root),));
        let b = scene.create((Parent(root),));
        let under_a = scene.create((Parent(a),));
        let members: Vec<Entity> = scene.subtree(root).iter().collect();
        assert_eq!(members.len(), 4);
        assert_eq!(members[0], root);
        let pos = |entity| members.iter().position(|&m| m == entity).unwrap();
        assert!(pos(a) < pos(under_a));
        assert!(pos(b) > pos(root));
    }

    #[test]
    fn test_subtree_transforms_skip_entities_without_one() {
        let mut scene = scene();
        let root = scene.create((Transform::from_position(Vec3::ONE),));
        let child = scene.create((Transform::IDENTITY, Parent(root)));
        let bare = scene.create((Parent(root),));
        scene.translate_subtree(root, Vec3::new(0.0, 10.0, 0.0));
        assert_eq!(scene.get::<Transform>(root).position.y, 11.0);
        assert_eq!(scene.get::<Transform>(child).position.y, 10.0);
        assert!(!scene.check_components::<(Transform,)>(bare));
        scene.scale_subtree(root, 2.0);
        assert_eq!(scene.get::<Transform>(child).scale, 2.0);
    }

    #[test]
    fn test_view_yields_intersection_in_lead_dense_order() {
        let mut scene = scene();
        let moving_a = scene.create((Transform::IDENTITY, Velocity::new(1.0, 0.0, 0.0)));
        let still = scene.create((Transform::IDENTITY,));
        let moving_b = scene.create((Transform::IDENTITY, Velocity::new(2.0, 0.0, 0.0)));
        let mut seen = Vec::new();
        for (entity, (transform, velocity)) in scene.view::<(&mut Transform, &Velocity)>() {
            transform.position += velocity.0 * 1.0;
            seen.push(entity);
        }
        assert_eq!(seen, vec![moving_a, moving_b]);
        assert_eq!(scene.get::<Transform>(moving_a).position.x, 1.0);
        assert_eq!(scene.get::<Transform>(still).position.x, 0.0);
        assert_eq!(scene.get::<Transform>(moving_b).position.x, 2.0);
    }

    #[test]
    fn test_view_skips_removed_components() {
        let mut scene = scene();
        let a = scene.create((Transform::IDENTITY, Velocity::new(1.0, 0.0, 0.0)));
        let b = scene.create((Transform::IDENTITY, Velocity::new(2.0, 0.0, 0.0)));
        scene.remove_component::<Velocity>(a);
        let seen: Vec<Entity> = scene
            .view::<(&Transform, &Velocity)>()
            .map(|(entity, _)| entity)
            .collect();
        assert_eq!(seen, vec![b]);
    }

    #[test]
    fn test_view_with_tag_filter() {
        let mut scene = scene();
        let tagged = scene.create((Transform::IDENTITY,));
        let untagged = scene.create((Transform::IDENTITY,));
        scene.set_tag(tagged, Tag(7));
        assert_eq!(scene.tag(untagged), Tag::NONE);
        let seen: Vec<Entity> = scene
            .view::<(&Transform,)>()
            .with_tag(Tag(7))
            .map(|(entity, _)| entity)
            .collect();
        assert_eq!(seen, vec![tagged]);
    }

    #[test]
    #[should_panic(expected = "same component type twice")]
    fn test_view_of_duplicate_type_is_fatal() {
        // The aliasing argument for view fetches requires pairwise-distinct
        // stores, so this must die before any pointer is handed out.
        let mut scene = scene();
        let _ = scene.view::<(&Transform, &mut Transform)>();
    }

    #[test]
    #[should_panic(expected = "no plain dense store")]
    fn test_view_of_parent_links_is_fatal() {
        let mut scene = scene();
        let root = scene.create(());
        let _ = scene.create((Parent(root),));
        let _ = scene.view::<(&Parent,)>();
    }

    #[test]
    #[should_panic(expected = "is not live")]
    fn test_use_after_remove_is_fatal() {
        let mut scene = scene();
        let entity = scene.create((Transform::IDENTITY,));
        scene.remove(entity);
        let _ = scene.get::<Transform>(entity);
    }

    #[test]
    #[should_panic(expected = "create a cycle")]
    fn test_scene_reparent_cycle_is_fatal() {
        let mut scene = scene();
        let root = scene.create(());
        let child = scene.create((Parent(root),));
        scene.set_parent(root, child);
    }
}
