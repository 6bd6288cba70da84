//! # Hierarchy Index
//!
//! A sparse set specialised for parent links. Unlike [`SparseSet`], the dense
//! arrays are kept in pre-order: a node at dense index `i` with `k`
//! descendants occupies exactly `[i + 1, i + k]`. Every subtree operation is
//! therefore a scan or rotation over one contiguous range, which is what makes
//! whole-subtree transforms and deletions cheap enough for per-frame use.
//!
//! The price is that inserts and reparents shift dense indices around, so the
//! lookup table is repaired after every structural edit. Dense indices into
//! this set must never be cached across edits.
//!
//! [`SparseSet`]: super::sparse::SparseSet

use crate::ecs::component::Parent;
use crate::ecs::entity::Entity;
use crate::ecs::sparse::PageTable;
use crate::ecs::view::SubtreeView;
use crate::memory::HierarchyScratch;

/// What happens to a parent that loses its last child and has no parent of
/// its own.
///
/// With [`OrphanPolicy::Prune`] such a node is dropped from the index
/// entirely: a childless root carries no structural information, and pruning
/// it keeps the dense arrays from accumulating stale singletons. Detached
/// entities themselves are unaffected; only the *previous* parent of a
/// reparented entity is ever pruned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrphanPolicy {
    /// Drop childless, parentless nodes from the index after a reparent.
    #[default]
    Prune,
    /// Keep every node until it is removed explicitly.
    Keep,
}

/// Dense parent-link storage ordered so that every subtree is contiguous.
///
/// Structural edits go through [`set_parent`]; the plain [`remove`] only
/// accepts leaves, since removing an interior node would orphan its
/// descendants silently.
///
/// [`set_parent`]: HierarchySparseSet::set_parent
/// [`remove`]: HierarchySparseSet::remove
#[derive(Debug, Default)]
pub struct HierarchySparseSet {
    /// Entities in pre-order. A node's descendants follow it immediately.
    entities: Vec<Entity>,
    /// Parent link for the entity at the same dense index.
    parents: Vec<Parent>,
    /// Entity id to dense index.
    lookup: PageTable,
    policy: OrphanPolicy,
}

impl HierarchySparseSet {
    /// Creates an empty index with the given orphan policy.
    #[must_use]
    pub fn new(policy: OrphanPolicy) -> Self {
        Self {
            entities: Vec::new(),
            parents: Vec::new(),
            lookup: PageTable::default(),
            policy,
        }
    }

    /// Number of entities tracked by the index.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns `true` if no entity is tracked.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// The orphan policy this index was built with.
    #[inline]
    #[must_use]
    pub fn policy(&self) -> OrphanPolicy {
        self.policy
    }

    /// Changes the orphan policy. Only callable before the scene is built.
    pub(crate) fn set_policy(&mut self, policy: OrphanPolicy) {
        debug_assert!(self.is_empty());
        self.policy = policy;
    }

    /// Returns `true` if `entity` is tracked by the index.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.lookup.get(entity).is_some()
    }

    /// Dense index of `entity`, if tracked. Invalidated by structural edits.
    #[inline]
    #[must_use]
    pub fn dense_index(&self, entity: Entity) -> Option<usize> {
        self.lookup.get(entity).map(|i| i as usize)
    }

    /// The tracked entities in pre-order.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Parent link of `entity`.
    ///
    /// # Panics
    ///
    /// Fatal if `entity` is not tracked.
    #[must_use]
    pub fn get(&self, entity: Entity) -> &Parent {
        match self.lookup.get(entity) {
            Some(i) => &self.parents[i as usize],
            None => untracked(entity),
        }
    }

    /// Parent of `entity`, or `None` if `entity` is not tracked. A tracked
    /// root reports `Some(Entity::INVALID)`.
    #[inline]
    #[must_use]
    pub fn try_parent(&self, entity: Entity) -> Option<Entity> {
        self.lookup
            .get(entity)
            .map(|i| self.parents[i as usize].0)
    }

    /// Returns `true` if `entity` has no children. An untracked entity is
    /// trivially a leaf.
    #[must_use]
    pub fn is_leaf(&self, entity: Entity) -> bool {
        match self.lookup.get(entity) {
            None => true,
            // Pre-order: if a first child exists it sits directly after us.
            Some(i) => {
                let i = i as usize;
                i + 1 == self.entities.len() || self.parents[i + 1].0 != entity
            }
        }
    }

    /// First child of `entity`, or `None` if `entity` is a leaf or untracked.
    #[must_use]
    pub fn first_child(&self, entity: Entity) -> Option<Entity> {
        let i = self.lookup.get(entity)? as usize;
        if i + 1 < self.entities.len() && self.parents[i + 1].0 == entity {
            Some(self.entities[i + 1])
        } else {
            None
        }
    }

    /// One-past-the-end dense index of the subtree rooted at dense index
    /// `start`.
    ///
    /// Walks forward maintaining the stack of ancestors currently open; a
    /// node whose parent is not on the stack closes the subtree. Linear in
    /// the subtree size, constant extra memory beyond `scratch`.
    #[must_use]
    pub fn subtree_end(&self, start: usize, scratch: &mut HierarchyScratch) -> usize {
        debug_assert!(start < self.entities.len());
        let stack = &mut scratch.ancestors;
        stack.clear();
        stack.push(self.entities[start]);
        let mut i = start + 1;
        while i < self.entities.len() {
            let parent = self.parents[i].0;
            while let Some(&top) = stack.last() {
                if top == parent {
                    break;
                }
                stack.pop();
            }
            if stack.is_empty() {
                break;
            }
            stack.push(self.entities[i]);
            i += 1;
        }
        i
    }

    /// Registers `entity` under `parent`, or as a root if `parent` is
    /// invalid. Children insert directly after their parent, so the newest
    /// child enumerates first.
    ///
    /// # Panics
    ///
    /// Fatal if `entity` is invalid or already tracked, or if `parent` is
    /// valid but untracked. [`set_parent`] registers missing parents
    /// automatically; this method does not.
    ///
    /// [`set_parent`]: HierarchySparseSet::set_parent
    pub fn add(&mut self, entity: Entity, parent: Entity) {
        if entity.is_invalid() {
            tracing::error!("attempted to add the invalid entity to the hierarchy");
            panic!("cannot add the invalid entity to the hierarchy");
        }
        if self.contains(entity) {
            tracing::error!(%entity, "double hierarchy add");
            panic!("{entity} is already tracked by the hierarchy");
        }
        let at = if parent.is_invalid() {
            self.entities.len()
        } else {
            match self.lookup.get(parent) {
                Some(i) => i as usize + 1,
                None => untracked(parent),
            }
        };
        self.entities.insert(at, entity);
        self.parents.insert(at, Parent(parent));
        self.repair_lookup(at);
    }

    /// Removes a leaf from the index.
    ///
    /// # Panics
    ///
    /// Fatal if `entity` is untracked or still has children. Use
    /// [`remove_subtree`] to delete a node together with its descendants, or
    /// detach the children first.
    ///
    /// [`remove_subtree`]: HierarchySparseSet::remove_subtree
    pub fn remove(&mut self, entity: Entity) {
        let Some(i) = self.dense_index(entity) else {
            untracked(entity);
        };
        if !self.is_leaf(entity) {
            tracing::error!(%entity, "hierarchy remove on an interior node");
            panic!("{entity} still has children; detach them or remove the subtree");
        }
        self.remove_at(i);
    }

    /// Moves `entity` (and its whole subtree) under `new_parent`.
    ///
    /// Untracked endpoints are registered on the fly: an untracked
    /// `new_parent` becomes a root, an untracked `entity` is simply added. If
    /// `new_parent` is invalid a leaf is dropped from the index entirely,
    /// while an interior node moves to the end of the dense arrays as a new
    /// root. Afterwards the previous parent is pruned if the policy says so.
    ///
    /// The move itself is two slice rotations over the span between the old
    /// and new positions, followed by a lookup repair over the same span.
    ///
    /// # Panics
    ///
    /// Fatal if `entity` is invalid, or if `new_parent` lies inside the
    /// subtree rooted at `entity` (the edit would create a cycle).
    pub fn set_parent(&mut self, entity: Entity, new_parent: Entity, scratch: &mut HierarchyScratch) {
        if entity.is_invalid() {
            tracing::error!("attempted to reparent the invalid entity");
            panic!("cannot reparent the invalid entity");
        }
        if entity == new_parent {
            cycle(entity, new_parent);
        }
        let Some(cur) = self.dense_index(entity) else {
            if !new_parent.is_invalid() && !self.contains(new_parent) {
                self.add(new_parent, Entity::INVALID);
            }
            self.add(entity, new_parent);
            return;
        };
        let old_parent = self.parents[cur].0;
        if new_parent.is_invalid() && self.is_leaf(entity) {
            // A detached leaf carries no structure; drop it outright. This
            // applies to roots too, so it must run before the no-op check.
            self.remove_at(cur);
            self.prune_orphan(old_parent);
            return;
        }
        if old_parent == new_parent {
            return;
        }
        if !new_parent.is_invalid() && !self.contains(new_parent) {
            // Appended at the end, so `cur` stays valid.
            self.add(new_parent, Entity::INVALID);
        }

        let end = self.subtree_end(cur, scratch);
        let n = end - cur;
        let affected = if new_parent.is_invalid() {
            // Interior node detaching: its subtree becomes the last root.
            let len = self.entities.len();
            self.entities[cur..len].rotate_left(n);
            self.parents[cur..len].rotate_left(n);
            cur..len
        } else {
            let ip = self.dense_index(new_parent).unwrap_or_else(|| untracked(new_parent));
            if cur <= ip && ip < end {
                cycle(entity, new_parent);
            }
            if ip < cur {
                // Subtree slides left, landing right after the new parent.
                self.entities[ip + 1..end].rotate_right(n);
                self.parents[ip + 1..end].rotate_right(n);
                ip + 1..end
            } else {
                // Subtree slides right; the gap between closes up behind it.
                self.entities[cur..=ip].rotate_left(n);
                self.parents[cur..=ip].rotate_left(n);
                cur..ip + 1
            }
        };
        for i in affected {
            self.lookup.set(self.entities[i], i as u32);
        }
        let idx = self
            .dense_index(entity)
            .unwrap_or_else(|| untracked(entity));
        self.parents[idx] = Parent(new_parent);
        self.prune_orphan(old_parent);
    }

    /// Removes `root` and its entire subtree, returning the removed entities
    /// in pre-order. An untracked `root` yields an empty list.
    ///
    /// The returned vector is taken from `scratch` to avoid an allocation;
    /// hand it back via [`HierarchyScratch::restore_drained`] when done.
    #[must_use]
    pub fn remove_subtree(&mut self, root: Entity, scratch: &mut HierarchyScratch) -> Vec<Entity> {
        let mut out = std::mem::take(&mut scratch.drained);
        out.clear();
        let Some(start) = self.dense_index(root) else {
            return out;
        };
        let end = self.subtree_end(start, scratch);
        out.extend(self.entities.drain(start..end));
        self.parents.drain(start..end);
        for &entity in &out {
            self.lookup.clear(entity);
        }
        self.repair_lookup(start);
        out
    }

    /// The subtree rooted at `entity` as a borrowed pre-order view.
    ///
    /// An untracked entity yields a one-element view of itself: an entity
    /// outside the hierarchy is its own trivial subtree.
    #[must_use]
    pub fn subtree<'a>(&'a self, entity: Entity, scratch: &mut HierarchyScratch) -> SubtreeView<'a> {
        match self.dense_index(entity) {
            Some(i) => {
                let end = self.subtree_end(i, scratch);
                SubtreeView::over(&self.entities[i..end])
            }
            None => SubtreeView::single(entity),
        }
    }

    fn remove_at(&mut self, i: usize) {
        let entity = self.entities.remove(i);
        self.parents.remove(i);
        self.lookup.clear(entity);
        self.repair_lookup(i);
    }

    /// Reassigns lookup entries for every dense slot from `from` onward.
    fn repair_lookup(&mut self, from: usize) {
        for i in from..self.entities.len() {
            self.lookup.set(self.entities[i], i as u32);
        }
    }

    /// Drops `prev` from the index if it ended up childless and parentless.
    fn prune_orphan(&mut self, prev: Entity) {
        if self.policy == OrphanPolicy::Keep || prev.is_invalid() {
            return;
        }
        if let Some(i) = self.dense_index(prev) {
            if self.parents[i].0.is_invalid() && self.is_leaf(prev) {
                tracing::debug!(entity = %prev, "pruning orphaned hierarchy root");
                self.remove_at(i);
            }
        }
    }
}

#[cold]
#[inline(never)]
fn untracked(entity: Entity) -> ! {
    tracing::error!(%entity, "hierarchy operation on an untracked entity");
    panic!("{entity} is not tracked by the hierarchy");
}

#[cold]
#[inline(never)]
fn cycle(entity: Entity, new_parent: Entity) -> ! {
    tracing::error!(%entity, parent = %new_parent, "reparent would create a cycle");
    panic!("reparenting {entity} under {new_parent} would create a cycle");
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn e(id: u32) -> Entity {
        Entity::from_raw(id)
    }

    /// Builds the index from (entity, parent) pairs in order.
    fn build(policy: OrphanPolicy, edges: &[(u32, u32)]) -> (HierarchySparseSet, HierarchyScratch) {
        let mut h = HierarchySparseSet::new(policy);
        let mut scratch = HierarchyScratch::new();
        for &(child, parent) in edges {
            let parent = if parent == u32::MAX { Entity::INVALID } else { e(parent) };
            h.set_parent(e(child), parent, &mut scratch);
        }
        (h, scratch)
    }

    fn order(h: &HierarchySparseSet) -> Vec<u32> {
        h.entities().iter().map(|e| e.id()).collect()
    }

    /// Every node's descendants must follow it contiguously.
    fn assert_preorder(h: &HierarchySparseSet, scratch: &mut HierarchyScratch) {
        for i in 0..h.len() {
            let end = h.subtree_end(i, scratch);
            let root = h.entities()[i];
            for j in 0..h.len() {
                let mut anc = h.entities()[j];
                let mut is_descendant = false;
                while !anc.is_invalid() {
                    if anc == root {
                        is_descendant = true;
                        break;
                    }
                    anc = h.try_parent(anc).unwrap_or(Entity::INVALID);
                }
                assert_eq!(
                    is_descendant,
                    j >= i && j < end,
                    "contiguity broken at dense index {j} for root {root}"
                );
            }
        }
    }

    #[test]
    fn test_child_inserts_directly_after_parent() {
        // 1 root, 2 under 1, 3 under 1, 4 under 2. Newest child first.
        let (h, mut scratch) =
            build(OrphanPolicy::Keep, &[(1, u32::MAX), (2, 1), (3, 1), (4, 2)]);
        assert_eq!(order(&h), vec![1, 3, 2, 4]);
        assert_preorder(&h, &mut scratch);
        assert_eq!(h.subtree_end(0, &mut scratch), 4);
        assert_eq!(h.subtree_end(2, &mut scratch), 4); // subtree of 2 is {2, 4}
        assert!(h.is_leaf(e(3)));
        assert!(h.is_leaf(e(4)));
        assert!(!h.is_leaf(e(1)));
        assert_eq!(h.first_child(e(1)), Some(e(3)));
    }

    #[test]
    fn test_set_parent_auto_registers_both_endpoints() {
        let mut h = HierarchySparseSet::new(OrphanPolicy::Keep);
        let mut scratch = HierarchyScratch::new();
        h.set_parent(e(7), e(3), &mut scratch);
        assert_eq!(order(&h), vec![3, 7]);
        assert_eq!(h.try_parent(e(3)), Some(Entity::INVALID));
        assert_eq!(h.try_parent(e(7)), Some(e(3)));
    }

    #[test]
    fn test_reparent_moves_whole_subtree() {
        let (mut h, mut scratch) =
            build(OrphanPolicy::Keep, &[(1, u32::MAX), (2, 1), (3, 1), (4, 2), (5, u32::MAX)]);
        assert_eq!(order(&h), vec![1, 3, 2, 4, 5]);
        // Move {2, 4} under 5: subtree slides right past the gap.
        h.set_parent(e(2), e(5), &mut scratch);
        assert_eq!(order(&h), vec![1, 3, 5, 2, 4]);
        assert_eq!(h.try_parent(e(2)), Some(e(5)));
        assert_eq!(h.try_parent(e(4)), Some(e(2)));
        assert_preorder(&h, &mut scratch);
        // And back under 1: subtree slides left this time.
        h.set_parent(e(2), e(1), &mut scratch);
        assert_eq!(h.try_parent(e(2)), Some(e(1)));
        assert_preorder(&h, &mut scratch);
    }

    #[test]
    fn test_detach_interior_node_becomes_last_root() {
        let (mut h, mut scratch) =
            build(OrphanPolicy::Keep, &[(1, u32::MAX), (2, 1), (4, 2)]);
        h.set_parent(e(2), Entity::INVALID, &mut scratch);
        assert_eq!(order(&h), vec![1, 2, 4]);
        assert_eq!(h.try_parent(e(2)), Some(Entity::INVALID));
        assert_eq!(h.try_parent(e(4)), Some(e(2)));
        assert_preorder(&h, &mut scratch);
    }

    #[test]
    fn test_detached_leaf_is_dropped() {
        let (mut h, mut scratch) = build(OrphanPolicy::Keep, &[(1, u32::MAX), (2, 1)]);
        h.set_parent(e(2), Entity::INVALID, &mut scratch);
        assert!(!h.contains(e(2)));
        assert!(h.contains(e(1)));
    }

    #[test]
    fn test_detaching_a_childless_root_drops_it() {
        // Already parentless, but detaching must still remove the entry so
        // teardown never leaves a stale node behind.
        let (mut h, mut scratch) = build(OrphanPolicy::Keep, &[(1, u32::MAX)]);
        h.set_parent(e(1), Entity::INVALID, &mut scratch);
        assert!(!h.contains(e(1)));
    }

    #[test]
    fn test_orphan_pruning_follows_policy() {
        let (mut h, mut scratch) = build(OrphanPolicy::Prune, &[(1, u32::MAX), (2, 1)]);
        h.set_parent(e(2), Entity::INVALID, &mut scratch);
        // 1 lost its only child and has no parent itself.
        assert!(!h.contains(e(1)));
        assert!(h.is_empty());

        let (mut h, mut scratch) = build(OrphanPolicy::Keep, &[(1, u32::MAX), (2, 1)]);
        h.set_parent(e(2), Entity::INVALID, &mut scratch);
        assert!(h.contains(e(1)));
    }

    #[test]
    fn test_pruning_spares_parented_and_non_leaf_nodes() {
        // 2 keeps a second child, 3 keeps its own parent.
        let (mut h, mut scratch) =
            build(OrphanPolicy::Prune, &[(1, u32::MAX), (2, 1), (4, 2), (5, 2)]);
        h.set_parent(e(5), Entity::INVALID, &mut scratch);
        assert!(h.contains(e(2))); // still has child 4
        h.set_parent(e(4), Entity::INVALID, &mut scratch);
        assert!(h.contains(e(2))); // childless but parented under 1
    }

    #[test]
    fn test_remove_subtree_drains_range_in_preorder() {
        let (mut h, mut scratch) = build(
            OrphanPolicy::Keep,
            &[(0, u32::MAX), (1, 0), (2, 1), (3, 1), (4, 0)],
        );
        assert_eq!(order(&h), vec![0, 4, 1, 3, 2]);
        let drained = h.remove_subtree(e(1), &mut scratch);
        assert_eq!(
            drained.iter().map(|e| e.id()).collect::<Vec<_>>(),
            vec![1, 3, 2]
        );
        assert_eq!(order(&h), vec![0, 4]);
        assert_eq!(h.try_parent(e(4)), Some(e(0)));
        assert!(!h.contains(e(2)));
        scratch.restore_drained(drained);
        assert_preorder(&h, &mut scratch);
    }

    #[test]
    fn test_subtree_view_of_untracked_entity_is_itself() {
        let h = HierarchySparseSet::new(OrphanPolicy::Prune);
        let mut scratch = HierarchyScratch::new();
        let view = h.subtree(e(9), &mut scratch);
        assert_eq!(view.iter().collect::<Vec<_>>(), vec![e(9)]);
    }

    #[test]
    #[should_panic(expected = "still has children")]
    fn test_remove_rejects_interior_nodes() {
        let (mut h, _) = build(OrphanPolicy::Keep, &[(1, u32::MAX), (2, 1)]);
        h.remove(e(1));
    }

    #[test]
    #[should_panic(expected = "create a cycle")]
    fn test_reparent_under_own_descendant_is_fatal() {
        let (mut h, mut scratch) =
            build(OrphanPolicy::Keep, &[(1, u32::MAX), (2, 1), (4, 2)]);
        h.set_parent(e(1), e(4), &mut scratch);
    }

    #[test]
    #[should_panic(expected = "create a cycle")]
    fn test_self_parent_is_fatal() {
        let (mut h, mut scratch) = build(OrphanPolicy::Keep, &[(1, u32::MAX)]);
        h.set_parent(e(1), e(1), &mut scratch);
    }
}
