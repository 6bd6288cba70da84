//! # Hierarchy Traversal Scratch
//!
//! Reusable working memory for the hierarchy index's ancestor-stack walk and
//! for whole-subtree removal. The scene owns exactly one and threads it
//! through every call that traverses, so the buffers are allocated once and
//! reused for the lifetime of the scene.
//!
//! # Thread Safety
//!
//! Not shared state: whoever owns the scratch owns the traversal. Two
//! threads each need their own scratch (and their own scene).

use crate::ecs::Entity;

/// Caller-owned scratch buffers for hierarchy traversal.
#[derive(Default)]
pub struct HierarchyScratch {
    /// Ancestor stack for the subtree-end walk.
    pub(crate) ancestors: Vec<Entity>,
    /// Staging buffer for entities drained by whole-subtree removal.
    pub(crate) drained: Vec<Entity>,
}

impl HierarchyScratch {
    /// Creates scratch with empty buffers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates scratch sized for trees up to `depth` levels deep.
    #[must_use]
    pub fn with_depth(depth: usize) -> Self {
        Self {
            ancestors: Vec::with_capacity(depth),
            drained: Vec::new(),
        }
    }

    /// Retained capacity of the ancestor stack, in entities.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.ancestors.capacity()
    }

    /// Hands the drain buffer back after a whole-subtree removal so its
    /// allocation is reused by the next one.
    #[inline]
    pub fn restore_drained(&mut self, mut drained: Vec<Entity>) {
        drained.clear();
        self.drained = drained;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scratch_retains_capacity() {
        let scratch = HierarchyScratch::with_depth(64);
        assert!(scratch.capacity() >= 64);
    }
}
