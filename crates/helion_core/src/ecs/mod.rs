//! # Entity/Component Storage and Scene Hierarchy
//!
//! A sparse-set store per component type, a per-entity mask for constant-time
//! membership tests, a hierarchy index whose dense order keeps every subtree
//! contiguous, and the [`Scene`] facade tying them together.

mod component;
mod entity;
mod hierarchy;
mod registry;
mod scene;
mod sparse;
mod view;

pub use component::{Component, Parent, RenderComponent, Velocity};
pub use entity::{ComponentMask, Entity, Tag, MAX_COMPONENT_TYPES};
pub use hierarchy::{HierarchySparseSet, OrphanPolicy};
pub use registry::SparseSetMap;
pub use scene::{ComponentBundle, ComponentSet, Scene, SceneBuilder};
pub use sparse::SparseSet;
pub use view::{ComponentView, Fetch, Query, SubtreeIter, SubtreeView};
