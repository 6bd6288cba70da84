//! # Component Contract and Boundary Payloads
//!
//! Components are pure data attached to entities and stored in dense,
//! per-type arrays. The payload types at the engine boundary live here too:
//! the core stores them but never interprets them.
//!
//! Unlike a lazily numbered scheme, a component type gets its mask bit from
//! the registry at scene construction ([`SceneBuilder`](crate::SceneBuilder)
//! registration order), so bit layout never depends on call order.

use bytemuck::{Pod, Zeroable};
use helion_shared::{MaterialHandle, MeshHandle, Transform, Vec3};

use super::entity::Entity;

/// Marker trait for scene components.
///
/// Components must be:
/// - `Copy`: no heap allocations, bitwise movable under swap-remove
/// - `Pod` / `Zeroable`: plain old data, safe in pre-allocated storage
/// - `Default`: required by bulk clears and scratch initialization
pub trait Component: Copy + Pod + Zeroable + Default + Send + Sync + 'static {}

/// Hierarchy payload: the parent entity, or [`Entity::INVALID`] for a root.
///
/// This is the one component the registry routes to the hierarchy index
/// instead of a plain dense store, because removing it has structural side
/// effects (see [`HierarchySparseSet`](crate::HierarchySparseSet)).
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Pod, Zeroable)]
pub struct Parent(pub Entity);

impl Parent {
    /// A root node: no parent.
    pub const ROOT: Self = Self(Entity::INVALID);

    /// Checks if this payload marks a root.
    #[inline]
    #[must_use]
    pub const fn is_root(self) -> bool {
        self.0.is_invalid()
    }
}

impl Default for Parent {
    fn default() -> Self {
        Self::ROOT
    }
}

impl Component for Parent {}

impl Component for Transform {}

/// Velocity in world units per second.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Velocity(pub Vec3);

impl Velocity {
    /// Creates a new velocity.
    #[inline]
    #[must_use]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self(Vec3::new(x, y, z))
    }
}

impl Component for Velocity {}

/// Renderable payload: opaque handles into the rendering backend.
///
/// The scene core stores and hands these out untouched; only the renderer
/// resolves them.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct RenderComponent {
    /// Mesh to draw.
    pub mesh: MeshHandle,
    /// Material to draw it with.
    pub material: MaterialHandle,
}

impl RenderComponent {
    /// Creates a renderable from backend handles.
    #[inline]
    #[must_use]
    pub const fn new(mesh: MeshHandle, material: MaterialHandle) -> Self {
        Self { mesh, material }
    }
}

impl Component for RenderComponent {}
