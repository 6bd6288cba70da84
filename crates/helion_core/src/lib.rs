//! # HELION Core
//!
//! Entity/component storage and scene hierarchy for the HELION engine.
//!
//! The design optimises for the per-frame hot path. Component data lives in
//! densely packed sparse sets so systems iterate contiguous memory; each
//! entity carries a 64-bit component mask so membership checks are one
//! comparison; and the hierarchy index keeps every subtree contiguous in its
//! dense arrays so whole-subtree transforms and deletions are linear scans.
//!
//! ```
//! use helion_core::{Parent, Scene, Velocity};
//! use helion_shared::{Transform, Vec3};
//!
//! let mut scene = Scene::builder()
//!     .register::<Transform>()?
//!     .register::<Velocity>()?
//!     .build();
//!
//! let ship = scene.create((Transform::IDENTITY, Velocity::new(0.0, 0.0, 5.0)));
//! let turret = scene.create((Transform::IDENTITY, Parent(ship)));
//!
//! for (_entity, (transform, velocity)) in scene.view::<(&mut Transform, &Velocity)>() {
//!     transform.position += velocity.0 * 0.016;
//! }
//! scene.translate_subtree(ship, Vec3::new(0.0, 1.0, 0.0));
//! assert_eq!(scene.parent(turret), ship);
//! # Ok::<(), helion_core::RegistryError>(())
//! ```
//!
//! # Error Philosophy
//!
//! Scene construction returns [`RegistryError`] for misconfiguration.
//! Everything after that treats a violated invariant (double add, access to
//! a missing component, reparenting into a cycle) as a logic bug: it is
//! logged through `tracing` and the process panics. Hot-path operations do
//! not pay for recoverable error plumbing that no caller could meaningfully
//! recover from mid-frame.
//!
//! # Threading
//!
//! A [`Scene`] is `Send` but not internally synchronised. One scene belongs
//! to one thread at a time; parallelism comes from running independent
//! scenes, not from sharing one.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod ecs;
pub mod error;
pub mod memory;

pub use ecs::{
    Component, ComponentBundle, ComponentMask, ComponentSet, ComponentView, Entity, Fetch,
    HierarchySparseSet, OrphanPolicy, Parent, Query, RenderComponent, Scene, SceneBuilder,
    SparseSet, SparseSetMap, SubtreeIter, SubtreeView, Tag, Velocity, MAX_COMPONENT_TYPES,
};
pub use error::{RegistryError, RegistryResult};
pub use memory::HierarchyScratch;
