//! # HELION Shared
//!
//! Common types used by the scene core and the engine crates around it.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on:
//! - `wgpu`
//! - `raw-window-handle`
//! - Any GPU or window-related crate
//!
//! If you need graphics types, put them in the rendering crate.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod handle;
pub mod math;

pub use handle::{MaterialHandle, MeshHandle};
pub use math::{Quaternion, Transform, Vec3};
