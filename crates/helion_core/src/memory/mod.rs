//! # Working Memory
//!
//! Explicitly owned scratch buffers. Nothing in this crate hides reusable
//! memory in process-wide state; whoever traverses carries the buffers.

mod scratch;

pub use scratch::HierarchyScratch;
