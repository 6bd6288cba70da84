//! Opaque GPU resource handles.
//!
//! The scene core stores these inside components but never interprets them;
//! only the rendering backend knows what they point at.

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// Handle to a mesh owned by the rendering backend.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize)]
pub struct MeshHandle(pub u32);

impl MeshHandle {
    /// Handle that refers to no mesh.
    pub const INVALID: Self = Self(u32::MAX);

    /// Checks whether this handle refers to a mesh at all.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl Default for MeshHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Handle to a material owned by the rendering backend.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Pod, Zeroable, Serialize, Deserialize)]
pub struct MaterialHandle(pub u32);

impl MaterialHandle {
    /// Handle that refers to no material.
    pub const INVALID: Self = Self(u32::MAX);

    /// Checks whether this handle refers to a material at all.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != u32::MAX
    }
}

impl Default for MaterialHandle {
    fn default() -> Self {
        Self::INVALID
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handle_validity() {
        assert!(!MeshHandle::INVALID.is_valid());
        assert!(MeshHandle(0).is_valid());
        assert!(!MaterialHandle::default().is_valid());
    }
}
