//! # Scene Construction Errors
//!
//! The only recoverable errors in this crate. Everything on the per-frame
//! hot path treats invariant violations as fatal (see the crate docs);
//! registration happens once at startup, so it gets a proper error type.

use thiserror::Error;

/// Errors that can occur while registering component types.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// The same component type was registered twice.
    #[error("component type {0} is already registered")]
    AlreadyRegistered(&'static str),

    /// The mask has no free bits left.
    #[error("component registry is full: at most {limit} component types")]
    TooManyComponents {
        /// The registration limit, including the built-in hierarchy type.
        limit: usize,
    },

    /// The type is built in and registered automatically.
    #[error("component type {0} is built in and cannot be registered")]
    Reserved(&'static str),
}

/// Result type for registration.
pub type RegistryResult<T> = Result<T, RegistryError>;
