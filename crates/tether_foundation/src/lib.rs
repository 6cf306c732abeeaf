//! Entity identity, type registry, and error types for Tether.
//!
//! This crate provides:
//! - [`EntityId`] - Stable entity identifiers (valid across online/offline states)
//! - [`Entity`] / [`EntityRef`] - The opaque host subject a session represents
//! - [`TypeRegistry`] - Process-lifetime integer identities for component and handler types
//! - [`Error`] - Categorized error types with severity classification

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod entity;
pub mod error;
pub mod registry;

pub use entity::{Entity, EntityId, EntityRef};
pub use error::{BoxError, Error, ErrorKind, PersistenceOp, Result, Severity};
pub use registry::{ComponentTypeId, HandlerTypeId, TypeRegistry};
