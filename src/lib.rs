//! Tether - Entity-session runtime
//!
//! This crate re-exports both layers of the Tether system for convenient
//! access. For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 1: tether_runtime    — Sessions, handlers, providers, queries
//! Layer 0: tether_foundation — Core types (EntityId, Error, TypeRegistry)
//! ```

pub use tether_foundation as foundation;
pub use tether_runtime as runtime;

pub use tether_foundation::{
    BoxError, Entity, EntityId, EntityRef, Error, ErrorKind, Result, Severity,
};
pub use tether_runtime::{
    Activation, AnyComponent, Comp, Component, ComponentProvider, ComponentSet, Event, EventCap,
    EventKind, Handler, HandlerSpec, Manager, ManagerBuilder, Opt, Provider, QueryFn, Req,
    Session, With, caps,
};
