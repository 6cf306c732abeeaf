//! Tether runtime: sessions, handlers, providers, and queries.
//!
//! The runtime attaches typed components to long-lived entities, dispatches
//! lifecycle events to component-gated handlers, and runs ad hoc queries
//! against live sessions or provider-backed persisted state.
//!
//! Layering (leaves first):
//! - [`component`]: typed component values and type-erased storage cells
//! - [`provider`]: per-component-type load/save collaborators
//! - [`event`]: the lifecycle event catalogue and capability tokens
//! - [`handler`]: handler specs, compiled handler metadata, activations
//! - [`query`]: parameter-typed ad hoc queries
//! - [`session`]: the live per-entity store and dispatch entry points
//! - [`manager`]: construction, the session table, and by-id queries

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod component;
pub mod event;
pub mod handler;
pub mod manager;
pub mod provider;
pub mod query;
pub mod session;

pub use component::{AnyComponent, Comp, Component, ComponentSet, SharedComponent};
pub use event::{Event, EventCap, EventKind, caps};
pub use handler::{Activation, Handler, HandlerSpec};
pub use manager::{Manager, ManagerBuilder};
pub use provider::{ComponentProvider, Provider};
pub use query::{Opt, ParamMode, ParamSpec, QueryFn, QueryParam, QueryPlan, Req, With};
pub use session::Session;
