//! Handler declarations, compiled handler metadata, and per-dispatch
//! activations.
//!
//! A handler is a stateless unit of event-reaction logic registered once
//! per type. Instead of introspecting struct fields, each handler type
//! describes itself with a [`HandlerSpec`]: which component types gate its
//! activation (required or optional), which context slots it wants bound,
//! and which events it declares capability for.

use std::any::TypeId;
use std::sync::Arc;

use tether_foundation::{ComponentTypeId, EntityRef};

use crate::component::{Comp, Component, SharedComponent};
use crate::event::{Event, EventCap};
use crate::manager::Manager;
use crate::session::Session;

/// Declarative description of a handler type, supplied at registration.
#[derive(Debug, Default)]
pub struct HandlerSpec {
    pub(crate) queries: Vec<QuerySpec>,
    pub(crate) wants_entity: bool,
    pub(crate) wants_session: bool,
    pub(crate) wants_manager: bool,
    pub(crate) caps: Vec<EventCap>,
}

#[derive(Debug)]
pub(crate) struct QuerySpec {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) required: bool,
}

impl HandlerSpec {
    /// Creates an empty spec.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares a required component query: the handler only activates when
    /// a component of type `C` is present, and the value is bound.
    #[must_use]
    pub fn requires<C: Component>(mut self) -> Self {
        self.queries.push(QuerySpec {
            type_id: TypeId::of::<C>(),
            type_name: std::any::type_name::<C>(),
            required: true,
        });
        self
    }

    /// Declares an optional component query: the value is bound when
    /// present, otherwise the slot is left absent.
    #[must_use]
    pub fn optional<C: Component>(mut self) -> Self {
        self.queries.push(QuerySpec {
            type_id: TypeId::of::<C>(),
            type_name: std::any::type_name::<C>(),
            required: false,
        });
        self
    }

    /// Requests the entity reference context slot.
    #[must_use]
    pub fn with_entity(mut self) -> Self {
        self.wants_entity = true;
        self
    }

    /// Requests the session context slot.
    #[must_use]
    pub fn with_session(mut self) -> Self {
        self.wants_session = true;
        self
    }

    /// Requests the manager context slot.
    #[must_use]
    pub fn with_manager(mut self) -> Self {
        self.wants_manager = true;
        self
    }

    /// Declares capability for one event. Declaring the same kind twice is
    /// accepted and deduplicated.
    #[must_use]
    pub fn handles(mut self, cap: EventCap) -> Self {
        self.caps.push(cap);
        self
    }
}

/// A stateless, declaratively-gated unit of event-reaction logic.
///
/// The instance passed at registration doubles as the callee; per-dispatch
/// state lives in the freshly-bound [`Activation`], never in the handler.
pub trait Handler: Send + Sync + 'static {
    /// Describes this handler type's component gates, context slots, and
    /// event capabilities.
    fn spec() -> HandlerSpec
    where
        Self: Sized;

    /// Reacts to one event. Only called when every required component query
    /// was satisfied against the session's store.
    ///
    /// Runs while the session store is read-locked: component contents may
    /// be mutated through the bound handles, but the callback must not
    /// insert, set, or remove components on the same session.
    fn handle(&self, event: &Event<'_>, cx: &Activation<'_>);
}

/// A handler's component query, compiled against the type registry.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ComponentQuery {
    pub(crate) component: ComponentTypeId,
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) required: bool,
}

/// Compiled registration-time metadata for one handler type.
pub(crate) struct HandlerInfo {
    pub(crate) name: &'static str,
    pub(crate) handler: Arc<dyn Handler>,
    pub(crate) queries: Vec<ComponentQuery>,
    pub(crate) wants_entity: bool,
    pub(crate) wants_session: bool,
    pub(crate) wants_manager: bool,
}

/// The per-dispatch, freshly bound view a handler callback receives.
///
/// Holds the satisfied component query cells and whichever context slots
/// the handler declared and were available.
pub struct Activation<'a> {
    info: &'a HandlerInfo,
    slots: Vec<Option<SharedComponent>>,
    entity: Option<EntityRef>,
    session: Option<Arc<Session>>,
    manager: Option<Arc<Manager>>,
}

impl<'a> Activation<'a> {
    pub(crate) fn new(
        info: &'a HandlerInfo,
        slots: Vec<Option<SharedComponent>>,
        entity: Option<EntityRef>,
        session: Option<Arc<Session>>,
        manager: Option<Arc<Manager>>,
    ) -> Self {
        Self {
            info,
            slots,
            entity,
            session,
            manager,
        }
    }

    /// Returns the bound handle for a declared required query.
    ///
    /// # Panics
    ///
    /// Panics if the handler's spec did not declare a query for `C`, or
    /// declared it optional (use [`Activation::optional`]); both indicate a
    /// handler bug, and access fails closed.
    #[must_use]
    pub fn component<C: Component>(&self) -> Comp<C> {
        let (index, query) = self
            .query_for::<C>()
            .unwrap_or_else(|| panic!("handler {} did not declare a query for {}", self.info.name, std::any::type_name::<C>()));
        assert!(
            query.required,
            "handler {} declared {} as optional; use Activation::optional",
            self.info.name, query.type_name
        );
        let cell = self.slots[index]
            .clone()
            .expect("required query slot left unbound");
        Comp::new(cell)
    }

    /// Returns the bound handle for a declared optional query, or `None`
    /// when the component was absent at dispatch time.
    ///
    /// # Panics
    ///
    /// Panics if the handler's spec did not declare a query for `C`.
    #[must_use]
    pub fn optional<C: Component>(&self) -> Option<Comp<C>> {
        let (index, _) = self
            .query_for::<C>()
            .unwrap_or_else(|| panic!("handler {} did not declare a query for {}", self.info.name, std::any::type_name::<C>()));
        self.slots[index].clone().map(Comp::new)
    }

    /// The entity reference, when the slot was declared and the entity is
    /// attached.
    #[must_use]
    pub fn entity(&self) -> Option<&EntityRef> {
        self.entity.as_ref()
    }

    /// The session, when the slot was declared.
    #[must_use]
    pub fn session(&self) -> Option<&Arc<Session>> {
        self.session.as_ref()
    }

    /// The manager, when the slot was declared.
    #[must_use]
    pub fn manager(&self) -> Option<&Arc<Manager>> {
        self.manager.as_ref()
    }

    fn query_for<C: Component>(&self) -> Option<(usize, &ComponentQuery)> {
        let type_id = TypeId::of::<C>();
        self.info
            .queries
            .iter()
            .enumerate()
            .find(|(_, q)| q.type_id == type_id)
    }
}
