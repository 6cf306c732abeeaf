//! The manager: handler registry, provider table, session table, and the
//! by-id/all-session query entry points.

use std::any::{TypeId, type_name};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, trace, warn};

use tether_foundation::{
    ComponentTypeId, EntityId, EntityRef, Error, HandlerTypeId, Result, TypeRegistry,
};

use crate::component::{ComponentSet, shared_cell};
use crate::event::EventKind;
use crate::handler::{ComponentQuery, Handler, HandlerInfo, HandlerSpec};
use crate::provider::Provider;
use crate::query::{ParamMode, PlanParam, QueryFn, QueryPlan};
use crate::session::Session;

/// Owns the type registry, the compiled handler registry, the provider
/// table, and the table of live sessions.
///
/// Handlers and providers are fixed at construction; sessions come and go
/// via [`Manager::accept`] and [`Session::quit`]. The handler and provider
/// tables are immutable after [`ManagerBuilder::build`], so dispatch reads
/// them without synchronization.
pub struct Manager {
    registry: RwLock<TypeRegistry>,
    handlers: Vec<HandlerInfo>,
    event_index: HashMap<EventKind, Vec<HandlerTypeId>>,
    providers: HashMap<ComponentTypeId, Provider>,
    sessions: RwLock<HashMap<EntityId, Arc<Session>>>,
}

impl Manager {
    /// Starts building a manager.
    #[must_use]
    pub fn builder() -> ManagerBuilder {
        ManagerBuilder::default()
    }

    /// Creates a session for an entity and attaches its initial components.
    ///
    /// Initial components go through the same path as
    /// [`Session::insert_component`], provider loads included, in the order
    /// given. The session becomes visible to dispatch and queries only once
    /// every initial insert succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::SessionExists`] when the entity already has a
    /// live session, and any error from inserting an initial component, in
    /// which case no session is published.
    ///
    /// [`ErrorKind::SessionExists`]: tether_foundation::ErrorKind::SessionExists
    pub fn accept(
        self: &Arc<Self>,
        entity: EntityRef,
        components: ComponentSet,
    ) -> Result<Arc<Session>> {
        let id = entity.id();
        let mut sessions = self.sessions.write();
        if sessions.contains_key(&id) {
            return Err(Error::session_exists(id));
        }

        let manager = Arc::downgrade(self);
        let session =
            Arc::new_cyclic(|weak| Session::new(id, manager, weak.clone(), Some(entity)));
        for item in components.items {
            session.insert_erased(item)?;
        }

        debug!(entity = %id, "session accepted");
        sessions.insert(id, Arc::clone(&session));
        Ok(session)
    }

    /// Looks up the live session for an entity.
    #[must_use]
    pub fn session(&self, id: EntityId) -> Option<Arc<Session>> {
        self.sessions.read().get(&id).cloned()
    }

    /// Snapshots every currently live session.
    #[must_use]
    pub fn sessions(&self) -> Vec<Arc<Session>> {
        self.sessions.read().values().cloned().collect()
    }

    pub(crate) fn remove_session(&self, id: EntityId) {
        if self.sessions.write().remove(&id).is_some() {
            debug!(entity = %id, "session removed");
        }
    }

    /// Returns the component id for a type, assigning one on first sight.
    pub(crate) fn component_id_for(
        &self,
        type_id: TypeId,
        name: &'static str,
    ) -> ComponentTypeId {
        if let Some(id) = self.registry.read().lookup_component(type_id) {
            return id;
        }
        self.registry.write().register_component(type_id, name)
    }

    pub(crate) fn lookup_component_id<C: 'static>(&self) -> Option<ComponentTypeId> {
        self.registry.read().lookup_component_of::<C>()
    }

    pub(crate) fn component_name(&self, id: ComponentTypeId) -> &'static str {
        self.registry.read().component_name(id)
    }

    pub(crate) fn provider(&self, id: ComponentTypeId) -> Option<&Provider> {
        self.providers.get(&id)
    }

    /// Handler ids with capability for `kind`, in registration order.
    pub(crate) fn handlers_for(&self, kind: EventKind) -> &[HandlerTypeId] {
        self.event_index.get(&kind).map_or(&[], Vec::as_slice)
    }

    pub(crate) fn handler_info(&self, id: HandlerTypeId) -> &HandlerInfo {
        &self.handlers[id.index() as usize]
    }

    /// Compiles a query's parameter list against the type registry.
    ///
    /// A parameter whose component type was never registered anywhere is
    /// permanently unsatisfiable; compilation records that rather than
    /// assigning a fresh id.
    pub fn compile_query<A, F: QueryFn<A>>(&self, _query: &F) -> QueryPlan {
        let registry = self.registry.read();
        let params = F::params()
            .into_iter()
            .map(|spec| {
                let component = registry.lookup_component(spec.type_id);
                if component.is_none() {
                    trace!(param = spec.type_name, "query parameter type was never registered");
                }
                PlanParam {
                    component,
                    mode: spec.mode,
                }
            })
            .collect();
        QueryPlan { params }
    }

    /// Runs a query against an entity by id, whether or not it is online.
    ///
    /// Each parameter resolves first against the live session's store when
    /// the entity is online; otherwise its provider loads a transient value.
    /// Every transiently loaded component is saved back after the callable
    /// ran. Returns whether the callable ran.
    ///
    /// # Errors
    ///
    /// Returns a persistence error when a provider load fails (the query
    /// does not run), or when a save-back fails (the callable already ran
    /// and its effects stand). A required parameter with neither a live
    /// value nor a provider is `Ok(false)`, not an error.
    pub fn query_by_id<A, F: QueryFn<A>>(&self, id: EntityId, mut query: F) -> Result<bool> {
        let plan = self.compile_query(&query);
        let session = self.session(id);
        let store = session
            .as_ref()
            .map(|s| s.store_read())
            .filter(|store| !store.is_detached());

        let mut slots = Vec::with_capacity(plan.params.len());
        let mut loaded = Vec::new();
        for param in &plan.params {
            let Some(component_id) = param.component else {
                if param.mode == ParamMode::Optional {
                    slots.push(None);
                    continue;
                }
                return Ok(false);
            };

            if let Some(cell) = store.as_ref().and_then(|store| store.cell(component_id)) {
                slots.push(Some(cell));
                continue;
            }

            if let Some(provider) = self.providers.get(&component_id) {
                let cell = shared_cell(provider.load_new(id)?);
                loaded.push((component_id, Arc::clone(&cell)));
                slots.push(Some(cell));
                continue;
            }

            if param.mode == ParamMode::Optional {
                slots.push(None);
            } else {
                return Ok(false);
            }
        }

        query.invoke(slots);
        drop(store);

        let mut outcome = Ok(true);
        for (component_id, cell) in loaded {
            let Some(provider) = self.providers.get(&component_id) else {
                continue;
            };
            let guard = cell.read();
            if let Err(err) = provider.save(id, &**guard) {
                warn!(
                    entity = %id,
                    component = self.component_name(component_id),
                    error = %err,
                    "save-back of query-loaded component failed"
                );
                outcome = Err(err);
            }
        }
        outcome
    }

    /// Runs a query against every currently live session, returning the
    /// number of sessions on which it ran.
    pub fn query_all<A, F: QueryFn<A>>(&self, mut query: F) -> usize {
        let plan = self.compile_query(&query);
        let sessions = self.sessions();
        sessions
            .iter()
            .filter(|session| session.run_query(&plan, &mut query))
            .count()
    }
}

impl fmt::Debug for Manager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Manager")
            .field("handlers", &self.handlers.len())
            .field("providers", &self.providers.len())
            .field("sessions", &self.sessions.read().len())
            .finish()
    }
}

/// Collects handlers and providers, then builds an immutable [`Manager`].
///
/// Order matters for handlers: dispatch order is registration order.
#[derive(Default)]
pub struct ManagerBuilder {
    handlers: Vec<PendingHandler>,
    providers: Vec<Provider>,
}

struct PendingHandler {
    type_id: TypeId,
    name: &'static str,
    spec: HandlerSpec,
    instance: Arc<dyn Handler>,
}

impl ManagerBuilder {
    /// Registers a handler. The instance doubles as the callee; its type is
    /// what gates duplicate registration.
    #[must_use]
    pub fn handler<H: Handler>(mut self, handler: H) -> Self {
        self.handlers.push(PendingHandler {
            type_id: TypeId::of::<H>(),
            name: type_name::<H>(),
            spec: H::spec(),
            instance: Arc::new(handler),
        });
        self
    }

    /// Registers a component provider.
    #[must_use]
    pub fn provider(mut self, provider: Provider) -> Self {
        self.providers.push(provider);
        self
    }

    /// Compiles the handler registry and provider table.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::DuplicateHandler`] when a handler type was
    /// registered twice, [`ErrorKind::StaleHandlerSignature`] when a
    /// capability token was minted against an outdated event signature, and
    /// [`ErrorKind::DuplicateProvider`] when two providers cover the same
    /// component type.
    ///
    /// [`ErrorKind::DuplicateHandler`]: tether_foundation::ErrorKind::DuplicateHandler
    /// [`ErrorKind::StaleHandlerSignature`]: tether_foundation::ErrorKind::StaleHandlerSignature
    /// [`ErrorKind::DuplicateProvider`]: tether_foundation::ErrorKind::DuplicateProvider
    pub fn build(self) -> Result<Arc<Manager>> {
        let mut registry = TypeRegistry::new();
        let mut handlers = Vec::with_capacity(self.handlers.len());
        let mut event_index: HashMap<EventKind, Vec<HandlerTypeId>> =
            EventKind::ALL.iter().map(|&kind| (kind, Vec::new())).collect();

        for pending in self.handlers {
            let (handler_id, fresh) = registry.register_handler(pending.type_id, pending.name);
            if !fresh {
                return Err(Error::duplicate_handler(pending.name));
            }

            let mut kinds = HashSet::new();
            for cap in &pending.spec.caps {
                if !cap.is_current() {
                    return Err(Error::stale_handler_signature(
                        pending.name,
                        cap.kind().name(),
                    ));
                }
                if kinds.insert(cap.kind()) {
                    event_index
                        .get_mut(&cap.kind())
                        .expect("event index seeded for every kind")
                        .push(handler_id);
                }
            }

            let queries = pending
                .spec
                .queries
                .iter()
                .map(|q| ComponentQuery {
                    component: registry.register_component(q.type_id, q.type_name),
                    type_id: q.type_id,
                    type_name: q.type_name,
                    required: q.required,
                })
                .collect();

            debug!(handler = pending.name, events = kinds.len(), "handler registered");
            handlers.push(HandlerInfo {
                name: pending.name,
                handler: pending.instance,
                queries,
                wants_entity: pending.spec.wants_entity,
                wants_session: pending.spec.wants_session,
                wants_manager: pending.spec.wants_manager,
            });
        }

        let mut providers = HashMap::with_capacity(self.providers.len());
        for provider in self.providers {
            let component_id =
                registry.register_component(provider.component_type(), provider.component_name());
            if providers.contains_key(&component_id) {
                return Err(Error::duplicate_provider(provider.component_name()));
            }
            debug!(component = provider.component_name(), "provider registered");
            providers.insert(component_id, provider);
        }

        info!(
            handlers = handlers.len(),
            providers = providers.len(),
            "manager constructed"
        );
        Ok(Arc::new(Manager {
            registry: RwLock::new(registry),
            handlers,
            event_index,
            providers,
            sessions: RwLock::new(HashMap::new()),
        }))
    }
}
