//! Live sessions: per-entity component stores plus event dispatch.

use std::collections::HashMap;
use std::mem;
use std::sync::{Arc, Weak};

use parking_lot::{RwLock, RwLockReadGuard};
use tracing::{error, warn};

use tether_foundation::{ComponentTypeId, EntityId, EntityRef, Error, Result};

use crate::component::{AnyComponent, Comp, Component, SharedComponent, shared_cell};
use crate::event::Event;
use crate::handler::Activation;
use crate::manager::Manager;
use crate::query::{ParamMode, QueryFn, QueryPlan};

/// One entity's live presence: identity, an optional entity reference, and
/// the component store.
///
/// A session is created by [`Manager::accept`] and lives until
/// [`Session::quit`] detaches it. All methods are callable from any thread;
/// the store is guarded by a reader-writer lock. Dispatch and queries run
/// under the shared side, structural mutation under the exclusive side, so
/// a component cannot be removed out from under a running handler.
pub struct Session {
    id: EntityId,
    manager: Weak<Manager>,
    pub(crate) weak_self: Weak<Session>,
    entity: RwLock<Option<EntityRef>>,
    store: RwLock<Store>,
}

/// The component store proper. `detached` latches on quit; every mutating
/// entry point checks it so a torn-down session cannot be resurrected.
pub(crate) struct Store {
    components: HashMap<ComponentTypeId, SharedComponent>,
    detached: bool,
}

impl Store {
    pub(crate) fn is_detached(&self) -> bool {
        self.detached
    }

    pub(crate) fn cell(&self, id: ComponentTypeId) -> Option<SharedComponent> {
        self.components.get(&id).cloned()
    }
}

impl Session {
    pub(crate) fn new(
        id: EntityId,
        manager: Weak<Manager>,
        weak_self: Weak<Session>,
        entity: Option<EntityRef>,
    ) -> Self {
        Self {
            id,
            manager,
            weak_self,
            entity: RwLock::new(entity),
            store: RwLock::new(Store {
                components: HashMap::new(),
                detached: false,
            }),
        }
    }

    /// Read-locks the store for the by-id query engine, which resolves live
    /// cells and provider loads under one consistent view.
    pub(crate) fn store_read(&self) -> RwLockReadGuard<'_, Store> {
        self.store.read()
    }

    /// The stable identity of the entity behind this session.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.id
    }

    /// The live entity reference, when attached.
    #[must_use]
    pub fn entity(&self) -> Option<EntityRef> {
        self.entity.read().clone()
    }

    /// Attaches a component to this session.
    ///
    /// If a provider is registered for `C`, persisted state is loaded into
    /// the value before it is stored; a load failure aborts the insert and
    /// leaves the session unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::AlreadyPresent`] when a component of this type
    /// is already attached, [`ErrorKind::AlreadyDetached`] after `quit`, and
    /// a persistence error when the provider load fails.
    ///
    /// [`ErrorKind::AlreadyPresent`]: tether_foundation::ErrorKind::AlreadyPresent
    /// [`ErrorKind::AlreadyDetached`]: tether_foundation::ErrorKind::AlreadyDetached
    pub fn insert_component<C: Component>(&self, component: C) -> Result<()> {
        self.insert_erased(Box::new(component))
    }

    pub(crate) fn insert_erased(&self, mut component: Box<dyn AnyComponent>) -> Result<()> {
        let Some(manager) = self.manager.upgrade() else {
            return Err(Error::already_detached());
        };
        let component_id = manager.component_id_for(component.component_type(), component.component_name());

        let mut store = self.store.write();
        if store.detached {
            return Err(Error::already_detached());
        }
        if store.components.contains_key(&component_id) {
            return Err(Error::already_present(component.component_name()));
        }

        if let Some(provider) = manager.provider(component_id) {
            provider.load_into(self.id, &mut *component)?;
        }

        let entity = self.entity.read().clone();
        component.hook_add(entity.as_ref());
        store.components.insert(component_id, shared_cell(component));
        Ok(())
    }

    /// Attaches or replaces a component, without consulting providers.
    ///
    /// A replaced instance receives its remove hook before the new one's
    /// add hook fires.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::AlreadyDetached`] after `quit`.
    ///
    /// [`ErrorKind::AlreadyDetached`]: tether_foundation::ErrorKind::AlreadyDetached
    pub fn set_component<C: Component>(&self, component: C) -> Result<()> {
        let Some(manager) = self.manager.upgrade() else {
            return Err(Error::already_detached());
        };
        let mut boxed: Box<dyn AnyComponent> = Box::new(component);
        let component_id = manager.component_id_for(boxed.component_type(), boxed.component_name());

        let mut store = self.store.write();
        if store.detached {
            return Err(Error::already_detached());
        }

        let entity = self.entity.read().clone();
        if let Some(previous) = store.components.remove(&component_id) {
            previous.write().hook_remove(entity.as_ref());
        }
        boxed.hook_add(entity.as_ref());
        store.components.insert(component_id, shared_cell(boxed));
        Ok(())
    }

    /// Returns a typed handle to an attached component, or `None` when no
    /// component of that type is attached (or the session is detached).
    #[must_use]
    pub fn component<C: Component>(&self) -> Option<Comp<C>> {
        let manager = self.manager.upgrade()?;
        let component_id = manager.lookup_component_id::<C>()?;
        let store = self.store.read();
        if store.detached {
            return None;
        }
        store.components.get(&component_id).cloned().map(Comp::new)
    }

    /// Detaches a component and returns a handle to the removed instance.
    ///
    /// The remove hook fires, then a registered provider saves the final
    /// state. When the save fails the component is still removed and the
    /// persistence error is returned; the caller holds the only remaining
    /// handle to the unsaved state.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::NotPresent`] when no component of this type is
    /// attached, [`ErrorKind::AlreadyDetached`] after `quit`, and a
    /// persistence error when the save fails.
    ///
    /// [`ErrorKind::NotPresent`]: tether_foundation::ErrorKind::NotPresent
    /// [`ErrorKind::AlreadyDetached`]: tether_foundation::ErrorKind::AlreadyDetached
    pub fn remove_component<C: Component>(&self) -> Result<Comp<C>> {
        let Some(manager) = self.manager.upgrade() else {
            return Err(Error::already_detached());
        };
        let Some(component_id) = manager.lookup_component_id::<C>() else {
            return Err(Error::not_present(std::any::type_name::<C>()));
        };

        let mut store = self.store.write();
        if store.detached {
            return Err(Error::already_detached());
        }
        let Some(cell) = store.components.remove(&component_id) else {
            return Err(Error::not_present(std::any::type_name::<C>()));
        };

        let entity = self.entity.read().clone();
        cell.write().hook_remove(entity.as_ref());

        if let Some(provider) = manager.provider(component_id) {
            let guard = cell.read();
            provider.save(self.id, &**guard)?;
        }
        Ok(Comp::new(cell))
    }

    /// Saves one attached component through its provider, without removing
    /// it.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::NotPresent`] when the component is not attached,
    /// [`ErrorKind::NoProvider`] when no provider covers it, and a
    /// persistence error when the save fails.
    ///
    /// [`ErrorKind::NotPresent`]: tether_foundation::ErrorKind::NotPresent
    /// [`ErrorKind::NoProvider`]: tether_foundation::ErrorKind::NoProvider
    pub fn save<C: Component>(&self) -> Result<()> {
        let Some(manager) = self.manager.upgrade() else {
            return Err(Error::already_detached());
        };
        let Some(component_id) = manager.lookup_component_id::<C>() else {
            return Err(Error::not_present(std::any::type_name::<C>()));
        };

        let store = self.store.read();
        if store.detached {
            return Err(Error::already_detached());
        }
        let Some(cell) = store.components.get(&component_id) else {
            return Err(Error::not_present(std::any::type_name::<C>()));
        };
        let Some(provider) = manager.provider(component_id) else {
            return Err(Error::no_provider(std::any::type_name::<C>()));
        };
        let guard = cell.read();
        provider.save(self.id, &**guard)
    }

    /// Saves every attached component that has a provider.
    ///
    /// Every component is attempted even after a failure; each failure is
    /// logged, and the last one is returned.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::AlreadyDetached`] after `quit`, otherwise the
    /// last save failure if any occurred.
    ///
    /// [`ErrorKind::AlreadyDetached`]: tether_foundation::ErrorKind::AlreadyDetached
    pub fn save_all(&self) -> Result<()> {
        let Some(manager) = self.manager.upgrade() else {
            return Err(Error::already_detached());
        };

        let store = self.store.write();
        if store.detached {
            return Err(Error::already_detached());
        }

        let mut last = Ok(());
        for (&component_id, cell) in &store.components {
            let Some(provider) = manager.provider(component_id) else {
                continue;
            };
            let guard = cell.read();
            if let Err(err) = provider.save(self.id, &**guard) {
                warn!(
                    entity = %self.id,
                    component = manager.component_name(component_id),
                    error = %err,
                    "component save failed"
                );
                last = Err(err);
            }
        }
        last
    }

    /// Tears the session down: removes every component (remove hooks fire,
    /// providers save best-effort), detaches from the manager, and drops the
    /// entity reference.
    ///
    /// Save failures during teardown are logged and swallowed; the teardown
    /// always completes. Prefer [`Session::handle_quit`], which dispatches
    /// the quit event to handlers first.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::AlreadyDetached`] when the session was already
    /// torn down.
    ///
    /// [`ErrorKind::AlreadyDetached`]: tether_foundation::ErrorKind::AlreadyDetached
    pub fn quit(&self) -> Result<()> {
        let manager = self.manager.upgrade();

        let components = {
            let mut store = self.store.write();
            if store.detached {
                return Err(Error::already_detached());
            }
            store.detached = true;
            mem::take(&mut store.components)
        };

        let entity = self.entity.read().clone();
        for (component_id, cell) in components {
            let mut guard = cell.write();
            guard.hook_remove(entity.as_ref());
            let Some(manager) = manager.as_ref() else {
                continue;
            };
            if let Some(provider) = manager.provider(component_id) {
                if let Err(err) = provider.save(self.id, &**guard) {
                    error!(
                        entity = %self.id,
                        component = manager.component_name(component_id),
                        error = %err,
                        "component save failed during session teardown"
                    );
                }
            }
        }

        *self.entity.write() = None;
        if let Some(manager) = manager {
            manager.remove_session(self.id);
        }
        Ok(())
    }

    /// Dispatches one event to every registered handler with capability for
    /// its kind, in registration order.
    ///
    /// Gates are re-evaluated against the current store for every dispatch;
    /// handlers whose required components are absent are skipped silently.
    /// No-op on a detached session.
    pub fn dispatch(&self, event: &Event<'_>) {
        let Some(manager) = self.manager.upgrade() else {
            return;
        };

        let store = self.store.read();
        if store.detached {
            return;
        }
        let entity = self.entity.read().clone();

        'handlers: for &handler_id in manager.handlers_for(event.kind()) {
            let info = manager.handler_info(handler_id);

            let mut slots = Vec::with_capacity(info.queries.len());
            for query in &info.queries {
                match store.components.get(&query.component) {
                    Some(cell) => slots.push(Some(Arc::clone(cell))),
                    None if query.required => continue 'handlers,
                    None => slots.push(None),
                }
            }

            let cx = Activation::new(
                info,
                slots,
                if info.wants_entity { entity.clone() } else { None },
                if info.wants_session {
                    self.weak_self.upgrade()
                } else {
                    None
                },
                if info.wants_manager {
                    Some(Arc::clone(&manager))
                } else {
                    None
                },
            );
            info.handler.handle(event, &cx);
        }
    }

    /// Dispatches the join event.
    pub fn handle_join(&self) {
        self.dispatch(&Event::Join);
    }

    /// Dispatches a move event.
    pub fn handle_move(&self, position: [f64; 3]) {
        self.dispatch(&Event::Move { position });
    }

    /// Dispatches a chat event.
    pub fn handle_chat(&self, message: &str) {
        self.dispatch(&Event::Chat { message });
    }

    /// Dispatches an interact event.
    pub fn handle_interact(&self, target: EntityId) {
        self.dispatch(&Event::Interact { target });
    }

    /// Dispatches the quit event, then tears the session down.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::AlreadyDetached`] when the session was already
    /// torn down. Handlers still saw the quit event in that case only if
    /// the store was live when dispatch began.
    ///
    /// [`ErrorKind::AlreadyDetached`]: tether_foundation::ErrorKind::AlreadyDetached
    pub fn handle_quit(&self) -> Result<()> {
        self.dispatch(&Event::Quit);
        self.quit()
    }

    /// Runs an ad hoc query against this session's store.
    ///
    /// Returns whether the function ran: every required and presence
    /// parameter must resolve to an attached component. The function runs
    /// under the store's shared lock, so it may mutate component contents
    /// but must not structurally mutate this session.
    pub fn query<A, F: QueryFn<A>>(&self, mut query: F) -> bool {
        let Some(manager) = self.manager.upgrade() else {
            return false;
        };
        let plan = manager.compile_query(&query);
        self.run_query(&plan, &mut query)
    }

    /// Runs a pre-compiled query plan against this session's store.
    pub(crate) fn run_query<A, F: QueryFn<A>>(&self, plan: &QueryPlan, query: &mut F) -> bool {
        let store = self.store.read();
        if store.detached {
            return false;
        }

        let mut slots = Vec::with_capacity(plan.params.len());
        for param in &plan.params {
            let cell = param
                .component
                .and_then(|id| store.components.get(&id))
                .map(Arc::clone);
            match param.mode {
                ParamMode::Required | ParamMode::Presence if cell.is_none() => return false,
                _ => slots.push(cell),
            }
        }

        query.invoke(slots);
        true
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let store = self.store.read();
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("components", &store.components.len())
            .field("detached", &store.detached)
            .finish()
    }
}
