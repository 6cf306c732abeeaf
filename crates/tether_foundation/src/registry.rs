//! Process-lifetime integer identities for component and handler types.
//!
//! Runtime type identity without reflection: each distinct Rust type gets a
//! small monotonically-increasing id on first sight, keyed by
//! [`std::any::TypeId`]. Ids are never reused or reclaimed, so they can key
//! dense tables for the life of the owning manager.

use std::any::{TypeId, type_name};
use std::collections::HashMap;
use std::fmt;

/// Identifier for a registered component type.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct ComponentTypeId(pub(crate) u32);

impl ComponentTypeId {
    /// Returns the raw index of this component type.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for ComponentTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComponentTypeId({})", self.0)
    }
}

/// Identifier for a registered handler type.
#[derive(Copy, Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct HandlerTypeId(pub(crate) u32);

impl HandlerTypeId {
    /// Returns the raw index of this handler type.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for HandlerTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HandlerTypeId({})", self.0)
    }
}

/// Assigns stable integer identities to component and handler types.
///
/// Registration is idempotent and monotonic: a given type always maps to the
/// same id for the life of the registry. The registry is not synchronized;
/// the owning manager guards it (handler ids are assigned once at
/// construction, component ids may still be assigned lazily when a session
/// first sees a new component type).
#[derive(Debug, Default)]
pub struct TypeRegistry {
    components: HashMap<TypeId, ComponentTypeId>,
    component_names: Vec<&'static str>,
    handlers: HashMap<TypeId, HandlerTypeId>,
    handler_names: Vec<&'static str>,
}

impl TypeRegistry {
    /// Creates a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for a component type, assigning one on first sight.
    pub fn register_component(&mut self, type_id: TypeId, name: &'static str) -> ComponentTypeId {
        if let Some(&id) = self.components.get(&type_id) {
            return id;
        }
        let id = ComponentTypeId(u32::try_from(self.component_names.len()).expect("component type count overflow"));
        self.components.insert(type_id, id);
        self.component_names.push(name);
        id
    }

    /// Generic sugar for [`TypeRegistry::register_component`].
    pub fn register_component_of<C: 'static>(&mut self) -> ComponentTypeId {
        self.register_component(TypeId::of::<C>(), type_name::<C>())
    }

    /// Looks up a component type without assigning an id.
    ///
    /// Query compilation uses this: a type never seen by any handler,
    /// provider, or session mutation is permanently unsatisfiable, not a new
    /// registration.
    #[must_use]
    pub fn lookup_component(&self, type_id: TypeId) -> Option<ComponentTypeId> {
        self.components.get(&type_id).copied()
    }

    /// Generic sugar for [`TypeRegistry::lookup_component`].
    #[must_use]
    pub fn lookup_component_of<C: 'static>(&self) -> Option<ComponentTypeId> {
        self.lookup_component(TypeId::of::<C>())
    }

    /// Returns the diagnostic name recorded for a component type id.
    #[must_use]
    pub fn component_name(&self, id: ComponentTypeId) -> &'static str {
        self.component_names.get(id.0 as usize).copied().unwrap_or("<unknown>")
    }

    /// Returns the number of distinct component types seen so far.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.component_names.len()
    }

    /// Returns the id for a handler type, assigning one on first sight.
    ///
    /// The second element is `true` when the id was freshly assigned; the
    /// manager treats a repeat registration as a construction-time fatal.
    pub fn register_handler(&mut self, type_id: TypeId, name: &'static str) -> (HandlerTypeId, bool) {
        if let Some(&id) = self.handlers.get(&type_id) {
            return (id, false);
        }
        let id = HandlerTypeId(u32::try_from(self.handler_names.len()).expect("handler type count overflow"));
        self.handlers.insert(type_id, id);
        self.handler_names.push(name);
        (id, true)
    }

    /// Returns the diagnostic name recorded for a handler type id.
    #[must_use]
    pub fn handler_name(&self, id: HandlerTypeId) -> &'static str {
        self.handler_names.get(id.0 as usize).copied().unwrap_or("<unknown>")
    }
}
