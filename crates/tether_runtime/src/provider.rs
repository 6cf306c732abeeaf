//! Load/save collaborators for persisted component state.
//!
//! A provider covers exactly one component type and is keyed by stable
//! entity identity, so component data survives while the entity is offline.

use std::any::{TypeId, type_name};
use std::fmt;
use std::marker::PhantomData;

use tether_foundation::{BoxError, EntityId, Error, Result};

use crate::component::{AnyComponent, Component};

/// Loads and saves data associated to an entity for one component type.
///
/// `load` writes persisted state into an existing component value (the
/// value being inserted, or a fresh `Default` one for offline queries).
pub trait ComponentProvider<C: Component>: Send + Sync + 'static {
    /// Loads persisted state for `id` into `component`.
    ///
    /// # Errors
    ///
    /// Returns the backend's error when the data cannot be read.
    fn load(&self, id: EntityId, component: &mut C) -> std::result::Result<(), BoxError>;

    /// Writes `component` to storage under `id`.
    ///
    /// # Errors
    ///
    /// Returns the backend's error when the data cannot be written.
    fn save(&self, id: EntityId, component: &C) -> std::result::Result<(), BoxError>;
}

/// Type-erased wrapper around a [`ComponentProvider`], registered at
/// manager construction.
///
/// `C: Default` is required so offline queries can materialize a fresh
/// value to load into.
pub struct Provider {
    inner: Box<dyn ErasedProvider>,
}

impl Provider {
    /// Wraps a typed provider for registration.
    pub fn new<C, P>(provider: P) -> Self
    where
        C: Component + Default,
        P: ComponentProvider<C>,
    {
        Self {
            inner: Box::new(TypedProvider {
                provider,
                _marker: PhantomData::<fn() -> C>,
            }),
        }
    }

    /// Loads persisted state into an existing component value.
    pub(crate) fn load_into(&self, id: EntityId, component: &mut dyn AnyComponent) -> Result<()> {
        self.inner.load_into(id, component)
    }

    /// Loads persisted state into a fresh default-constructed component.
    pub(crate) fn load_new(&self, id: EntityId) -> Result<Box<dyn AnyComponent>> {
        self.inner.load_new(id)
    }

    /// Saves a component value.
    pub(crate) fn save(&self, id: EntityId, component: &dyn AnyComponent) -> Result<()> {
        self.inner.save(id, component)
    }

    /// The `TypeId` of the covered component type.
    pub(crate) fn component_type(&self) -> TypeId {
        self.inner.component_type()
    }

    /// Diagnostic name of the covered component type.
    pub(crate) fn component_name(&self) -> &'static str {
        self.inner.component_name()
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Provider<{}>", self.inner.component_name())
    }
}

trait ErasedProvider: Send + Sync {
    fn load_into(&self, id: EntityId, component: &mut dyn AnyComponent) -> Result<()>;
    fn load_new(&self, id: EntityId) -> Result<Box<dyn AnyComponent>>;
    fn save(&self, id: EntityId, component: &dyn AnyComponent) -> Result<()>;
    fn component_type(&self) -> TypeId;
    fn component_name(&self) -> &'static str;
}

struct TypedProvider<C, P> {
    provider: P,
    _marker: PhantomData<fn() -> C>,
}

impl<C, P> ErasedProvider for TypedProvider<C, P>
where
    C: Component + Default,
    P: ComponentProvider<C>,
{
    fn load_into(&self, id: EntityId, component: &mut dyn AnyComponent) -> Result<()> {
        let typed = component
            .as_any_mut()
            .downcast_mut::<C>()
            .expect("provider invoked for the wrong component type");
        self.provider
            .load(id, typed)
            .map_err(|source| Error::load_failed(type_name::<C>(), source))
    }

    fn load_new(&self, id: EntityId) -> Result<Box<dyn AnyComponent>> {
        let mut fresh = C::default();
        self.provider
            .load(id, &mut fresh)
            .map_err(|source| Error::load_failed(type_name::<C>(), source))?;
        Ok(Box::new(fresh))
    }

    fn save(&self, id: EntityId, component: &dyn AnyComponent) -> Result<()> {
        let typed = component
            .as_any()
            .downcast_ref::<C>()
            .expect("provider invoked for the wrong component type");
        self.provider
            .save(id, typed)
            .map_err(|source| Error::save_failed(type_name::<C>(), source))
    }

    fn component_type(&self) -> TypeId {
        TypeId::of::<C>()
    }

    fn component_name(&self) -> &'static str {
        type_name::<C>()
    }
}
