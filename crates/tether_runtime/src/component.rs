//! Typed component values and their type-erased storage cells.
//!
//! A component is an arbitrary typed value attached to a session, at most
//! one instance per type per session. Components are stored behind
//! per-component cells so handler callbacks can mutate component *contents*
//! while the session's store is only read-locked.

use std::any::{Any, TypeId, type_name};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tether_foundation::EntityRef;

/// Typed data attached to a session.
///
/// The lifecycle hooks default to no-ops; a component "has" a hook by
/// overriding the default. [`Component::on_add`] fires whenever the
/// component is added to a session in any way (including replacement via
/// `set_component`), [`Component::on_remove`] fires right before the
/// instance leaves the session (including replacement).
///
/// The entity is `None` when the session has no live entity reference.
pub trait Component: Send + Sync + 'static {
    /// Called right after the component is added to a session.
    fn on_add(&mut self, _entity: Option<&EntityRef>) {}

    /// Called right before the component is removed from a session.
    fn on_remove(&mut self, _entity: Option<&EntityRef>) {}
}

/// Object-safe erasure over [`Component`].
///
/// Implemented for every `Component` via a blanket impl; not meant to be
/// implemented by hand.
pub trait AnyComponent: Send + Sync {
    /// Upcast for typed downcasting.
    fn as_any(&self) -> &dyn Any;
    /// Mutable upcast for typed downcasting.
    fn as_any_mut(&mut self) -> &mut dyn Any;
    /// The `TypeId` of the concrete component type.
    fn component_type(&self) -> TypeId;
    /// Diagnostic name of the concrete component type.
    fn component_name(&self) -> &'static str;
    /// Forwards to [`Component::on_add`].
    fn hook_add(&mut self, entity: Option<&EntityRef>);
    /// Forwards to [`Component::on_remove`].
    fn hook_remove(&mut self, entity: Option<&EntityRef>);
}

impl<C: Component> AnyComponent for C {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn component_type(&self) -> TypeId {
        TypeId::of::<C>()
    }

    fn component_name(&self) -> &'static str {
        type_name::<C>()
    }

    fn hook_add(&mut self, entity: Option<&EntityRef>) {
        self.on_add(entity);
    }

    fn hook_remove(&mut self, entity: Option<&EntityRef>) {
        self.on_remove(entity);
    }
}

/// A single stored component: shared, interior-locked, type-erased.
pub type SharedComponent = Arc<RwLock<Box<dyn AnyComponent>>>;

/// Wraps a component value into a fresh storage cell.
pub(crate) fn shared_cell(boxed: Box<dyn AnyComponent>) -> SharedComponent {
    Arc::new(RwLock::new(boxed))
}

/// Typed handle to a stored component.
///
/// Cloning is cheap (an `Arc` clone). `read`/`write` lock the individual
/// component cell, not the whole session store, so handlers running under
/// the session's shared lock can still mutate component contents.
pub struct Comp<C: Component> {
    cell: SharedComponent,
    _marker: PhantomData<fn() -> C>,
}

impl<C: Component> Comp<C> {
    /// Wraps a cell. The caller guarantees the cell holds a `C`; cells are
    /// keyed by the type id derived from `TypeId::of::<C>()`, so a mismatch
    /// indicates internal corruption and fails closed with a panic.
    pub(crate) fn new(cell: SharedComponent) -> Self {
        Self {
            cell,
            _marker: PhantomData,
        }
    }

    /// Locks the component for reading.
    pub fn read(&self) -> MappedRwLockReadGuard<'_, C> {
        RwLockReadGuard::map(self.cell.read(), |boxed| {
            boxed
                .as_any()
                .downcast_ref::<C>()
                .expect("component cell bound to the wrong type")
        })
    }

    /// Locks the component for writing.
    pub fn write(&self) -> MappedRwLockWriteGuard<'_, C> {
        RwLockWriteGuard::map(self.cell.write(), |boxed| {
            boxed
                .as_any_mut()
                .downcast_mut::<C>()
                .expect("component cell bound to the wrong type")
        })
    }
}

impl<C: Component> Clone for Comp<C> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
            _marker: PhantomData,
        }
    }
}

impl<C: Component> fmt::Debug for Comp<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Comp<{}>", type_name::<C>())
    }
}

/// Ordered, heterogeneous bundle of initial components for `accept`.
///
/// ```ignore
/// manager.accept(entity, ComponentSet::new().with(Health(100)).with(Name("Ann".into())))?;
/// ```
#[derive(Default)]
pub struct ComponentSet {
    pub(crate) items: Vec<Box<dyn AnyComponent>>,
}

impl ComponentSet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a component to the set.
    #[must_use]
    pub fn with<C: Component>(mut self, component: C) -> Self {
        self.items.push(Box::new(component));
        self
    }

    /// Returns the number of components in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the set holds no components.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
