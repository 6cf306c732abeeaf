//! Ad hoc queries: arbitrary functions whose parameters are component
//! requirements.
//!
//! A query function's parameter list is drawn from three kinds: [`Req`]
//! (required value), [`Opt`] (optional value plus presence), and [`With`]
//! (presence only). The same gate semantics as handler dispatch apply, but
//! queries are compiled per call site from the parameter types instead of a
//! registered spec, and [`Manager::query_by_id`] extends resolution to
//! provider-backed loads for entities that are not resident.
//!
//! [`Manager::query_by_id`]: crate::manager::Manager::query_by_id

use std::any::{TypeId, type_name};
use std::marker::PhantomData;
use std::ops::Deref;

use tether_foundation::ComponentTypeId;

use crate::component::{Comp, Component, SharedComponent};

/// How a query parameter treats its component.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ParamMode {
    /// The component must be present (or loadable); its value is bound.
    Required,
    /// The value is bound when present; absence is observable.
    Optional,
    /// The component must be present; the value is discarded.
    Presence,
}

/// Static description of one query parameter.
#[derive(Copy, Clone, Debug)]
pub struct ParamSpec {
    pub(crate) type_id: TypeId,
    pub(crate) type_name: &'static str,
    pub(crate) mode: ParamMode,
}

/// A type usable as a query function parameter.
pub trait QueryParam: Sized {
    /// Describes the parameter's component type and mode.
    fn spec() -> ParamSpec;

    /// Binds the parameter from a resolved slot.
    fn bind(slot: Option<SharedComponent>) -> Self;
}

/// Required query parameter: the component of type `C`, always bound.
pub struct Req<C: Component> {
    comp: Comp<C>,
}

impl<C: Component> QueryParam for Req<C> {
    fn spec() -> ParamSpec {
        ParamSpec {
            type_id: TypeId::of::<C>(),
            type_name: type_name::<C>(),
            mode: ParamMode::Required,
        }
    }

    fn bind(slot: Option<SharedComponent>) -> Self {
        let cell = slot.expect("required query parameter bound without a value");
        Self {
            comp: Comp::new(cell),
        }
    }
}

impl<C: Component> Deref for Req<C> {
    type Target = Comp<C>;

    fn deref(&self) -> &Comp<C> {
        &self.comp
    }
}

/// Optional query parameter: the component of type `C` when present.
pub struct Opt<C: Component> {
    comp: Option<Comp<C>>,
}

impl<C: Component> Opt<C> {
    /// Returns the bound handle when the component was present.
    #[must_use]
    pub fn get(&self) -> Option<&Comp<C>> {
        self.comp.as_ref()
    }

    /// Whether the component was present.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.comp.is_some()
    }
}

impl<C: Component> QueryParam for Opt<C> {
    fn spec() -> ParamSpec {
        ParamSpec {
            type_id: TypeId::of::<C>(),
            type_name: type_name::<C>(),
            mode: ParamMode::Optional,
        }
    }

    fn bind(slot: Option<SharedComponent>) -> Self {
        Self {
            comp: slot.map(Comp::new),
        }
    }
}

/// Presence-only query parameter: gates on a component of type `C` being
/// present without binding its value.
pub struct With<C: Component> {
    _marker: PhantomData<fn() -> C>,
}

impl<C: Component> QueryParam for With<C> {
    fn spec() -> ParamSpec {
        ParamSpec {
            type_id: TypeId::of::<C>(),
            type_name: type_name::<C>(),
            mode: ParamMode::Presence,
        }
    }

    fn bind(_slot: Option<SharedComponent>) -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

/// A callable whose parameter list is entirely query parameters.
///
/// Implemented for closures and functions of up to five [`QueryParam`]s.
pub trait QueryFn<A> {
    /// Static parameter descriptors, in declaration order.
    fn params() -> Vec<ParamSpec>;

    /// Invokes the callable with resolved slots (one per parameter, in
    /// order).
    fn invoke(&mut self, slots: Vec<Option<SharedComponent>>);
}

macro_rules! impl_query_fn {
    ($(($arg:ident, $P:ident)),*) => {
        impl<F, $($P: QueryParam,)*> QueryFn<($($P,)*)> for F
        where
            F: FnMut($($P),*),
        {
            fn params() -> Vec<ParamSpec> {
                vec![$($P::spec()),*]
            }

            #[allow(unused_variables, unused_mut)]
            fn invoke(&mut self, slots: Vec<Option<SharedComponent>>) {
                let mut slots = slots.into_iter();
                $(
                    let $arg = $P::bind(slots.next().expect("query invoked with too few slots"));
                )*
                self($($arg),*);
            }
        }
    };
}

impl_query_fn!();
impl_query_fn!((a, P0));
impl_query_fn!((a, P0), (b, P1));
impl_query_fn!((a, P0), (b, P1), (c, P2));
impl_query_fn!((a, P0), (b, P1), (c, P2), (d, P3));
impl_query_fn!((a, P0), (b, P1), (c, P2), (d, P3), (e, P4));

/// A query compiled against a manager's type registry.
///
/// Each parameter resolves to a component type id, or to `None` when the
/// type was never registered anywhere, in which case the parameter is
/// permanently unsatisfiable (a required one prevents the query from ever
/// running; an optional one always binds absent).
#[derive(Debug)]
pub struct QueryPlan {
    pub(crate) params: Vec<PlanParam>,
}

#[derive(Debug)]
pub(crate) struct PlanParam {
    pub(crate) component: Option<ComponentTypeId>,
    pub(crate) mode: ParamMode,
}
