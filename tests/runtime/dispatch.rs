//! Integration tests for event dispatch
//!
//! Tests component gating, registration-order determinism, capability
//! filtering, context slot binding, and construction-time validation.

use std::sync::Arc;

use parking_lot::Mutex;
use tether::{
    Activation, ComponentSet, ErrorKind, Event, EventCap, EventKind, Handler, HandlerSpec,
    Manager, caps,
};

use crate::support::{Health, Name, Player, player};

// =============================================================================
// Component Gates
// =============================================================================

struct TwoGateHandler {
    invocations: Arc<Mutex<Vec<(i64, String)>>>,
}

impl Handler for TwoGateHandler {
    fn spec() -> HandlerSpec {
        HandlerSpec::new()
            .requires::<Health>()
            .requires::<Name>()
            .handles(caps::CHAT)
    }

    fn handle(&self, _event: &Event<'_>, cx: &Activation<'_>) {
        let health = cx.component::<Health>();
        let name = cx.component::<Name>();
        self.invocations
            .lock()
            .push((health.read().current, name.read().0.clone()));
    }
}

#[test]
fn required_gate_skips_until_every_component_is_present() {
    let invocations = Arc::new(Mutex::new(Vec::new()));
    let manager = Manager::builder()
        .handler(TwoGateHandler {
            invocations: Arc::clone(&invocations),
        })
        .build()
        .unwrap();
    let session = manager
        .accept(
            player("ann"),
            ComponentSet::new().with(Health { current: 80 }),
        )
        .unwrap();

    session.handle_chat("hello");
    assert!(invocations.lock().is_empty());

    session.insert_component(Name("Ann".into())).unwrap();
    session.handle_chat("hello again");
    assert_eq!(*invocations.lock(), vec![(80, "Ann".into())]);
}

struct OptionalNameHandler {
    invocations: Arc<Mutex<Vec<(i64, Option<String>)>>>,
}

impl Handler for OptionalNameHandler {
    fn spec() -> HandlerSpec {
        HandlerSpec::new()
            .requires::<Health>()
            .optional::<Name>()
            .handles(caps::MOVE)
    }

    fn handle(&self, _event: &Event<'_>, cx: &Activation<'_>) {
        let health = cx.component::<Health>();
        let name = cx.optional::<Name>().map(|name| name.read().0.clone());
        self.invocations.lock().push((health.read().current, name));
    }
}

#[test]
fn optional_query_binds_absent_instead_of_skipping() {
    let invocations = Arc::new(Mutex::new(Vec::new()));
    let manager = Manager::builder()
        .handler(OptionalNameHandler {
            invocations: Arc::clone(&invocations),
        })
        .build()
        .unwrap();
    let session = manager
        .accept(
            player("ann"),
            ComponentSet::new().with(Health { current: 100 }),
        )
        .unwrap();

    session.handle_move([0.0, 0.0, 0.0]);
    session.set_component(Name("Bob".into())).unwrap();
    session.handle_move([1.0, 0.0, 0.0]);

    assert_eq!(
        *invocations.lock(),
        vec![(100, None), (100, Some("Bob".into()))]
    );
}

// =============================================================================
// Ordering and Capability Filtering
// =============================================================================

struct OrderFirst {
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl Handler for OrderFirst {
    fn spec() -> HandlerSpec {
        HandlerSpec::new().handles(caps::JOIN)
    }

    fn handle(&self, _event: &Event<'_>, _cx: &Activation<'_>) {
        self.log.lock().push("first");
    }
}

struct OrderSecond {
    log: Arc<Mutex<Vec<&'static str>>>,
}

impl Handler for OrderSecond {
    fn spec() -> HandlerSpec {
        HandlerSpec::new().handles(caps::JOIN)
    }

    fn handle(&self, _event: &Event<'_>, _cx: &Activation<'_>) {
        self.log.lock().push("second");
    }
}

#[test]
fn dispatch_order_is_registration_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let manager = Manager::builder()
        .handler(OrderFirst {
            log: Arc::clone(&log),
        })
        .handler(OrderSecond {
            log: Arc::clone(&log),
        })
        .build()
        .unwrap();
    let session = manager.accept(player("ann"), ComponentSet::new()).unwrap();

    session.handle_join();
    session.handle_join();

    assert_eq!(*log.lock(), vec!["first", "second", "first", "second"]);
}

struct ChatRecorder {
    messages: Arc<Mutex<Vec<String>>>,
}

impl Handler for ChatRecorder {
    fn spec() -> HandlerSpec {
        HandlerSpec::new().handles(caps::CHAT)
    }

    fn handle(&self, event: &Event<'_>, _cx: &Activation<'_>) {
        if let Event::Chat { message } = event {
            self.messages.lock().push((*message).to_string());
        }
    }
}

#[test]
fn handlers_only_receive_declared_event_kinds() {
    let messages = Arc::new(Mutex::new(Vec::new()));
    let manager = Manager::builder()
        .handler(ChatRecorder {
            messages: Arc::clone(&messages),
        })
        .build()
        .unwrap();
    let session = manager.accept(player("ann"), ComponentSet::new()).unwrap();

    session.handle_join();
    session.handle_move([1.0, 2.0, 3.0]);
    session.handle_chat("only this");

    assert_eq!(*messages.lock(), vec!["only this"]);
}

struct MoveRecorder {
    positions: Arc<Mutex<Vec<[f64; 3]>>>,
}

impl Handler for MoveRecorder {
    fn spec() -> HandlerSpec {
        HandlerSpec::new().handles(caps::MOVE)
    }

    fn handle(&self, event: &Event<'_>, _cx: &Activation<'_>) {
        if let Event::Move { position } = event {
            self.positions.lock().push(*position);
        }
    }
}

#[test]
fn event_parameters_reach_the_handler() {
    let positions = Arc::new(Mutex::new(Vec::new()));
    let manager = Manager::builder()
        .handler(MoveRecorder {
            positions: Arc::clone(&positions),
        })
        .build()
        .unwrap();
    let session = manager.accept(player("ann"), ComponentSet::new()).unwrap();

    session.handle_move([3.5, -1.0, 12.0]);

    assert_eq!(*positions.lock(), vec![[3.5, -1.0, 12.0]]);
}

struct InteractRecorder {
    targets: Arc<Mutex<Vec<tether::EntityId>>>,
}

impl Handler for InteractRecorder {
    fn spec() -> HandlerSpec {
        HandlerSpec::new().handles(caps::INTERACT)
    }

    fn handle(&self, event: &Event<'_>, _cx: &Activation<'_>) {
        if let Event::Interact { target } = event {
            self.targets.lock().push(*target);
        }
    }
}

#[test]
fn interact_carries_the_target_entity_id() {
    let targets = Arc::new(Mutex::new(Vec::new()));
    let manager = Manager::builder()
        .handler(InteractRecorder {
            targets: Arc::clone(&targets),
        })
        .build()
        .unwrap();
    let session = manager.accept(player("ann"), ComponentSet::new()).unwrap();
    let other = tether::EntityId::new();

    session.handle_interact(other);

    assert_eq!(*targets.lock(), vec![other]);
}

// =============================================================================
// Context Slots
// =============================================================================

struct ContextHandler {
    observations: Arc<Mutex<Vec<(&'static str, bool, bool)>>>,
}

impl Handler for ContextHandler {
    fn spec() -> HandlerSpec {
        HandlerSpec::new()
            .with_entity()
            .with_session()
            .with_manager()
            .handles(caps::JOIN)
    }

    fn handle(&self, _event: &Event<'_>, cx: &Activation<'_>) {
        let entity = cx.entity().expect("entity slot bound");
        let name = entity
            .as_any()
            .downcast_ref::<Player>()
            .expect("test entity is a Player")
            .name;
        let session_matches = cx
            .session()
            .is_some_and(|session| session.id() == entity.id());
        let manager_bound = cx.manager().is_some();
        self.observations
            .lock()
            .push((name, session_matches, manager_bound));
    }
}

#[test]
fn declared_context_slots_are_bound() {
    let observations = Arc::new(Mutex::new(Vec::new()));
    let manager = Manager::builder()
        .handler(ContextHandler {
            observations: Arc::clone(&observations),
        })
        .build()
        .unwrap();
    let session = manager.accept(player("ann"), ComponentSet::new()).unwrap();

    session.handle_join();

    assert_eq!(*observations.lock(), vec![("ann", true, true)]);
}

// =============================================================================
// Construction-Time Validation
// =============================================================================

struct StaleHandler;

impl Handler for StaleHandler {
    fn spec() -> HandlerSpec {
        // Minted against the 2-D move signature.
        HandlerSpec::new().handles(EventCap::new(EventKind::Move, 1))
    }

    fn handle(&self, _event: &Event<'_>, _cx: &Activation<'_>) {}
}

#[test]
fn stale_capability_fails_construction() {
    let err = Manager::builder().handler(StaleHandler).build().unwrap_err();
    assert!(matches!(err.kind, ErrorKind::StaleHandlerSignature { .. }));
    assert!(err.is_fatal());
}

#[test]
fn duplicate_handler_type_fails_construction() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let err = Manager::builder()
        .handler(OrderFirst {
            log: Arc::clone(&log),
        })
        .handler(OrderFirst { log })
        .build()
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::DuplicateHandler { .. }));
}

// =============================================================================
// Detached Sessions
// =============================================================================

#[test]
fn dispatch_after_quit_is_a_noop() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let manager = Manager::builder()
        .handler(OrderFirst {
            log: Arc::clone(&log),
        })
        .build()
        .unwrap();
    let session = manager.accept(player("ann"), ComponentSet::new()).unwrap();

    session.quit().unwrap();
    session.handle_join();

    assert!(log.lock().is_empty());
}
