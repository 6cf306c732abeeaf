//! Integration tests for the query engine
//!
//! Tests session-local queries, parameter modes, all-session fan-out, and
//! provider-backed by-id queries for offline entities.

use tether::{Component, ComponentSet, ErrorKind, Manager, Opt, Provider, Req, With};

use crate::support::{FlakyWalletStore, Health, Name, Wallet, WalletStore, player};

// =============================================================================
// Session-Local Queries
// =============================================================================

#[test]
fn query_runs_when_required_components_are_present() {
    let manager = Manager::builder().build().unwrap();
    let session = manager
        .accept(
            player("ann"),
            ComponentSet::new().with(Health { current: 10 }),
        )
        .unwrap();

    let ran = session.query(|health: Req<Health>| {
        health.write().current += 5;
    });

    assert!(ran);
    assert_eq!(session.component::<Health>().unwrap().read().current, 15);
}

#[test]
fn query_skips_when_a_required_component_is_absent() {
    let manager = Manager::builder().build().unwrap();
    let session = manager.accept(player("ann"), ComponentSet::new()).unwrap();
    session.insert_component(Name("Ann".into())).unwrap();

    let mut called = false;
    let ran = session.query(|_health: Req<Health>, _name: Req<Name>| {
        called = true;
    });

    assert!(!ran);
    assert!(!called);
}

#[test]
fn optional_parameter_observes_presence() {
    let manager = Manager::builder().build().unwrap();
    let session = manager
        .accept(
            player("ann"),
            ComponentSet::new().with(Health { current: 1 }),
        )
        .unwrap();

    let mut observed = None;
    let ran = session.query(|_health: Req<Health>, name: Opt<Name>| {
        observed = Some(name.is_present());
    });
    assert!(ran);
    assert_eq!(observed, Some(false));

    session.insert_component(Name("Ann".into())).unwrap();
    let ran = session.query(|_health: Req<Health>, name: Opt<Name>| {
        observed = name.get().map(|name| !name.read().0.is_empty());
    });
    assert!(ran);
    assert_eq!(observed, Some(true));
}

#[test]
fn presence_parameter_gates_without_binding() {
    let manager = Manager::builder().build().unwrap();
    let session = manager.accept(player("ann"), ComponentSet::new()).unwrap();

    let mut runs = 0;
    let ran = session.query(|_mark: With<Health>| runs += 1);
    assert!(!ran);

    session.insert_component(Health { current: 4 }).unwrap();
    let ran = session.query(|_mark: With<Health>| runs += 1);
    assert!(ran);
    assert_eq!(runs, 1);
}

struct Ghost;
impl Component for Ghost {}

#[test]
fn never_registered_type_is_permanently_unsatisfiable() {
    let manager = Manager::builder().build().unwrap();
    let session = manager
        .accept(
            player("ann"),
            ComponentSet::new().with(Health { current: 1 }),
        )
        .unwrap();

    let ran = session.query(|_ghost: Req<Ghost>| {});
    assert!(!ran);

    let mut absent = false;
    let ran = session.query(|ghost: Opt<Ghost>| {
        absent = !ghost.is_present();
    });
    assert!(ran);
    assert!(absent);
}

#[test]
fn query_after_quit_does_not_run() {
    let manager = Manager::builder().build().unwrap();
    let session = manager
        .accept(
            player("ann"),
            ComponentSet::new().with(Health { current: 1 }),
        )
        .unwrap();
    session.quit().unwrap();

    assert!(!session.query(|_health: Req<Health>| {}));
}

// =============================================================================
// All-Session Fan-Out
// =============================================================================

#[test]
fn query_all_counts_sessions_on_which_the_query_ran() {
    let manager = Manager::builder().build().unwrap();
    manager
        .accept(
            player("ann"),
            ComponentSet::new().with(Health { current: 10 }),
        )
        .unwrap();
    manager
        .accept(
            player("bob"),
            ComponentSet::new().with(Health { current: 20 }),
        )
        .unwrap();
    manager.accept(player("cam"), ComponentSet::new()).unwrap();

    let mut total = 0;
    let ran_on = manager.query_all(|health: Req<Health>| {
        total += health.read().current;
    });

    assert_eq!(ran_on, 2);
    assert_eq!(total, 30);
}

// =============================================================================
// By-Id Queries
// =============================================================================

#[test]
fn query_by_id_uses_the_live_store_without_saving() {
    let entity = player("ann");
    let id = entity.id();
    let store = WalletStore::seeded(id, 42);
    let manager = Manager::builder()
        .provider(Provider::new(store.clone()))
        .build()
        .unwrap();
    let session = manager.accept(entity, ComponentSet::new()).unwrap();
    session.insert_component(Wallet::default()).unwrap();

    let ran = manager
        .query_by_id(id, |wallet: Req<Wallet>| {
            wallet.write().coins += 1;
        })
        .unwrap();

    assert!(ran);
    assert_eq!(store.save_count(), 0);
    assert_eq!(session.component::<Wallet>().unwrap().read().coins, 43);
}

#[test]
fn query_by_id_loads_runs_and_saves_back_for_offline_entities() {
    let offline = tether::EntityId::new();
    let store = WalletStore::seeded(offline, 42);
    let manager = Manager::builder()
        .provider(Provider::new(store.clone()))
        .build()
        .unwrap();

    let ran = manager
        .query_by_id(offline, |wallet: Req<Wallet>| {
            wallet.write().coins += 8;
        })
        .unwrap();

    assert!(ran);
    assert_eq!(store.load_count(), 1);
    assert_eq!(store.save_count(), 1);
    assert_eq!(store.data.lock()[&offline], 50);
}

#[test]
fn query_by_id_without_a_provider_returns_false_without_error() {
    let manager = Manager::builder().build().unwrap();
    // Register the component type through an unrelated live session.
    manager
        .accept(
            player("ann"),
            ComponentSet::new().with(Health { current: 1 }),
        )
        .unwrap();

    let offline = tether::EntityId::new();
    let mut called = false;
    let ran = manager
        .query_by_id(offline, |_health: Req<Health>| {
            called = true;
        })
        .unwrap();

    assert!(!ran);
    assert!(!called);
}

#[test]
fn query_by_id_load_failure_is_an_error() {
    let manager = Manager::builder()
        .provider(Provider::new(FlakyWalletStore::failing_load()))
        .build()
        .unwrap();

    let offline = tether::EntityId::new();
    let err = manager
        .query_by_id(offline, |_wallet: Req<Wallet>| {})
        .unwrap_err();

    assert!(matches!(err.kind, ErrorKind::Persistence { .. }));
}

#[test]
fn query_by_id_mixes_live_cells_with_provider_loads() {
    let entity = player("ann");
    let id = entity.id();
    let store = WalletStore::seeded(id, 5);
    let manager = Manager::builder()
        .provider(Provider::new(store.clone()))
        .build()
        .unwrap();
    let session = manager
        .accept(entity, ComponentSet::new().with(Health { current: 70 }))
        .unwrap();

    let ran = manager
        .query_by_id(id, |health: Req<Health>, wallet: Req<Wallet>| {
            wallet.write().coins += u64::try_from(health.read().current).unwrap();
        })
        .unwrap();

    assert!(ran);
    // Health stayed live-only; the wallet was loaded on demand and saved back.
    assert_eq!(store.save_count(), 1);
    assert_eq!(store.data.lock()[&id], 75);
    assert!(session.component::<Wallet>().is_none());
}

mod proptests {
    use proptest::prelude::*;

    use super::*;

    proptest! {
        #[test]
        fn offline_mutations_always_persist(
            start in 0u64..1_000_000,
            delta in 0u64..1_000,
        ) {
            let offline = tether::EntityId::new();
            let store = WalletStore::seeded(offline, start);
            let manager = Manager::builder()
                .provider(Provider::new(store.clone()))
                .build()
                .unwrap();

            let ran = manager
                .query_by_id(offline, |wallet: Req<Wallet>| {
                    wallet.write().coins += delta;
                })
                .unwrap();

            prop_assert!(ran);
            prop_assert_eq!(store.data.lock()[&offline], start + delta);
        }
    }
}
