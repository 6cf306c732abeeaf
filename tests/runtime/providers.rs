//! Integration tests for provider registration and accept-time loading.

use tether::{ComponentSet, ErrorKind, Manager, Provider};

use crate::support::{FlakyWalletStore, Wallet, WalletStore, player};

#[test]
fn duplicate_provider_fails_construction() {
    let err = Manager::builder()
        .provider(Provider::new(WalletStore::default()))
        .provider(Provider::new(FlakyWalletStore::failing_save()))
        .build()
        .unwrap_err();

    assert!(matches!(err.kind, ErrorKind::DuplicateProvider { .. }));
    assert!(err.is_fatal());
}

#[test]
fn initial_components_load_through_providers() {
    let entity = player("ann");
    let store = WalletStore::seeded(entity.id(), 17);
    let manager = Manager::builder()
        .provider(Provider::new(store.clone()))
        .build()
        .unwrap();

    let session = manager
        .accept(entity, ComponentSet::new().with(Wallet::default()))
        .unwrap();

    assert_eq!(store.load_count(), 1);
    assert_eq!(session.component::<Wallet>().unwrap().read().coins, 17);
}

#[test]
fn accept_failure_publishes_no_session() {
    let entity = player("ann");
    let id = entity.id();
    let manager = Manager::builder()
        .provider(Provider::new(FlakyWalletStore::failing_load()))
        .build()
        .unwrap();

    let err = manager
        .accept(entity, ComponentSet::new().with(Wallet::default()))
        .unwrap_err();

    assert!(matches!(err.kind, ErrorKind::Persistence { .. }));
    assert!(manager.session(id).is_none());
}

#[test]
fn provider_errors_name_the_component_and_operation() {
    let manager = Manager::builder()
        .provider(Provider::new(FlakyWalletStore::failing_load()))
        .build()
        .unwrap();
    let session = manager.accept(player("ann"), ComponentSet::new()).unwrap();

    let err = session.insert_component(Wallet::default()).unwrap_err();
    let message = format!("{err}");
    assert!(message.contains("Wallet"));
    assert!(message.contains("load"));
    assert!(message.contains("backend offline"));
}
