use std::sync::Arc;

use relay_core::{models::RelayStatus, traits::CancellationRepository};
use relay_dispatcher::CancellationDrainer;
use relay_testing_utils::{MockCancellationRepository, MockRelayRepository, RelayBuilder};

fn relays(count: i64) -> MockRelayRepository {
    MockRelayRepository::with_relays(
        (1..=count)
            .map(|id| RelayBuilder::new().with_id(id).with_device_id(id).build())
            .collect(),
    )
}

#[tokio::test]
async fn test_drain_applies_every_page() {
    let relay_repo = relays(5);
    let cancellation_repo = MockCancellationRepository::new();
    for id in 1..=5 {
        cancellation_repo.insert(id).await.unwrap();
    }

    // Page size smaller than the queue forces several fetches
    let drainer = CancellationDrainer::new(
        Arc::new(cancellation_repo.clone()),
        Arc::new(relay_repo.clone()),
        2,
    );

    assert_eq!(drainer.drain().await.unwrap(), 5);
    assert_eq!(cancellation_repo.count(), 0);
    for relay in relay_repo.get_all_relays() {
        assert_eq!(relay.status, RelayStatus::Cancelled);
    }
}

#[tokio::test]
async fn test_drain_is_idempotent() {
    let relay_repo = relays(1);
    let cancellation_repo = MockCancellationRepository::new();
    cancellation_repo.insert(1).await.unwrap();
    assert_eq!(cancellation_repo.insert(1).await.unwrap(), 0);

    let drainer = CancellationDrainer::new(
        Arc::new(cancellation_repo.clone()),
        Arc::new(relay_repo.clone()),
        100,
    );

    assert_eq!(drainer.drain().await.unwrap(), 1);
    assert_eq!(drainer.drain().await.unwrap(), 0);
    assert_eq!(relay_repo.get(1).unwrap().status, RelayStatus::Cancelled);
}

#[tokio::test]
async fn test_cancellation_overwrites_completed_relay() {
    let relay_repo = MockRelayRepository::with_relays(vec![RelayBuilder::new()
        .with_id(1)
        .with_status(RelayStatus::Complete)
        .with_tries(1)
        .build()]);
    let cancellation_repo = MockCancellationRepository::new();
    cancellation_repo.insert(1).await.unwrap();

    let drainer = CancellationDrainer::new(
        Arc::new(cancellation_repo),
        Arc::new(relay_repo.clone()),
        100,
    );
    drainer.drain().await.unwrap();

    let relay = relay_repo.get(1).unwrap();
    assert_eq!(relay.status, RelayStatus::Cancelled);
    assert_eq!(relay.tries, 1);
}

#[tokio::test]
async fn test_store_failure_aborts_drain_and_keeps_queue() {
    let relay_repo = relays(2);
    relay_repo.set_fail_writes(true);
    let cancellation_repo = MockCancellationRepository::new();
    cancellation_repo.insert(1).await.unwrap();
    cancellation_repo.insert(2).await.unwrap();

    let drainer = CancellationDrainer::new(
        Arc::new(cancellation_repo.clone()),
        Arc::new(relay_repo.clone()),
        100,
    );

    assert!(drainer.drain().await.is_err());
    assert_eq!(cancellation_repo.count(), 2);

    relay_repo.set_fail_writes(false);
    assert_eq!(drainer.drain().await.unwrap(), 2);
}
