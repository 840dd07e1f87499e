//! Producer-to-device flows through the real SQLite store, the HTTP API and
//! the dispatch coordinator, with the deterministic mock device cloud.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tower::ServiceExt;

use relay::app::{AppMode, Application};
use relay_core::{
    config::DispatcherConfig,
    traits::{CancellationRepository, DeviceClient},
    AppConfig,
};
use relay_dispatcher::ProcessOutcome;
use relay_infrastructure::{DatabaseManager, MockDeviceClient, SqliteCancellationRepository};
use relay_testing_utils::TestEnv;

struct World {
    app: Application,
    database: Arc<DatabaseManager>,
    client: Arc<MockDeviceClient>,
}

impl World {
    async fn new(dispatcher: DispatcherConfig) -> Self {
        let config = AppConfig {
            dispatcher,
            ..Default::default()
        };
        let database = Arc::new(DatabaseManager::in_memory().await.unwrap());
        let client = Arc::new(MockDeviceClient::new());

        Self {
            app: Application::from_parts(
                config,
                AppMode::All,
                Arc::clone(&database),
                Some(client.clone() as Arc<dyn DeviceClient>),
            ),
            database,
            client,
        }
    }

    async fn request(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.router().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    async fn create(&self, body: Value) -> i64 {
        let (status, body) = self
            .request(
                Request::builder()
                    .method("POST")
                    .uri("/api/relays")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body["data"]["id"].as_i64().unwrap()
    }

    async fn relay(&self, id: i64) -> Value {
        let (status, body) = self
            .request(
                Request::builder()
                    .uri(format!("/api/relays/{id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["data"].clone()
    }

    async fn cancel(&self, id: i64) -> StatusCode {
        self.request(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/relays/{id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .0
    }
}

fn fast_dispatcher() -> DispatcherConfig {
    DispatcherConfig {
        max_retries: 3,
        ping_retry_seconds: 0,
        invoke_retry_seconds: 0,
        idle_interval_millis: 10,
        ..Default::default()
    }
}

#[tokio::test]
async fn test_new_device_happy_path() {
    let world = World::new(fast_dispatcher()).await;
    let id = world
        .create(json!({ "device_id": "dev0", "function": "toggle", "argument": "on" }))
        .await;
    let coordinator = world.app.coordinator().unwrap();

    let report = coordinator.run_iteration(0).await.unwrap();

    assert_eq!(report.selected, vec![id]);
    assert_eq!(report.outcomes, vec![ProcessOutcome::Completed { tries: 1 }]);
    let relay = world.relay(id).await;
    assert_eq!(relay["status"], "COMPLETE");
    assert_eq!(relay["tries"], 1);
    assert!(!relay["device"]["last_online"].is_null());
    assert_eq!(world.client.probe_count(), 1);
}

#[tokio::test]
async fn test_result_mismatch_fails_without_retry() {
    let world = World::new(fast_dispatcher()).await;
    let id = world
        .create(json!({ "device_id": "dev0", "function": "toggle", "expected_result": 2 }))
        .await;
    let coordinator = world.app.coordinator().unwrap();

    let first = coordinator.run_iteration(0).await.unwrap();
    assert_eq!(first.outcomes, vec![ProcessOutcome::Failed { tries: 1 }]);

    let second = coordinator.run_iteration(first.next_cursor).await.unwrap();
    assert!(second.selected.is_empty());
    assert_eq!(world.client.invoke_count(), 1);
    assert_eq!(world.relay(id).await["status"], "FAILED");
}

#[tokio::test]
async fn test_invocation_faults_exhaust_retry_budget() {
    let world = World::new(fast_dispatcher()).await;
    let id = world
        .create(json!({ "device_id": "dev0", "function": "toggle", "expected_result": 1 }))
        .await;
    let coordinator = world.app.coordinator().unwrap();

    let mut cursor = 0;
    let mut outcomes = Vec::new();
    for _ in 0..10 {
        let report = coordinator.run_iteration(cursor).await.unwrap();
        cursor = report.next_cursor;
        outcomes.extend(report.outcomes);
    }

    assert_eq!(
        outcomes,
        vec![
            ProcessOutcome::Rescheduled { tries: 1 },
            ProcessOutcome::Rescheduled { tries: 2 },
            ProcessOutcome::Rescheduled { tries: 3 },
            ProcessOutcome::Failed { tries: 4 },
        ]
    );
    let relay = world.relay(id).await;
    assert_eq!(relay["status"], "FAILED");
    assert_eq!(relay["tries"], 4);
}

#[tokio::test]
async fn test_unreachable_device_never_spends_tries() {
    let world = World::new(fast_dispatcher()).await;
    let offline = world
        .create(json!({ "device_id": "dev|2", "function": "toggle" }))
        .await;
    let flaky = world
        .create(json!({ "device_id": "dev|1", "function": "toggle" }))
        .await;
    let coordinator = world.app.coordinator().unwrap();

    let mut cursor = 0;
    for _ in 0..6 {
        cursor = coordinator.run_iteration(cursor).await.unwrap().next_cursor;
    }

    for id in [offline, flaky] {
        let relay = world.relay(id).await;
        assert_eq!(relay["status"], "READY");
        assert_eq!(relay["tries"], 0);
        assert!(relay["device"]["last_online"].is_null());
    }
    assert_eq!(world.client.invoke_count(), 0);
}

#[tokio::test]
async fn test_batch_limit_one_picks_lowest_id_across_devices() {
    let world = World::new(DispatcherConfig {
        batch_limit: 1,
        ..fast_dispatcher()
    })
    .await;
    let first = world
        .create(json!({ "device_id": "devA", "function": "toggle" }))
        .await;
    world
        .create(json!({ "device_id": "devB", "function": "toggle" }))
        .await;
    let coordinator = world.app.coordinator().unwrap();

    let report = coordinator.run_iteration(0).await.unwrap();
    assert_eq!(report.selected, vec![first]);
}

#[tokio::test]
async fn test_cancelled_relay_is_never_dispatched() {
    let world = World::new(fast_dispatcher()).await;
    let id = world
        .create(json!({ "device_id": "dev0", "function": "toggle" }))
        .await;
    // Accepted while the relay is still Ready
    assert_eq!(world.cancel(id).await, StatusCode::ACCEPTED);
    assert_eq!(world.cancel(id).await, StatusCode::CONFLICT);

    let coordinator = world.app.coordinator().unwrap();
    let report = coordinator.run_iteration(0).await.unwrap();

    assert_eq!(report.cancelled, 1);
    assert!(report.selected.is_empty());
    let relay = world.relay(id).await;
    assert_eq!(relay["status"], "CANCELLED");
    assert_eq!(relay["tries"], 0);
    assert_eq!(world.cancel(id).await, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_cancellation_queued_in_flight_overwrites_completion() {
    let world = World::new(fast_dispatcher()).await;
    let id = world
        .create(json!({ "device_id": "dev0", "function": "toggle" }))
        .await;
    let coordinator = world.app.coordinator().unwrap();

    let first = coordinator.run_iteration(0).await.unwrap();
    assert_eq!(first.outcomes, vec![ProcessOutcome::Completed { tries: 1 }]);

    // The API accepted the request while the relay was still in flight
    let cancellations = SqliteCancellationRepository::new(world.database.pool().clone());
    assert!(cancellations.insert(id).await.unwrap() > 0);

    let second = coordinator.run_iteration(first.next_cursor).await.unwrap();
    assert_eq!(second.cancelled, 1);
    let relay = world.relay(id).await;
    assert_eq!(relay["status"], "CANCELLED");
    assert_eq!(relay["tries"], 1);
}

#[tokio::test]
async fn test_future_relay_waits_for_its_schedule() {
    let world = World::new(fast_dispatcher()).await;
    world
        .create(json!({
            "device_id": "dev0",
            "function": "toggle",
            "scheduled_time": "2100-01-01T00:00:00Z"
        }))
        .await;
    let coordinator = world.app.coordinator().unwrap();

    let report = coordinator.run_iteration(0).await.unwrap();
    assert!(report.selected.is_empty());
    assert_eq!(world.client.probe_count(), 0);
}

#[tokio::test]
async fn test_dispatcher_runs_until_shutdown() {
    let world = Arc::new(World::new(fast_dispatcher()).await);
    let ids = vec![
        world.create(json!({ "device_id": "devA", "function": "a" })).await,
        world.create(json!({ "device_id": "devA", "function": "b" })).await,
        world.create(json!({ "device_id": "devB", "function": "c" })).await,
    ];

    let (tx, rx) = broadcast::channel(1);
    let coordinator = world.app.coordinator().unwrap();
    let handle = tokio::spawn(async move { coordinator.run(rx).await });

    let done = TestEnv::wait_for(
        || {
            let world = Arc::clone(&world);
            let ids = ids.clone();
            async move {
                for id in ids {
                    if world.relay(id).await["status"] != "COMPLETE" {
                        return false;
                    }
                }
                true
            }
        },
        Duration::from_secs(5),
    )
    .await;
    assert!(done);

    tx.send(()).unwrap();
    assert!(handle.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_run_fails_when_store_is_unavailable() {
    let world = World::new(fast_dispatcher()).await;
    let config = AppConfig {
        dispatcher: fast_dispatcher(),
        ..Default::default()
    };
    let database = Arc::new(DatabaseManager::in_memory().await.unwrap());
    database.close().await;
    let app = Application::from_parts(
        config,
        AppMode::Dispatcher,
        database,
        Some(world.client.clone() as Arc<dyn DeviceClient>),
    );

    let (_tx, rx) = broadcast::channel(1);
    let result = tokio::time::timeout(Duration::from_secs(5), app.run(rx)).await;
    assert!(result.expect("run did not stop").is_err());
}

#[tokio::test]
async fn test_api_mode_has_no_coordinator() {
    let database = Arc::new(DatabaseManager::in_memory().await.unwrap());
    let app = Application::from_parts(AppConfig::default(), AppMode::Api, database, None);
    assert!(app.coordinator().is_err());
}
