use async_trait::async_trait;
use chrono::{Duration, Utc};
use mockall::mock;
use std::sync::Arc;

use relay_core::{
    config::DispatcherConfig, models::RelayStatus, traits::DeviceClient, RelayError, RelayResult,
};
use relay_dispatcher::{ProcessOutcome, RelayProcessor, RetryPolicy};
use relay_testing_utils::{DeviceBuilder, MockDeviceRepository, MockRelayRepository, RelayBuilder};

mock! {
    pub Cloud {}

    #[async_trait]
    impl DeviceClient for Cloud {
        async fn probe_liveness(&self, external_id: &str) -> RelayResult<bool>;
        async fn invoke(
            &self,
            external_id: &str,
            function: &str,
            argument: &str,
            expected_result: Option<i64>,
        ) -> RelayResult<bool>;
    }
}

fn policy(max_retries: i32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        ping_retry_delay: Duration::seconds(60),
        invoke_retry_delay: Duration::seconds(30),
        liveness_ttl: None,
    }
}

struct Fixture {
    relays: MockRelayRepository,
    devices: MockDeviceRepository,
}

impl Fixture {
    /// One relay (id 1) targeting one device (id 1).
    fn new(online: bool, expected_result: Option<i64>) -> Self {
        let mut device = DeviceBuilder::new().with_id(1).with_external_id("dev0");
        if online {
            device = device.online_at(Utc::now() - Duration::hours(1));
        }
        let mut relay = RelayBuilder::new().with_id(1).with_device_id(1);
        if let Some(expected) = expected_result {
            relay = relay.with_expected_result(expected);
        }

        Self {
            relays: MockRelayRepository::with_relays(vec![relay.build()]),
            devices: MockDeviceRepository::with_devices(vec![device.build()]),
        }
    }

    fn processor(&self, cloud: MockCloud, policy: RetryPolicy) -> RelayProcessor {
        RelayProcessor::new(
            Arc::new(self.relays.clone()),
            Arc::new(self.devices.clone()),
            Arc::new(cloud),
            policy,
        )
    }
}

#[tokio::test]
async fn test_new_device_happy_path() {
    let fixture = Fixture::new(false, None);
    let mut cloud = MockCloud::new();
    cloud
        .expect_probe_liveness()
        .times(1)
        .returning(|_| Ok(true));
    cloud
        .expect_invoke()
        .times(1)
        .returning(|_, _, _, _| Ok(true));

    let outcome = fixture.processor(cloud, policy(3)).process(1).await;

    assert_eq!(outcome, ProcessOutcome::Completed { tries: 1 });
    let relay = fixture.relays.get(1).unwrap();
    assert_eq!(relay.status, RelayStatus::Complete);
    assert_eq!(relay.tries, 1);
    assert!(fixture.devices.get(1).unwrap().last_online.is_some());
}

#[tokio::test]
async fn test_confirmed_device_is_not_probed_again() {
    let fixture = Fixture::new(true, None);
    let mut cloud = MockCloud::new();
    cloud.expect_probe_liveness().never();
    cloud
        .expect_invoke()
        .times(1)
        .returning(|_, _, _, _| Ok(true));

    let outcome = fixture.processor(cloud, policy(3)).process(1).await;
    assert_eq!(outcome, ProcessOutcome::Completed { tries: 1 });
}

#[tokio::test]
async fn test_stale_confirmation_is_probed_with_ttl() {
    let fixture = Fixture::new(true, None);
    let mut cloud = MockCloud::new();
    cloud
        .expect_probe_liveness()
        .times(1)
        .returning(|_| Ok(true));
    cloud
        .expect_invoke()
        .times(1)
        .returning(|_, _, _, _| Ok(true));

    let mut with_ttl = policy(3);
    with_ttl.liveness_ttl = Some(Duration::minutes(5));
    let outcome = fixture.processor(cloud, with_ttl).process(1).await;
    assert_eq!(outcome, ProcessOutcome::Completed { tries: 1 });
}

#[tokio::test]
async fn test_result_mismatch_fails_after_one_attempt() {
    let fixture = Fixture::new(true, Some(2));
    let original_schedule = fixture.relays.get(1).unwrap().scheduled_time;
    let mut cloud = MockCloud::new();
    cloud
        .expect_invoke()
        .times(1)
        .returning(|_, _, _, expected| Ok(expected != Some(2)));

    let outcome = fixture.processor(cloud, policy(3)).process(1).await;

    assert_eq!(outcome, ProcessOutcome::Failed { tries: 1 });
    let relay = fixture.relays.get(1).unwrap();
    assert_eq!(relay.status, RelayStatus::Failed);
    assert_eq!(relay.tries, 1);
    assert_eq!(relay.scheduled_time, original_schedule);
}

#[tokio::test]
async fn test_retry_budget_exhausted_after_max_retries_plus_one() {
    let fixture = Fixture::new(true, Some(1));
    let mut cloud = MockCloud::new();
    cloud
        .expect_invoke()
        .times(4)
        .returning(|_, _, _, _| Err(RelayError::device_api("HTTP 502")));
    let processor = fixture.processor(cloud, policy(3));

    for pass in 1..=3 {
        let before = Utc::now();
        let outcome = processor.process(1).await;
        assert_eq!(outcome, ProcessOutcome::Rescheduled { tries: pass });

        let relay = fixture.relays.get(1).unwrap();
        assert_eq!(relay.status, RelayStatus::Ready);
        assert_eq!(relay.tries, pass);
        assert!(relay.scheduled_time >= before + Duration::seconds(30));
    }

    let scheduled_before_last = fixture.relays.get(1).unwrap().scheduled_time;
    let outcome = processor.process(1).await;
    assert_eq!(outcome, ProcessOutcome::Failed { tries: 4 });

    let relay = fixture.relays.get(1).unwrap();
    assert_eq!(relay.status, RelayStatus::Failed);
    assert_eq!(relay.tries, 4);
    assert_eq!(relay.scheduled_time, scheduled_before_last);
}

#[tokio::test]
async fn test_timeout_counts_as_invocation_fault() {
    let fixture = Fixture::new(true, None);
    let mut cloud = MockCloud::new();
    cloud
        .expect_invoke()
        .times(1)
        .returning(|_, _, _, _| Err(RelayError::timeout_error("invoke")));

    let outcome = fixture.processor(cloud, policy(3)).process(1).await;
    assert_eq!(outcome, ProcessOutcome::Rescheduled { tries: 1 });
}

#[tokio::test]
async fn test_zero_retries_fails_on_first_fault() {
    let fixture = Fixture::new(true, None);
    let mut cloud = MockCloud::new();
    cloud
        .expect_invoke()
        .times(1)
        .returning(|_, _, _, _| Err(RelayError::device_api("offline")));

    let outcome = fixture.processor(cloud, policy(0)).process(1).await;
    assert_eq!(outcome, ProcessOutcome::Failed { tries: 1 });
}

#[tokio::test]
async fn test_liveness_faults_never_spend_tries() {
    let fixture = Fixture::new(false, None);
    let mut cloud = MockCloud::new();
    let mut calls = 0;
    cloud.expect_probe_liveness().times(6).returning(move |_| {
        calls += 1;
        if calls % 2 == 0 {
            Ok(false)
        } else {
            Err(RelayError::timeout_error("ping"))
        }
    });
    cloud.expect_invoke().never();
    let processor = fixture.processor(cloud, policy(3));

    for _ in 0..6 {
        let before = Utc::now();
        assert_eq!(processor.process(1).await, ProcessOutcome::Deferred);

        let relay = fixture.relays.get(1).unwrap();
        assert_eq!(relay.status, RelayStatus::Ready);
        assert_eq!(relay.tries, 0);
        assert!(relay.scheduled_time >= before + Duration::seconds(60));
    }
    assert!(fixture.devices.get(1).unwrap().last_online.is_none());
}

#[tokio::test]
async fn test_liveness_write_failure_leaves_relay_untouched() {
    let fixture = Fixture::new(false, None);
    fixture.devices.set_fail_writes(true);
    let before = fixture.relays.get(1).unwrap();

    let mut cloud = MockCloud::new();
    cloud
        .expect_probe_liveness()
        .times(1)
        .returning(|_| Ok(true));
    cloud.expect_invoke().never();

    let outcome = fixture.processor(cloud, policy(3)).process(1).await;

    assert_eq!(outcome, ProcessOutcome::PersistenceFault);
    assert_eq!(fixture.relays.get(1).unwrap(), before);
}

#[tokio::test]
async fn test_result_write_failure_is_reported() {
    let fixture = Fixture::new(true, None);
    fixture.relays.set_fail_writes(true);

    let mut cloud = MockCloud::new();
    cloud
        .expect_invoke()
        .times(1)
        .returning(|_, _, _, _| Ok(true));

    let outcome = fixture.processor(cloud, policy(3)).process(1).await;

    assert_eq!(outcome, ProcessOutcome::PersistenceFault);
    let relay = fixture.relays.get(1).unwrap();
    assert_eq!(relay.status, RelayStatus::Ready);
    assert_eq!(relay.tries, 0);
}

#[tokio::test]
async fn test_missing_or_terminal_relay_is_skipped() {
    let fixture = Fixture::new(true, None);
    fixture.relays.insert(
        RelayBuilder::new()
            .with_id(2)
            .with_device_id(1)
            .with_status(RelayStatus::Cancelled)
            .build(),
    );

    let mut cloud = MockCloud::new();
    cloud.expect_probe_liveness().never();
    cloud.expect_invoke().never();
    let processor = fixture.processor(cloud, policy(3));

    assert_eq!(processor.process(99).await, ProcessOutcome::Skipped);
    assert_eq!(processor.process(2).await, ProcessOutcome::Skipped);
    assert_eq!(
        fixture.relays.get(2).unwrap().status,
        RelayStatus::Cancelled
    );
}

#[tokio::test]
async fn test_invoke_receives_relay_fields() {
    let fixture = Fixture::new(true, Some(7));
    fixture.relays.insert(
        RelayBuilder::new()
            .with_id(1)
            .with_device_id(1)
            .with_function("setLevel")
            .with_argument("42")
            .with_expected_result(7)
            .build(),
    );

    let mut cloud = MockCloud::new();
    cloud
        .expect_invoke()
        .times(1)
        .returning(|device, function, argument, expected| {
            Ok(device == "dev0" && function == "setLevel" && argument == "42" && expected == Some(7))
        });

    let outcome = fixture.processor(cloud, policy(3)).process(1).await;
    assert_eq!(outcome, ProcessOutcome::Completed { tries: 1 });
}

#[tokio::test]
async fn test_oversized_retry_delays_do_not_overflow() {
    let fixture = Fixture::new(true, None);
    let mut cloud = MockCloud::new();
    cloud
        .expect_invoke()
        .times(1)
        .returning(|_, _, _, _| Err(RelayError::device_api("HTTP 502")));

    let config = DispatcherConfig {
        invoke_retry_seconds: 10_000_000_000_000,
        ..Default::default()
    };
    let before = Utc::now();
    let outcome = fixture
        .processor(cloud, RetryPolicy::from(&config))
        .process(1)
        .await;

    assert_eq!(outcome, ProcessOutcome::Rescheduled { tries: 1 });
    let relay = fixture.relays.get(1).unwrap();
    assert!(relay.scheduled_time > before + Duration::days(364));
    assert!(relay.scheduled_time <= Utc::now() + Duration::days(365));
}

#[tokio::test]
async fn test_oversized_ping_delay_still_defers() {
    let fixture = Fixture::new(false, None);
    let mut cloud = MockCloud::new();
    cloud
        .expect_probe_liveness()
        .times(1)
        .returning(|_| Ok(false));
    cloud.expect_invoke().never();

    // Far beyond the representable date range
    let mut far = policy(3);
    far.ping_retry_delay = Duration::weeks(10_000_000_000);
    let outcome = fixture.processor(cloud, far).process(1).await;

    assert_eq!(outcome, ProcessOutcome::Deferred);
    let relay = fixture.relays.get(1).unwrap();
    assert_eq!(relay.tries, 0);
    assert!(relay.scheduled_time <= Utc::now() + Duration::days(365));
}
