use async_trait::async_trait;
use relay_core::{traits::DeviceClient, RelayError, RelayResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Deterministic device cloud for local runs and tests.
///
/// Liveness is keyed on the device id suffix: `|1` fails the probe, `|2`
/// reports the device offline, anything else is online. Invocation is keyed
/// on the expected result: `1` fails the call, `2` returns a mismatch, any
/// other value (or none) matches.
#[derive(Debug, Clone, Default)]
pub struct MockDeviceClient {
    latency: Duration,
    probes: Arc<AtomicUsize>,
    invocations: Arc<AtomicUsize>,
}

impl MockDeviceClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn invoke_count(&self) -> usize {
        self.invocations.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl DeviceClient for MockDeviceClient {
    async fn probe_liveness(&self, external_id: &str) -> RelayResult<bool> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        if external_id.ends_with("|1") {
            return Err(RelayError::device_api(format!(
                "mock ping failure for {external_id}"
            )));
        }
        let online = !external_id.ends_with("|2");
        debug!(device = %external_id, online, "mock ping");
        Ok(online)
    }

    async fn invoke(
        &self,
        external_id: &str,
        function: &str,
        argument: &str,
        expected_result: Option<i64>,
    ) -> RelayResult<bool> {
        self.invocations.fetch_add(1, Ordering::SeqCst);
        self.simulate_latency().await;

        debug!(device = %external_id, function, argument, ?expected_result, "mock invoke");
        match expected_result {
            Some(1) => Err(RelayError::device_api(format!(
                "mock invoke failure for {external_id}/{function}"
            ))),
            Some(2) => Ok(false),
            _ => Ok(true),
        }
    }
}
