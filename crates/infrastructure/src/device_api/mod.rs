//! Remote device cloud clients

pub mod mock;
pub mod particle;

pub use mock::MockDeviceClient;
pub use particle::ParticleClient;

use anyhow::Context;
use async_trait::async_trait;
use relay_core::{
    config::{DeviceApiConfig, DeviceProvider},
    traits::DeviceClient,
    RelayResult,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::timeout_handler::TimeoutHandler;

/// Bounds every call of the wrapped client by the configured call timeout.
pub struct TimedDeviceClient {
    inner: Arc<dyn DeviceClient>,
    timeout_handler: TimeoutHandler,
}

impl TimedDeviceClient {
    pub fn new(inner: Arc<dyn DeviceClient>, call_timeout: Duration) -> Self {
        Self {
            inner,
            timeout_handler: TimeoutHandler::for_device_calls(call_timeout),
        }
    }
}

#[async_trait]
impl DeviceClient for TimedDeviceClient {
    async fn probe_liveness(&self, external_id: &str) -> RelayResult<bool> {
        self.timeout_handler
            .device_operation(self.inner.probe_liveness(external_id), "probe_liveness")
            .await
    }

    async fn invoke(
        &self,
        external_id: &str,
        function: &str,
        argument: &str,
        expected_result: Option<i64>,
    ) -> RelayResult<bool> {
        self.timeout_handler
            .device_operation(
                self.inner
                    .invoke(external_id, function, argument, expected_result),
                "invoke",
            )
            .await
    }
}

/// Builds the configured device client, wrapped with `call_timeout`.
///
/// For the Particle provider the access token is checked first when
/// `verify_token_on_startup` is set.
pub async fn build_device_client(
    config: &DeviceApiConfig,
    call_timeout: Duration,
) -> anyhow::Result<Arc<dyn DeviceClient>> {
    let inner: Arc<dyn DeviceClient> = match config.provider {
        DeviceProvider::Mock => {
            info!("Using mock device client");
            Arc::new(MockDeviceClient::with_latency(Duration::from_millis(
                config.mock_latency_millis,
            )))
        }
        DeviceProvider::Particle => {
            let client = ParticleClient::new(&config.base_url, &config.access_token);
            if config.verify_token_on_startup {
                let valid = client
                    .verify_token()
                    .await
                    .context("验证设备API访问令牌失败")?;
                if !valid {
                    return Err(anyhow::anyhow!("设备API访问令牌无效"));
                }
                info!("Device API access token verified");
            }
            info!("Using Particle device client at {}", config.base_url);
            Arc::new(client)
        }
    };

    Ok(Arc::new(TimedDeviceClient::new(inner, call_timeout)))
}
