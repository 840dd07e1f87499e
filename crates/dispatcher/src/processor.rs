use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use relay_core::{
    config::{DispatcherConfig, MAX_DELAY_SECONDS},
    models::{Device, Relay, RelayStatus},
    traits::{DeviceClient, DeviceRepository, RelayRepository},
};
use tracing::{debug, error, info, instrument, warn};

/// 重试策略配置
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Failed invocations tolerated before the relay is failed.
    pub max_retries: i32,
    pub ping_retry_delay: Duration,
    pub invoke_retry_delay: Duration,
    /// `None` trusts a confirmed device forever.
    pub liveness_ttl: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&DispatcherConfig::default())
    }
}

impl From<&DispatcherConfig> for RetryPolicy {
    fn from(config: &DispatcherConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            ping_retry_delay: config.ping_retry_delay(),
            invoke_retry_delay: config.invoke_retry_delay(),
            liveness_ttl: config.liveness_ttl(),
        }
    }
}

/// `now + delay`, with the delay capped so the addition cannot overflow.
fn retry_time(delay: Duration) -> DateTime<Utc> {
    let now = Utc::now();
    let delay = delay.min(Duration::seconds(MAX_DELAY_SECONDS as i64));
    now.checked_add_signed(delay).unwrap_or(now)
}

/// What one pass of the processor did to a relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    /// Relay missing or no longer ready; nothing was written.
    Skipped,
    /// Device liveness not confirmed; rescheduled without spending a try.
    Deferred,
    /// Invocation failed within budget; rescheduled.
    Rescheduled { tries: i32 },
    Failed { tries: i32 },
    Completed { tries: i32 },
    /// A store read or write failed; the relay was left as it was.
    PersistenceFault,
}

/// Drives a single relay through liveness check and invocation.
pub struct RelayProcessor {
    relay_repo: Arc<dyn RelayRepository>,
    device_repo: Arc<dyn DeviceRepository>,
    client: Arc<dyn DeviceClient>,
    policy: RetryPolicy,
}

impl RelayProcessor {
    pub fn new(
        relay_repo: Arc<dyn RelayRepository>,
        device_repo: Arc<dyn DeviceRepository>,
        client: Arc<dyn DeviceClient>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            relay_repo,
            device_repo,
            client,
            policy,
        }
    }

    /// Runs one pass for `relay_id`.
    ///
    /// Never returns an error: every failure is either recorded on the relay
    /// or logged and left for a later poll.
    #[instrument(skip(self), fields(device = tracing::field::Empty))]
    pub async fn process(&self, relay_id: i64) -> ProcessOutcome {
        let (relay, device) = match self.load(relay_id).await {
            Ok(loaded) => loaded,
            Err(outcome) => return outcome,
        };
        tracing::Span::current().record("device", device.external_id.as_str());

        if let Some(outcome) = self.check_liveness(&relay, &device).await {
            return outcome;
        }

        self.invoke(&relay, &device).await
    }

    async fn load(&self, relay_id: i64) -> Result<(Relay, Device), ProcessOutcome> {
        let relay = match self.relay_repo.get_by_id(relay_id).await {
            Ok(Some(relay)) => relay,
            Ok(None) => {
                warn!(relay_id, "relay disappeared before processing");
                return Err(ProcessOutcome::Skipped);
            }
            Err(e) => {
                error!(relay_id, "failed to load relay: {}", e);
                return Err(ProcessOutcome::PersistenceFault);
            }
        };

        if !relay.is_ready() {
            debug!(relay_id, status = %relay.status, "relay no longer ready");
            return Err(ProcessOutcome::Skipped);
        }

        match self.device_repo.get_by_id(relay.device_id).await {
            Ok(Some(device)) => Ok((relay, device)),
            Ok(None) => {
                error!(relay_id, device_id = relay.device_id, "relay references a missing device");
                Err(ProcessOutcome::Skipped)
            }
            Err(e) => {
                error!(relay_id, "failed to load device: {}", e);
                Err(ProcessOutcome::PersistenceFault)
            }
        }
    }

    /// Returns `Some` when processing must stop at the liveness gate.
    async fn check_liveness(&self, relay: &Relay, device: &Device) -> Option<ProcessOutcome> {
        let now = Utc::now();
        if !device.needs_probe(now, self.policy.liveness_ttl) {
            return None;
        }

        let online = match self.client.probe_liveness(&device.external_id).await {
            Ok(online) => online,
            Err(e) => {
                warn!(relay_id = relay.id, "liveness probe failed: {}", e);
                false
            }
        };

        if !online {
            info!(relay_id = relay.id, "device not reachable, deferring relay");
            let retry_at = retry_time(self.policy.ping_retry_delay);
            return Some(
                match self
                    .relay_repo
                    .update(relay.id, retry_at, relay.status, relay.tries)
                    .await
                {
                    Ok(()) => ProcessOutcome::Deferred,
                    Err(e) => {
                        error!(relay_id = relay.id, "failed to defer relay: {}", e);
                        ProcessOutcome::PersistenceFault
                    }
                },
            );
        }

        if let Err(e) = self.device_repo.set_last_online(device.id, Utc::now()).await {
            error!(relay_id = relay.id, "failed to record device liveness: {}", e);
            return Some(ProcessOutcome::PersistenceFault);
        }
        debug!(relay_id = relay.id, "device confirmed online");
        None
    }

    async fn invoke(&self, relay: &Relay, device: &Device) -> ProcessOutcome {
        let tries = relay.tries + 1;
        let result = self
            .client
            .invoke(
                &device.external_id,
                &relay.function,
                &relay.argument,
                relay.expected_result,
            )
            .await;

        let (scheduled_time, status, outcome) = match result {
            Err(e) if tries > self.policy.max_retries => {
                warn!(relay_id = relay.id, tries, "invocation failed, retries exhausted: {}", e);
                (
                    relay.scheduled_time,
                    RelayStatus::Failed,
                    ProcessOutcome::Failed { tries },
                )
            }
            Err(e) => {
                warn!(relay_id = relay.id, tries, "invocation failed, will retry: {}", e);
                (
                    retry_time(self.policy.invoke_retry_delay),
                    RelayStatus::Ready,
                    ProcessOutcome::Rescheduled { tries },
                )
            }
            Ok(false) => {
                warn!(relay_id = relay.id, tries, expected = ?relay.expected_result, "result mismatch");
                (
                    relay.scheduled_time,
                    RelayStatus::Failed,
                    ProcessOutcome::Failed { tries },
                )
            }
            Ok(true) => {
                info!(relay_id = relay.id, tries, "relay complete");
                (
                    relay.scheduled_time,
                    RelayStatus::Complete,
                    ProcessOutcome::Completed { tries },
                )
            }
        };

        match self
            .relay_repo
            .update(relay.id, scheduled_time, status, tries)
            .await
        {
            Ok(()) => outcome,
            Err(e) => {
                error!(relay_id = relay.id, "failed to record invocation result: {}", e);
                ProcessOutcome::PersistenceFault
            }
        }
    }
}
