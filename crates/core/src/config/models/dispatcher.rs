use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Longest retry delay or liveness window accepted, one year.
pub const MAX_DELAY_SECONDS: u64 = 365 * 24 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub enabled: bool,
    /// Relays processed at the same time within one batch.
    pub max_concurrency: usize,
    /// Upper bound on relay ids returned by one poll.
    pub batch_limit: u32,
    /// Invocation attempts allowed before a relay is failed.
    pub max_retries: i32,
    pub ping_retry_seconds: u64,
    pub invoke_retry_seconds: u64,
    pub call_timeout_seconds: u64,
    pub idle_interval_millis: u64,
    pub cancellation_page_size: u32,
    /// When set, a device last confirmed online longer ago than this is probed again.
    pub liveness_ttl_seconds: Option<u64>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_concurrency: 4,
            batch_limit: 100,
            max_retries: 3,
            ping_retry_seconds: 60,
            invoke_retry_seconds: 60,
            call_timeout_seconds: 30,
            idle_interval_millis: 500,
            cancellation_page_size: 100,
            liveness_ttl_seconds: None,
        }
    }
}

fn capped_delay(seconds: u64) -> chrono::Duration {
    // Bounded by MAX_DELAY_SECONDS, so the cast and conversion cannot overflow
    chrono::Duration::seconds(seconds.min(MAX_DELAY_SECONDS) as i64)
}

impl DispatcherConfig {
    pub fn ping_retry_delay(&self) -> chrono::Duration {
        capped_delay(self.ping_retry_seconds)
    }

    pub fn invoke_retry_delay(&self) -> chrono::Duration {
        capped_delay(self.invoke_retry_seconds)
    }

    pub fn liveness_ttl(&self) -> Option<chrono::Duration> {
        self.liveness_ttl_seconds.map(capped_delay)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_seconds)
    }

    pub fn idle_interval(&self) -> Duration {
        Duration::from_millis(self.idle_interval_millis)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.max_concurrency == 0 {
            return Err(anyhow::anyhow!("最大并发数必须大于0"));
        }

        if self.batch_limit == 0 {
            return Err(anyhow::anyhow!("批次大小必须大于0"));
        }

        if self.max_retries < 0 {
            return Err(anyhow::anyhow!("最大重试次数不能为负数"));
        }

        if self.call_timeout_seconds == 0 {
            return Err(anyhow::anyhow!("设备调用超时时间必须大于0"));
        }

        if self.cancellation_page_size == 0 {
            return Err(anyhow::anyhow!("取消队列分页大小必须大于0"));
        }

        if self.liveness_ttl_seconds == Some(0) {
            return Err(anyhow::anyhow!("设备在线有效期必须大于0"));
        }

        if self.ping_retry_seconds > MAX_DELAY_SECONDS {
            return Err(anyhow::anyhow!(
                "在线探测重试间隔不能超过{}秒",
                MAX_DELAY_SECONDS
            ));
        }

        if self.invoke_retry_seconds > MAX_DELAY_SECONDS {
            return Err(anyhow::anyhow!(
                "调用重试间隔不能超过{}秒",
                MAX_DELAY_SECONDS
            ));
        }

        if self
            .liveness_ttl_seconds
            .is_some_and(|ttl| ttl > MAX_DELAY_SECONDS)
        {
            return Err(anyhow::anyhow!(
                "设备在线有效期不能超过{}秒",
                MAX_DELAY_SECONDS
            ));
        }

        Ok(())
    }
}
