//! Timeout handling utilities for async operations
//!
//! Bounds calls to the remote device cloud. A timed-out call surfaces as
//! `RelayError::Timeout` so callers handle it like any other call failure.

use relay_core::{RelayError, RelayResult};
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, instrument};

/// Timeout handler utility for async operations
#[derive(Debug, Clone)]
pub struct TimeoutHandler {
    device_call_timeout: Duration,
}

impl TimeoutHandler {
    /// Handler whose device calls are bounded by `call_timeout`.
    pub fn for_device_calls(call_timeout: Duration) -> Self {
        Self {
            device_call_timeout: call_timeout,
        }
    }

    /// Execute remote device call with timeout
    #[instrument(skip(self, operation))]
    pub async fn device_operation<F, T>(&self, operation: F, operation_name: &str) -> RelayResult<T>
    where
        F: Future<Output = RelayResult<T>>,
    {
        self.execute_with_timeout(
            operation,
            self.device_call_timeout,
            "device",
            operation_name,
        )
        .await
    }

    async fn execute_with_timeout<F, T>(
        &self,
        operation: F,
        timeout_duration: Duration,
        operation_type: &str,
        operation_name: &str,
    ) -> RelayResult<T>
    where
        F: Future<Output = RelayResult<T>>,
    {
        match timeout(timeout_duration, operation).await {
            Ok(result) => result,
            Err(_) => {
                let error_msg = format!(
                    "{operation_type} operation '{operation_name}' timed out after {timeout_duration:?}"
                );
                error!("{}", error_msg);
                Err(RelayError::timeout_error(error_msg))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::sleep;

    #[tokio::test]
    async fn test_timeout_handler_success() {
        let handler = TimeoutHandler::for_device_calls(Duration::from_secs(30));

        let result = handler
            .device_operation(async { Ok("online") }, "ping")
            .await;

        assert_eq!(result.unwrap(), "online");
    }

    #[tokio::test]
    async fn test_timeout_handler_timeout() {
        let handler = TimeoutHandler::for_device_calls(Duration::from_millis(50));

        let result = handler
            .device_operation(
                async {
                    sleep(Duration::from_millis(200)).await;
                    Ok(true)
                },
                "slow_invoke",
            )
            .await;

        let error = result.unwrap_err();
        assert!(matches!(error, RelayError::Timeout(_)));
        assert!(error.to_string().contains("slow_invoke"));
    }

    #[tokio::test]
    async fn test_inner_error_passes_through() {
        let handler = TimeoutHandler::for_device_calls(Duration::from_secs(30));
        let result: RelayResult<()> = handler
            .device_operation(async { Err(RelayError::device_api("HTTP 502")) }, "ping")
            .await;
        assert!(matches!(result, Err(RelayError::DeviceApi(_))));
    }
}
