use async_trait::async_trait;

use crate::RelayResult;

/// Client for the remote device cloud.
///
/// Both calls may fail; callers treat an `Err` as a transient fault and a
/// returned `false` as a definite answer.
#[async_trait]
pub trait DeviceClient: Send + Sync {
    /// Asks whether the device is currently reachable.
    async fn probe_liveness(&self, external_id: &str) -> RelayResult<bool>;

    /// Invokes `function` with `argument` on the device.
    ///
    /// Returns `true` when the call succeeded and, if `expected_result` is
    /// set, the device returned exactly that value.
    async fn invoke(
        &self,
        external_id: &str,
        function: &str,
        argument: &str,
        expected_result: Option<i64>,
    ) -> RelayResult<bool>;
}
