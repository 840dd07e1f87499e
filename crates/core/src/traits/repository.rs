//! 数据仓储层接口定义
//!
//! Store operations used by the dispatch engine and the API layer:
//! - `DeviceRepository` - device lookup and liveness bookkeeping
//! - `RelayRepository` - relay creation, fair ready-work selection and state updates
//! - `CancellationRepository` - the pending cancellation queue
//!
//! Every mutation touches a single row addressed by its primary id.

use crate::models::{Cancellation, Device, NewRelay, Relay, RelayStatus};
use crate::RelayResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait DeviceRepository: Send + Sync {
    /// Returns the id of the device with `external_id`, creating it first if needed.
    async fn insert_or_get(&self, external_id: &str) -> RelayResult<i64>;

    async fn get_by_id(&self, id: i64) -> RelayResult<Option<Device>>;

    /// Records a successful liveness probe. Fails with `DeviceNotFound` if no row matched.
    async fn set_last_online(&self, id: i64, at: DateTime<Utc>) -> RelayResult<()>;
}

#[async_trait]
pub trait RelayRepository: Send + Sync {
    /// Inserts a relay in the `Ready` state with zero tries.
    async fn create(&self, relay: &NewRelay) -> RelayResult<Relay>;

    async fn get_by_id(&self, id: i64) -> RelayResult<Option<Relay>>;

    /// 获取可调度的中继ID
    ///
    /// Among `Ready` relays with `scheduled_time <= now` and `id >= cursor`,
    /// takes the lowest id of each device, sorted ascending and truncated to
    /// `limit`. At most one id per device is ever returned.
    async fn select_ready_ids(
        &self,
        cursor: i64,
        now: DateTime<Utc>,
        limit: u32,
    ) -> RelayResult<Vec<i64>>;

    /// Overwrites the mutable fields of a relay. Fails with `RelayNotFound` if no row matched.
    async fn update(
        &self,
        id: i64,
        scheduled_time: DateTime<Utc>,
        status: RelayStatus,
        tries: i32,
    ) -> RelayResult<()>;

    /// Sets only the status, leaving schedule and tries untouched.
    async fn update_status(&self, id: i64, status: RelayStatus) -> RelayResult<()>;
}

#[async_trait]
pub trait CancellationRepository: Send + Sync {
    /// Returns up to `limit` pending cancellations in insertion order.
    async fn list(&self, limit: u32) -> RelayResult<Vec<Cancellation>>;

    /// Queues a cancellation for `relay_id`.
    ///
    /// Returns the new cancellation id, or `0` when one is already pending
    /// for that relay.
    async fn insert(&self, relay_id: i64) -> RelayResult<i64>;

    async fn delete(&self, id: i64) -> RelayResult<()>;
}
