//! Mock implementations for the store traits
//!
//! In-memory implementations used by unit tests that do not need a real
//! SQLite database. Each mock can be switched into a failing mode to
//! exercise persistence fault paths.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::models::{Cancellation, Device, NewRelay, Relay, RelayStatus};
use relay_core::traits::{CancellationRepository, DeviceRepository, RelayRepository};
use relay_core::{RelayError, RelayResult};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

fn injected_failure(operation: &str) -> RelayError {
    RelayError::Internal(format!("injected {operation} failure"))
}

/// Mock implementation of DeviceRepository for testing
#[derive(Debug, Clone)]
pub struct MockDeviceRepository {
    devices: Arc<Mutex<HashMap<i64, Device>>>,
    next_id: Arc<Mutex<i64>>,
    fail_writes: Arc<AtomicBool>,
}

impl MockDeviceRepository {
    pub fn new() -> Self {
        Self {
            devices: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(Mutex::new(1)),
            fail_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_devices(devices: Vec<Device>) -> Self {
        let max_id = devices.iter().map(|d| d.id).max().unwrap_or(0);
        let device_map = devices.into_iter().map(|d| (d.id, d)).collect();

        Self {
            devices: Arc::new(Mutex::new(device_map)),
            next_id: Arc::new(Mutex::new(max_id + 1)),
            fail_writes: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes `set_last_online` fail until switched back.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, id: i64) -> Option<Device> {
        self.devices.lock().unwrap().get(&id).cloned()
    }

    pub fn count(&self) -> usize {
        self.devices.lock().unwrap().len()
    }
}

impl Default for MockDeviceRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DeviceRepository for MockDeviceRepository {
    async fn insert_or_get(&self, external_id: &str) -> RelayResult<i64> {
        let mut devices = self.devices.lock().unwrap();
        if let Some(existing) = devices.values().find(|d| d.external_id == external_id) {
            return Ok(existing.id);
        }

        let mut next_id = self.next_id.lock().unwrap();
        let id = *next_id;
        *next_id += 1;
        devices.insert(id, Device::new(id, external_id));
        Ok(id)
    }

    async fn get_by_id(&self, id: i64) -> RelayResult<Option<Device>> {
        Ok(self.devices.lock().unwrap().get(&id).cloned())
    }

    async fn set_last_online(&self, id: i64, at: DateTime<Utc>) -> RelayResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected_failure("set_last_online"));
        }
        let mut devices = self.devices.lock().unwrap();
        match devices.get_mut(&id) {
            Some(device) => {
                device.last_online = Some(at);
                Ok(())
            }
            None => Err(RelayError::DeviceNotFound { id }),
        }
    }
}

/// Mock implementation of RelayRepository for testing
///
/// Relays are kept ordered by id so ready-id selection matches the SQL
/// implementation.
#[derive(Debug, Clone)]
pub struct MockRelayRepository {
    relays: Arc<Mutex<BTreeMap<i64, Relay>>>,
    next_id: Arc<Mutex<i64>>,
    fail_writes: Arc<AtomicBool>,
    fail_selects: Arc<AtomicBool>,
    select_calls: Arc<Mutex<Vec<i64>>>,
}

impl MockRelayRepository {
    pub fn new() -> Self {
        Self::with_relays(Vec::new())
    }

    pub fn with_relays(relays: Vec<Relay>) -> Self {
        let max_id = relays.iter().map(|r| r.id).max().unwrap_or(0);
        let relay_map = relays.into_iter().map(|r| (r.id, r)).collect();

        Self {
            relays: Arc::new(Mutex::new(relay_map)),
            next_id: Arc::new(Mutex::new(max_id + 1)),
            fail_writes: Arc::new(AtomicBool::new(false)),
            fail_selects: Arc::new(AtomicBool::new(false)),
            select_calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Makes `update` and `update_status` fail until switched back.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Makes `select_ready_ids` fail until switched back.
    pub fn set_fail_selects(&self, fail: bool) {
        self.fail_selects.store(fail, Ordering::SeqCst);
    }

    pub fn get(&self, id: i64) -> Option<Relay> {
        self.relays.lock().unwrap().get(&id).cloned()
    }

    pub fn insert(&self, relay: Relay) {
        let mut next_id = self.next_id.lock().unwrap();
        if relay.id >= *next_id {
            *next_id = relay.id + 1;
        }
        self.relays.lock().unwrap().insert(relay.id, relay);
    }

    pub fn get_all_relays(&self) -> Vec<Relay> {
        self.relays.lock().unwrap().values().cloned().collect()
    }

    /// Cursor values passed to `select_ready_ids`, in call order.
    pub fn select_cursors(&self) -> Vec<i64> {
        self.select_calls.lock().unwrap().clone()
    }
}

impl Default for MockRelayRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RelayRepository for MockRelayRepository {
    async fn create(&self, relay: &NewRelay) -> RelayResult<Relay> {
        let mut relays = self.relays.lock().unwrap();
        let mut next_id = self.next_id.lock().unwrap();

        let created = Relay {
            id: *next_id,
            device_id: relay.device_id,
            function: relay.function.clone(),
            argument: relay.argument.clone(),
            expected_result: relay.expected_result,
            scheduled_time: relay.scheduled_time,
            status: RelayStatus::Ready,
            tries: 0,
        };
        *next_id += 1;

        relays.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_by_id(&self, id: i64) -> RelayResult<Option<Relay>> {
        Ok(self.relays.lock().unwrap().get(&id).cloned())
    }

    async fn select_ready_ids(
        &self,
        cursor: i64,
        now: DateTime<Utc>,
        limit: u32,
    ) -> RelayResult<Vec<i64>> {
        self.select_calls.lock().unwrap().push(cursor);
        if self.fail_selects.load(Ordering::SeqCst) {
            return Err(injected_failure("select_ready_ids"));
        }

        let relays = self.relays.lock().unwrap();
        let mut lowest_per_device: HashMap<i64, i64> = HashMap::new();
        for relay in relays.range(cursor..).map(|(_, r)| r) {
            if relay.is_eligible(now) {
                lowest_per_device.entry(relay.device_id).or_insert(relay.id);
            }
        }

        let mut ids: Vec<i64> = lowest_per_device.into_values().collect();
        ids.sort_unstable();
        ids.truncate(limit as usize);
        Ok(ids)
    }

    async fn update(
        &self,
        id: i64,
        scheduled_time: DateTime<Utc>,
        status: RelayStatus,
        tries: i32,
    ) -> RelayResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected_failure("update"));
        }
        let mut relays = self.relays.lock().unwrap();
        let relay = relays
            .get_mut(&id)
            .ok_or(RelayError::RelayNotFound { id })?;
        relay.scheduled_time = scheduled_time;
        relay.status = status;
        relay.tries = tries;
        Ok(())
    }

    async fn update_status(&self, id: i64, status: RelayStatus) -> RelayResult<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(injected_failure("update_status"));
        }
        let mut relays = self.relays.lock().unwrap();
        let relay = relays
            .get_mut(&id)
            .ok_or(RelayError::RelayNotFound { id })?;
        relay.status = status;
        Ok(())
    }
}

/// Mock implementation of CancellationRepository for testing
#[derive(Debug, Clone)]
pub struct MockCancellationRepository {
    cancellations: Arc<Mutex<BTreeMap<i64, Cancellation>>>,
    next_id: Arc<Mutex<i64>>,
    fail_lists: Arc<AtomicBool>,
}

impl MockCancellationRepository {
    pub fn new() -> Self {
        Self {
            cancellations: Arc::new(Mutex::new(BTreeMap::new())),
            next_id: Arc::new(Mutex::new(1)),
            fail_lists: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Makes `list` fail until switched back.
    pub fn set_fail_lists(&self, fail: bool) {
        self.fail_lists.store(fail, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.cancellations.lock().unwrap().len()
    }
}

impl Default for MockCancellationRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CancellationRepository for MockCancellationRepository {
    async fn list(&self, limit: u32) -> RelayResult<Vec<Cancellation>> {
        if self.fail_lists.load(Ordering::SeqCst) {
            return Err(injected_failure("list"));
        }
        let cancellations = self.cancellations.lock().unwrap();
        Ok(cancellations
            .values()
            .take(limit as usize)
            .copied()
            .collect())
    }

    async fn insert(&self, relay_id: i64) -> RelayResult<i64> {
        let mut cancellations = self.cancellations.lock().unwrap();
        if cancellations.values().any(|c| c.relay_id == relay_id) {
            return Ok(0);
        }

        let mut next_id = self.next_id.lock().unwrap();
        let id = *next_id;
        *next_id += 1;
        cancellations.insert(id, Cancellation { id, relay_id });
        Ok(id)
    }

    async fn delete(&self, id: i64) -> RelayResult<()> {
        let mut cancellations = self.cancellations.lock().unwrap();
        match cancellations.remove(&id) {
            Some(_) => Ok(()),
            None => Err(RelayError::Internal(format!(
                "cancellation {id} was not pending"
            ))),
        }
    }
}
