//! Test data builders for creating test entities

use chrono::{DateTime, Utc};
use relay_core::models::{Device, NewRelay, Relay, RelayStatus};

/// Builder for creating test Relay entities
pub struct RelayBuilder {
    relay: Relay,
}

impl RelayBuilder {
    pub fn new() -> Self {
        Self {
            relay: Relay {
                id: 1,
                device_id: 1,
                function: "toggle".to_string(),
                argument: String::new(),
                expected_result: None,
                scheduled_time: Utc::now() - chrono::Duration::seconds(1),
                status: RelayStatus::Ready,
                tries: 0,
            },
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.relay.id = id;
        self
    }

    pub fn with_device_id(mut self, device_id: i64) -> Self {
        self.relay.device_id = device_id;
        self
    }

    pub fn with_function(mut self, function: &str) -> Self {
        self.relay.function = function.to_string();
        self
    }

    pub fn with_argument(mut self, argument: &str) -> Self {
        self.relay.argument = argument.to_string();
        self
    }

    pub fn with_expected_result(mut self, expected: i64) -> Self {
        self.relay.expected_result = Some(expected);
        self
    }

    pub fn with_scheduled_time(mut self, scheduled_time: DateTime<Utc>) -> Self {
        self.relay.scheduled_time = scheduled_time;
        self
    }

    pub fn with_status(mut self, status: RelayStatus) -> Self {
        self.relay.status = status;
        self
    }

    pub fn with_tries(mut self, tries: i32) -> Self {
        self.relay.tries = tries;
        self
    }

    pub fn build(self) -> Relay {
        self.relay
    }

    /// Strips the store-assigned fields for use with `RelayRepository::create`.
    pub fn build_new(self) -> NewRelay {
        NewRelay {
            device_id: self.relay.device_id,
            function: self.relay.function,
            argument: self.relay.argument,
            expected_result: self.relay.expected_result,
            scheduled_time: self.relay.scheduled_time,
        }
    }
}

impl Default for RelayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for creating test Device entities
pub struct DeviceBuilder {
    device: Device,
}

impl DeviceBuilder {
    pub fn new() -> Self {
        Self {
            device: Device::new(1, "test-device"),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.device.id = id;
        self
    }

    pub fn with_external_id(mut self, external_id: &str) -> Self {
        self.device.external_id = external_id.to_string();
        self
    }

    pub fn online_at(mut self, at: DateTime<Utc>) -> Self {
        self.device.last_online = Some(at);
        self
    }

    pub fn build(self) -> Device {
        self.device
    }
}

impl Default for DeviceBuilder {
    fn default() -> Self {
        Self::new()
    }
}
