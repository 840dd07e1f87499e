use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A controllable remote endpoint, addressed by its caller-supplied external id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,
    pub external_id: String,
    /// Set by the first successful liveness probe; `None` means unknown.
    pub last_online: Option<DateTime<Utc>>,
}

impl Device {
    pub fn new(id: i64, external_id: impl Into<String>) -> Self {
        Self {
            id,
            external_id: external_id.into(),
            last_online: None,
        }
    }

    /// Whether a liveness probe is required before invoking on this device.
    ///
    /// Without a `ttl` a confirmed device is trusted indefinitely. With one, a
    /// confirmation older than `ttl` is treated as stale.
    pub fn needs_probe(&self, now: DateTime<Utc>, ttl: Option<Duration>) -> bool {
        match (self.last_online, ttl) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(seen), Some(ttl)) => now - seen > ttl,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_device_needs_probe() {
        let device = Device::new(1, "dev0");
        assert!(device.needs_probe(Utc::now(), None));
        assert!(device.needs_probe(Utc::now(), Some(Duration::seconds(30))));
    }

    #[test]
    fn test_confirmed_device_trusted_without_ttl() {
        let now = Utc::now();
        let mut device = Device::new(1, "dev0");
        device.last_online = Some(now - Duration::days(365));
        assert!(!device.needs_probe(now, None));
    }

    #[test]
    fn test_stale_confirmation_with_ttl() {
        let now = Utc::now();
        let mut device = Device::new(1, "dev0");
        device.last_online = Some(now - Duration::seconds(120));
        assert!(device.needs_probe(now, Some(Duration::seconds(60))));
        assert!(!device.needs_probe(now, Some(Duration::seconds(300))));
    }
}
