use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Device;

/// One scheduled remote function invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relay {
    pub id: i64,
    pub device_id: i64,
    pub function: String,
    pub argument: String,
    /// `None` means the returned value is not checked.
    pub expected_result: Option<i64>,
    pub scheduled_time: DateTime<Utc>,
    pub status: RelayStatus,
    /// Completed invocation attempts. Liveness probes are not counted.
    pub tries: i32,
}

impl Relay {
    pub fn is_ready(&self) -> bool {
        self.status == RelayStatus::Ready
    }

    pub fn is_eligible(&self, now: DateTime<Utc>) -> bool {
        self.is_ready() && self.scheduled_time <= now
    }
}

impl fmt::Display for Relay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "relay {} (device {}, function {}, argument {:?})",
            self.id, self.device_id, self.function, self.argument
        )
    }
}

/// Values needed to insert a relay; id, status and tries are assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRelay {
    pub device_id: i64,
    pub function: String,
    pub argument: String,
    pub expected_result: Option<i64>,
    pub scheduled_time: DateTime<Utc>,
}

/// A relay together with the device it targets, as reported to API callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayDetails {
    pub id: i64,
    pub device: Device,
    pub function: String,
    pub argument: String,
    pub expected_result: Option<i64>,
    pub scheduled_time: DateTime<Utc>,
    pub status: RelayStatus,
    pub tries: i32,
}

impl RelayDetails {
    pub fn new(relay: Relay, device: Device) -> Self {
        Self {
            id: relay.id,
            device,
            function: relay.function,
            argument: relay.argument,
            expected_result: relay.expected_result,
            scheduled_time: relay.scheduled_time,
            status: relay.status,
            tries: relay.tries,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum RelayStatus {
    #[serde(rename = "READY")]
    Ready,
    #[serde(rename = "FAILED")]
    Failed,
    #[serde(rename = "COMPLETE")]
    Complete,
    #[serde(rename = "CANCELLED")]
    Cancelled,
}

impl RelayStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelayStatus::Ready => "READY",
            RelayStatus::Failed => "FAILED",
            RelayStatus::Complete => "COMPLETE",
            RelayStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RelayStatus::Ready)
    }
}

impl fmt::Display for RelayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RelayStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "READY" => Ok(RelayStatus::Ready),
            "FAILED" => Ok(RelayStatus::Failed),
            "COMPLETE" => Ok(RelayStatus::Complete),
            "CANCELLED" => Ok(RelayStatus::Cancelled),
            _ => Err(format!("Invalid relay status: {s}")),
        }
    }
}

impl sqlx::Type<sqlx::Sqlite> for RelayStatus {
    fn type_info() -> sqlx::sqlite::SqliteTypeInfo {
        <str as sqlx::Type<sqlx::Sqlite>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, sqlx::Sqlite> for RelayStatus {
    fn decode(value: sqlx::sqlite::SqliteValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <&str as sqlx::Decode<sqlx::Sqlite>>::decode(value)?;
        Ok(s.parse::<RelayStatus>()?)
    }
}

impl<'q> sqlx::Encode<'q, sqlx::Sqlite> for RelayStatus {
    fn encode_by_ref(
        &self,
        buf: &mut Vec<sqlx::sqlite::SqliteArgumentValue<'q>>,
    ) -> Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync>> {
        <&str as sqlx::Encode<sqlx::Sqlite>>::encode(self.as_str(), buf)
    }
}
