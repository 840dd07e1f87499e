//! HTTP client for the relay API.
//!
//! Producers use it to create relays, look them up and cancel them. Every
//! JSON response is unwrapped from the `ApiResponse` envelope.

use chrono::{DateTime, Utc};
use relay_core::{models::RelayDetails, RelayError, RelayResult};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::{
    handlers::relays::{CancellationQueued, CreateRelayRequest, RelayCreated},
    response::ApiResponse,
};

pub struct RelayClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl RelayClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http_client: reqwest::Client::new(),
        }
    }

    /// Returns the greeting served at `/`.
    pub async fn ping(&self) -> RelayResult<String> {
        let url = format!("{}/", self.base_url);

        match self.http_client.get(&url).send().await {
            Ok(response) => {
                if response.status().is_success() {
                    response.text().await.map_err(|e| {
                        RelayError::Internal(format!("Failed to read ping response: {e}"))
                    })
                } else {
                    let status = response.status();
                    warn!("Ping failed: HTTP {}", status);
                    Err(RelayError::Internal(format!("Ping failed: HTTP {status}")))
                }
            }
            Err(e) => {
                warn!("Failed to ping relay api: {}", e);
                Err(RelayError::Internal(format!("Relay api connection error: {e}")))
            }
        }
    }

    /// Creates a relay and returns its id.
    pub async fn create_relay(
        &self,
        device_id: &str,
        function: &str,
        argument: &str,
        expected_result: Option<i64>,
        scheduled_time: Option<DateTime<Utc>>,
    ) -> RelayResult<i64> {
        let request = CreateRelayRequest {
            device_id: device_id.to_string(),
            function: function.to_string(),
            argument: Some(argument.to_string()),
            expected_result,
            scheduled_time,
        };
        let url = format!("{}/api/relays", self.base_url);

        match self.http_client.post(&url).json(&request).send().await {
            Ok(response) => {
                let created: RelayCreated = Self::unwrap_envelope(response, None).await?;
                info!(relay_id = created.id, device = device_id, "relay submitted");
                Ok(created.id)
            }
            Err(e) => {
                error!("Failed to connect to relay api for creation: {}", e);
                Err(RelayError::Internal(format!("Relay api connection error: {e}")))
            }
        }
    }

    pub async fn get_relay(&self, id: i64) -> RelayResult<RelayDetails> {
        let url = format!("{}/api/relays/{id}", self.base_url);

        match self.http_client.get(&url).send().await {
            Ok(response) => Self::unwrap_envelope(response, Some(id)).await,
            Err(e) => {
                error!("Failed to connect to relay api for lookup: {}", e);
                Err(RelayError::Internal(format!("Relay api connection error: {e}")))
            }
        }
    }

    /// Queues a cancellation and returns the cancellation id.
    pub async fn cancel_relay(&self, id: i64) -> RelayResult<i64> {
        let url = format!("{}/api/relays/{id}", self.base_url);

        match self.http_client.delete(&url).send().await {
            Ok(response) => {
                let queued: CancellationQueued = Self::unwrap_envelope(response, Some(id)).await?;
                info!(relay_id = id, cancellation_id = queued.id, "cancellation submitted");
                Ok(queued.id)
            }
            Err(e) => {
                error!("Failed to connect to relay api for cancellation: {}", e);
                Err(RelayError::Internal(format!("Relay api connection error: {e}")))
            }
        }
    }

    async fn unwrap_envelope<T: DeserializeOwned>(
        response: reqwest::Response,
        relay_id: Option<i64>,
    ) -> RelayResult<T> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            debug!("Relay api returned HTTP {} - {}", status, body);
            return Err(Self::error_for(status, &body, relay_id));
        }

        let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
            RelayError::Serialization(format!("Invalid relay api response: {e}"))
        })?;
        envelope
            .data
            .ok_or_else(|| RelayError::Serialization("Relay api response has no data".into()))
    }

    fn error_for(status: StatusCode, body: &str, relay_id: Option<i64>) -> RelayError {
        // Error bodies look like {"error": {"message": ..., "type": ..., "code": ...}}
        let message = serde_json::from_str::<Value>(body)
            .ok()
            .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
            .unwrap_or_else(|| body.to_string());

        match (status, relay_id) {
            (StatusCode::NOT_FOUND, Some(id)) => RelayError::RelayNotFound { id },
            (StatusCode::UNPROCESSABLE_ENTITY | StatusCode::CONFLICT, _) => {
                RelayError::InvalidRequest(message)
            }
            _ => RelayError::Internal(format!("Relay api request failed: HTTP {status} - {message}")),
        }
    }
}
