use async_trait::async_trait;
use relay_core::{traits::DeviceClient, RelayError, RelayResult};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct PingResponse {
    online: bool,
}

#[derive(Debug, Deserialize)]
struct FunctionResponse {
    return_value: i64,
}

/// Client for the Particle device cloud REST API.
pub struct ParticleClient {
    base_url: String,
    access_token: String,
    http_client: reqwest::Client,
}

impl ParticleClient {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
            http_client: reqwest::Client::new(),
        }
    }

    /// Checks the access token against the device listing endpoint.
    ///
    /// `Ok(false)` means the cloud rejected the token.
    pub async fn verify_token(&self) -> RelayResult<bool> {
        let url = format!("{}/v1/devices", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| RelayError::device_api(format!("token check failed: {e}")))?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::UNAUTHORIZED => Ok(false),
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(RelayError::device_api(format!(
                    "token check failed: HTTP {status} - {body}"
                )))
            }
        }
    }

    async fn error_from_response(context: &str, response: reqwest::Response) -> RelayError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        warn!("{} failed: HTTP {} - {}", context, status, body);
        RelayError::device_api(format!("{context} failed: HTTP {status} - {body}"))
    }
}

#[async_trait]
impl DeviceClient for ParticleClient {
    async fn probe_liveness(&self, external_id: &str) -> RelayResult<bool> {
        let url = format!("{}/v1/devices/{}/ping", self.base_url, external_id);

        let response = self
            .http_client
            .put(&url)
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| RelayError::device_api(format!("ping {external_id}: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response("ping", response).await);
        }

        let ping: PingResponse = response
            .json()
            .await
            .map_err(|e| RelayError::device_api(format!("ping {external_id}: {e}")))?;

        debug!(device = %external_id, online = ping.online, "ping answered");
        Ok(ping.online)
    }

    async fn invoke(
        &self,
        external_id: &str,
        function: &str,
        argument: &str,
        expected_result: Option<i64>,
    ) -> RelayResult<bool> {
        let url = format!("{}/v1/devices/{}/{}", self.base_url, external_id, function);

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.access_token)
            .form(&[("arg", argument)])
            .send()
            .await
            .map_err(|e| RelayError::device_api(format!("invoke {external_id}/{function}: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::error_from_response("invoke", response).await);
        }

        let result: FunctionResponse = response
            .json()
            .await
            .map_err(|e| RelayError::device_api(format!("invoke {external_id}/{function}: {e}")))?;

        debug!(
            device = %external_id,
            function,
            return_value = result.return_value,
            ?expected_result,
            "function returned"
        );
        Ok(expected_result.map_or(true, |expected| expected == result.return_value))
    }
}
