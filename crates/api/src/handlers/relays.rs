use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use relay_core::models::{NewRelay, RelayDetails};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    error::{ApiError, ApiResult},
    response::{accepted, created, success},
    routes::AppState,
};

/// 中继创建请求
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRelayRequest {
    /// External device id, as known to the device cloud.
    pub device_id: String,
    pub function: String,
    /// Absent and `null` both mean an empty argument.
    #[serde(default)]
    pub argument: Option<String>,
    pub expected_result: Option<i64>,
    /// Defaults to now.
    pub scheduled_time: Option<DateTime<Utc>>,
}

impl CreateRelayRequest {
    fn validate(&self) -> ApiResult<()> {
        if self.device_id.trim().is_empty() {
            return Err(ApiError::Validation("device_id must not be empty".into()));
        }
        if self.function.trim().is_empty() {
            return Err(ApiError::Validation("function must not be empty".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RelayCreated {
    pub id: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancellationQueued {
    pub id: i64,
    pub relay_id: i64,
}

/// 创建中继
pub async fn create_relay(
    State(state): State<AppState>,
    Json(request): Json<CreateRelayRequest>,
) -> ApiResult<impl IntoResponse> {
    request.validate()?;

    let device_id = state.device_repo.insert_or_get(&request.device_id).await?;
    let relay = state
        .relay_repo
        .create(&NewRelay {
            device_id,
            function: request.function,
            argument: request.argument.unwrap_or_default(),
            expected_result: request.expected_result,
            scheduled_time: request.scheduled_time.unwrap_or_else(Utc::now),
        })
        .await?;

    info!(relay_id = relay.id, device = %request.device_id, "relay created");
    Ok(created(RelayCreated { id: relay.id }))
}

/// 获取单个中继
pub async fn get_relay(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let relay = state.relay_repo.get_by_id(id).await?.ok_or(ApiError::NotFound)?;
    let device = state
        .device_repo
        .get_by_id(relay.device_id)
        .await?
        .ok_or_else(|| ApiError::Internal(format!("relay {id} references a missing device")))?;

    Ok(success(RelayDetails::new(relay, device)))
}

/// 取消中继
///
/// Only a relay that is still Ready can be cancelled. The dispatcher applies
/// the cancellation on its next iteration.
pub async fn cancel_relay(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> ApiResult<impl IntoResponse> {
    let relay = state.relay_repo.get_by_id(id).await?.ok_or(ApiError::NotFound)?;
    if relay.status.is_terminal() {
        return Err(ApiError::UnprocessableEntity(format!(
            "relay {id} is {} and can no longer be cancelled",
            relay.status
        )));
    }

    let cancellation_id = state.cancellation_repo.insert(id).await?;
    if cancellation_id == 0 {
        return Err(ApiError::Conflict(format!(
            "relay {id} already has a pending cancellation"
        )));
    }

    info!(relay_id = id, "cancellation queued");
    Ok(accepted(
        CancellationQueued {
            id: cancellation_id,
            relay_id: id,
        },
        "cancellation queued",
    ))
}
