use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use relay_core::RelayError;
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("中继错误: {0}")]
    Relay(#[from] RelayError),

    #[error("请求参数无效: {0}")]
    Validation(String),

    #[error("状态不允许该操作: {0}")]
    UnprocessableEntity(String),

    #[error("请求冲突: {0}")]
    Conflict(String),

    #[error("未找到资源")]
    NotFound,

    #[error("内部服务器错误: {0}")]
    Internal(String),
}

impl ApiError {
    fn parts(&self) -> (StatusCode, String, &'static str) {
        match self {
            ApiError::Relay(RelayError::RelayNotFound { id }) => (
                StatusCode::NOT_FOUND,
                format!("Relay {id} not found"),
                "RELAY_NOT_FOUND",
            ),
            ApiError::Relay(RelayError::DeviceNotFound { id }) => (
                StatusCode::NOT_FOUND,
                format!("Device {id} not found"),
                "DEVICE_NOT_FOUND",
            ),
            ApiError::Relay(RelayError::InvalidRequest(msg)) | ApiError::Validation(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                msg.clone(),
                "VALIDATION_ERROR",
            ),
            ApiError::Relay(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                e.to_string(),
                "INTERNAL_ERROR",
            ),
            ApiError::UnprocessableEntity(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                msg.clone(),
                "INVALID_STATE",
            ),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone(), "CONFLICT"),
            ApiError::NotFound => (
                StatusCode::NOT_FOUND,
                "Resource not found".to_string(),
                "NOT_FOUND",
            ),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                msg.clone(),
                "INTERNAL_ERROR",
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, error_type) = self.parts();
        if status.is_server_error() {
            error!("API request failed: {}", self);
        }

        let body = Json(json!({
            "error": {
                "message": message,
                "type": error_type,
                "code": status.as_u16(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
            }
        }));

        (status, body).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
