use thiserror::Error;

/// Relay service error type
#[derive(Debug, Error)]
pub enum RelayError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("relay not found: {id}")]
    RelayNotFound { id: i64 },

    #[error("device not found: {id}")]
    DeviceNotFound { id: i64 },

    #[error("device api error: {0}")]
    DeviceApi(String),

    #[error("operation timed out: {0}")]
    Timeout(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    pub fn device_api<S: Into<String>>(msg: S) -> Self {
        Self::DeviceApi(msg.into())
    }

    pub fn timeout_error<S: Into<String>>(msg: S) -> Self {
        Self::Timeout(msg.into())
    }

    pub fn invalid_request<S: Into<String>>(msg: S) -> Self {
        Self::InvalidRequest(msg.into())
    }
}
